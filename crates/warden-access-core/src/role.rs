// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Roles: named, inheritable bundles of permissions.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::hierarchy::OperationHierarchy;
use crate::permission::Permission;

/// A named set of permissions with an optional parent role.
///
/// Roles form a forest: a role can only reference a parent that was
/// already compiled, so cycles cannot be constructed. The parent link
/// is non-owning in spirit (shared `Arc`), and a role is immutable
/// once built.
#[derive(Debug, Clone)]
pub struct Role {
	name: String,
	parent: Option<Arc<Role>>,
	permissions: Vec<Arc<Permission>>,
}

impl Role {
	pub fn new(
		name: impl Into<String>,
		parent: Option<Arc<Role>>,
		permissions: Vec<Arc<Permission>>,
	) -> Self {
		Self {
			name: name.into(),
			parent,
			permissions,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn parent(&self) -> Option<&Arc<Role>> {
		self.parent.as_ref()
	}

	/// The role's own (uninherited, unexpanded) permissions.
	pub fn permissions(&self) -> &[Arc<Permission>] {
		&self.permissions
	}

	/// Resolves the role into its effective permission set: the union
	/// of every own permission's hierarchy closure with the parent's
	/// full resolution.
	///
	/// Pure with respect to (role, hierarchy); recomputed per subject
	/// issuance, which is cheap relative to how rarely subjects are
	/// created.
	pub fn resolve(&self, hierarchy: &OperationHierarchy) -> Result<HashSet<Permission>> {
		let mut resolved = match &self.parent {
			Some(parent) => parent.resolve(hierarchy)?,
			None => HashSet::new(),
		};
		for permission in &self.permissions {
			resolved.extend(permission.resolve(hierarchy)?);
		}
		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::target::Target;

	fn class_permission(operation: &str, class: &str) -> Arc<Permission> {
		Arc::new(Permission::new(
			operation,
			Arc::new(Target::Unconditional {
				class: Some(class.to_string()),
			}),
		))
	}

	fn operations(resolved: &HashSet<Permission>) -> std::collections::BTreeSet<String> {
		resolved
			.iter()
			.map(|p| format!("{}:{}", p.operation(), class_of(p)))
			.collect()
	}

	fn class_of(permission: &Permission) -> &str {
		match permission.target().as_ref() {
			Target::Unconditional { class: Some(c) } => c,
			_ => "*",
		}
	}

	#[test]
	fn resolve_expands_own_permissions() {
		let role = Role::new("editor", None, vec![class_permission("write", "posts")]);
		let resolved = role.resolve(&OperationHierarchy::default()).unwrap();
		assert_eq!(
			operations(&resolved),
			["create:posts", "update:posts", "delete:posts"]
				.into_iter()
				.map(String::from)
				.collect()
		);
	}

	#[test]
	fn resolve_unions_the_parent_chain() {
		let guest = Arc::new(Role::new(
			"guest",
			None,
			vec![class_permission("read", "posts")],
		));
		let editor = Arc::new(Role::new(
			"editor",
			Some(Arc::clone(&guest)),
			vec![class_permission("update", "posts")],
		));
		let admin = Role::new(
			"admin",
			Some(editor),
			vec![class_permission("delete", "posts")],
		);

		let resolved = admin.resolve(&OperationHierarchy::default()).unwrap();
		assert_eq!(
			operations(&resolved),
			["read:posts", "update:posts", "delete:posts"]
				.into_iter()
				.map(String::from)
				.collect()
		);
	}

	#[test]
	fn duplicate_grants_deduplicate_structurally() {
		// Parent grants read, child's crud closure also contains read
		// on the same target: the union keeps one.
		let guest = Arc::new(Role::new(
			"guest",
			None,
			vec![class_permission("read", "posts")],
		));
		let moderator = Role::new(
			"moderator",
			Some(guest),
			vec![class_permission("crud", "posts")],
		);

		let resolved = moderator.resolve(&OperationHierarchy::default()).unwrap();
		let reads = resolved.iter().filter(|p| p.operation() == "read").count();
		assert_eq!(reads, 1);
		assert_eq!(resolved.len(), 4);
	}

	#[test]
	fn effective_set_is_independent_of_chain_shape() {
		// The same grants spread differently across a parent chain
		// resolve to the same effective set.
		let hierarchy = OperationHierarchy::default();

		let flat = Role::new(
			"all",
			None,
			vec![
				class_permission("read", "posts"),
				class_permission("delete", "comments"),
			],
		);

		let base = Arc::new(Role::new(
			"base",
			None,
			vec![class_permission("delete", "comments")],
		));
		let layered = Role::new("all", Some(base), vec![class_permission("read", "posts")]);

		assert_eq!(
			flat.resolve(&hierarchy).unwrap(),
			layered.resolve(&hierarchy).unwrap()
		);
	}
}
