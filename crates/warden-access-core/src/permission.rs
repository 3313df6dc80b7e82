// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permissions: an operation paired with a target.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{AccessError, Result};
use crate::hierarchy::OperationHierarchy;
use crate::target::{Attributes, PredicateRegistry, Target};

/// Permission to perform one operation on whatever the target admits.
///
/// Structural identity is (operation, target); `granted_by` is a
/// diagnostic annotation and takes no part in equality or hashing, so
/// equivalent permissions deduplicate regardless of which role
/// contributed them.
#[derive(Debug, Clone)]
pub struct Permission {
	operation: String,
	target: Arc<Target>,
	granted_by: Option<String>,
}

impl Permission {
	pub fn new(operation: impl Into<String>, target: Arc<Target>) -> Self {
		Self {
			operation: operation.into(),
			target,
			granted_by: None,
		}
	}

	/// Annotates the permission with the role that granted it.
	pub fn granted_by(mut self, role: impl Into<String>) -> Self {
		self.granted_by = Some(role.into());
		self
	}

	pub fn operation(&self) -> &str {
		&self.operation
	}

	pub fn target(&self) -> &Arc<Target> {
		&self.target
	}

	/// The role this permission was granted by, if recorded.
	pub fn granting_role(&self) -> Option<&str> {
		self.granted_by.as_deref()
	}

	/// Evaluates the target against a concrete access request.
	pub fn check(
		&self,
		subject: &Attributes,
		resource_class: Option<&str>,
		resource: Option<&Attributes>,
		predicates: &PredicateRegistry,
	) -> Result<bool> {
		self
			.target
			.check(subject, resource_class, resource, &self.operation, predicates)
	}

	/// Computes the closure of this permission under the hierarchy.
	///
	/// A hypernym operation expands depth-first into one permission per
	/// sub-operation, sharing this target; a leaf operation resolves to
	/// itself. Every permission in the result has a leaf operation.
	///
	/// Re-encountering an operation on the current expansion path fails
	/// with [`AccessError::HierarchyCycle`] instead of recursing
	/// without bound.
	pub fn resolve(&self, hierarchy: &OperationHierarchy) -> Result<HashSet<Permission>> {
		let mut closure = HashSet::new();
		let mut path = Vec::new();
		self.expand(hierarchy, &mut path, &mut closure)?;
		Ok(closure)
	}

	fn expand(
		&self,
		hierarchy: &OperationHierarchy,
		path: &mut Vec<String>,
		closure: &mut HashSet<Permission>,
	) -> Result<()> {
		let Some(sub_operations) = hierarchy.sub_operations(&self.operation) else {
			closure.insert(self.clone());
			return Ok(());
		};

		if path.iter().any(|seen| seen == &self.operation) {
			return Err(AccessError::HierarchyCycle(self.operation.clone()));
		}

		path.push(self.operation.clone());
		for sub_operation in sub_operations {
			let child = Permission {
				operation: sub_operation.clone(),
				target: Arc::clone(&self.target),
				granted_by: self.granted_by.clone(),
			};
			child.expand(hierarchy, path, closure)?;
		}
		path.pop();
		Ok(())
	}
}

impl PartialEq for Permission {
	fn eq(&self, other: &Self) -> bool {
		self.operation == other.operation && self.target == other.target
	}
}

impl Eq for Permission {}

impl Hash for Permission {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.operation.hash(state);
		self.target.hash(state);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn any_target() -> Arc<Target> {
		Arc::new(Target::Unconditional { class: None })
	}

	fn posts_target() -> Arc<Target> {
		Arc::new(Target::Unconditional {
			class: Some("posts".to_string()),
		})
	}

	#[test]
	fn leaf_operation_resolves_to_itself() {
		let permission = Permission::new("read", posts_target());
		let closure = permission.resolve(&OperationHierarchy::default()).unwrap();
		assert_eq!(closure.len(), 1);
		assert!(closure.contains(&permission));
	}

	#[test]
	fn crud_expands_to_all_four_leaves() {
		let permission = Permission::new("crud", posts_target());
		let closure = permission.resolve(&OperationHierarchy::default()).unwrap();

		let operations: std::collections::BTreeSet<&str> =
			closure.iter().map(Permission::operation).collect();
		assert_eq!(
			operations,
			["create", "read", "update", "delete"].into_iter().collect()
		);
		// Every member shares the original target.
		assert!(closure.iter().all(|p| *p.target() == posts_target()));
	}

	#[test]
	fn closure_members_carry_the_granting_role() {
		let permission = Permission::new("write", posts_target()).granted_by("moderator");
		let closure = permission.resolve(&OperationHierarchy::default()).unwrap();
		assert!(closure.iter().all(|p| p.granting_role() == Some("moderator")));
	}

	#[test]
	fn cyclic_hierarchy_fails_instead_of_overflowing() {
		let cyclic = OperationHierarchy::new_unchecked([
			("write".to_string(), vec!["update".to_string()]),
			("update".to_string(), vec!["write".to_string()]),
		]);
		let err = Permission::new("write", any_target())
			.resolve(&cyclic)
			.unwrap_err();
		assert!(matches!(err, AccessError::HierarchyCycle(_)));
	}

	#[test]
	fn diagnostic_annotation_does_not_affect_identity() {
		let plain = Permission::new("read", posts_target());
		let annotated = Permission::new("read", posts_target()).granted_by("guest");
		assert_eq!(plain, annotated);

		let mut set = HashSet::new();
		set.insert(plain);
		assert!(set.contains(&annotated));
	}

	#[test]
	fn different_targets_are_different_permissions() {
		let a = Permission::new("read", posts_target());
		let b = Permission::new("read", any_target());
		assert_ne!(a, b);
	}

	// Random acyclic hierarchies: operations are numbered and a
	// hypernym only ever includes higher-numbered operations, so no
	// cycle can occur by construction.
	fn arb_acyclic_hierarchy() -> impl Strategy<Value = OperationHierarchy> {
		prop::collection::btree_map(
			0u8..8,
			prop::collection::btree_set(8u8..24, 1..4),
			0..6,
		)
		.prop_map(|edges| {
			OperationHierarchy::new(edges.into_iter().map(|(hypernym, subs)| {
				(
					format!("op{hypernym}"),
					subs.into_iter().map(|s| format!("op{s}")).collect(),
				)
			}))
			.expect("constructed acyclic")
		})
	}

	proptest! {
		#[test]
		fn closure_is_fully_expanded(hierarchy in arb_acyclic_hierarchy(), root in 0u8..24) {
			let permission = Permission::new(format!("op{root}"), any_target());
			let closure = permission.resolve(&hierarchy).unwrap();
			prop_assert!(!closure.is_empty());
			for member in &closure {
				prop_assert!(!hierarchy.is_hypernym(member.operation()));
			}
		}

		#[test]
		fn closure_is_deterministic(hierarchy in arb_acyclic_hierarchy(), root in 0u8..24) {
			let permission = Permission::new(format!("op{root}"), any_target());
			let first = permission.resolve(&hierarchy).unwrap();
			let second = permission.resolve(&hierarchy).unwrap();
			prop_assert_eq!(first, second);
		}
	}
}
