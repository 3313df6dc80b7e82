// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The access control domain: role-model compiler and subject registry.
//!
//! A [`Domain`] owns the compiled role model, the operation hierarchy,
//! the user-defined predicate registry, and the registry of live
//! subjects. The compiled model is an immutable snapshot behind a
//! `RwLock`, replaced wholesale by [`Domain::init_role_model`];
//! subjects issued under an older model stay valid because they carry
//! their own resolved permission index.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};
use warden_access_core::{
	AccessError, Attributes, OperationHierarchy, Permission, PredicateRegistry, Result, Role,
	RoleSpec, Target,
};

use crate::subject::{Subject, SubjectId, SubjectKind};

/// Descriptor field naming a resource instance for decision caching.
const DEFAULT_CACHE_ID_FIELD: &str = "_id";

/// One compiled generation of the role model.
///
/// The interning tables guarantee at most one live [`Target`] per
/// distinct specification and one [`Permission`] per distinct
/// (operation, target) across the whole model; that keeps structural
/// sharing cheap and decision-cache identity stable within a
/// generation.
#[derive(Debug, Default)]
struct RoleModel {
	roles: HashMap<String, Arc<Role>>,
	targets: HashMap<String, Arc<Target>>,
	permissions: HashMap<(String, String), Arc<Permission>>,
}

/// Manages roles, permissions, and subjects for one access-control
/// instance.
pub struct Domain {
	model: RwLock<Arc<RoleModel>>,
	hierarchy: RwLock<Arc<OperationHierarchy>>,
	predicates: Arc<RwLock<PredicateRegistry>>,
	subjects: DashMap<SubjectId, Arc<Subject>>,
	cache_id_field: RwLock<String>,
	null_subject: Arc<Subject>,
}

impl Domain {
	/// Creates an empty domain with the stock operation hierarchy.
	pub fn new() -> Self {
		let predicates = Arc::new(RwLock::new(PredicateRegistry::new()));
		let null_subject = Arc::new(Subject::new(
			SubjectId::from("null"),
			SubjectKind::Null,
			Vec::new(),
			Attributes::new(),
			HashMap::new(),
			DEFAULT_CACHE_ID_FIELD.to_string(),
			Arc::clone(&predicates),
		));
		Self {
			model: RwLock::new(Arc::new(RoleModel::default())),
			hierarchy: RwLock::new(Arc::new(OperationHierarchy::default())),
			predicates,
			subjects: DashMap::new(),
			cache_id_field: RwLock::new(DEFAULT_CACHE_ID_FIELD.to_string()),
			null_subject,
		}
	}

	/// Builds a domain and loads a role model in one step.
	pub fn load(roles: Vec<RoleSpec>, hierarchy: OperationHierarchy) -> Result<Self> {
		let domain = Self::new();
		domain.update_operations_hierarchy(hierarchy);
		domain.init_role_model(roles)?;
		Ok(domain)
	}

	/// Replaces the operation hierarchy. Already-issued subjects keep
	/// the closures they were resolved with.
	pub fn update_operations_hierarchy(&self, hierarchy: OperationHierarchy) {
		*self.hierarchy.write().expect("hierarchy lock poisoned") = Arc::new(hierarchy);
	}

	/// Registers a user-defined target predicate under a keyword.
	///
	/// Design-time configuration: keywords must be registered before a
	/// role model referencing them is loaded.
	pub fn register_target<F>(&self, keyword: impl Into<String>, predicate: F)
	where
		F: Fn(&Attributes, Option<&str>, Option<&Attributes>, &str, &[Value]) -> bool
			+ Send
			+ Sync
			+ 'static,
	{
		self
			.predicates
			.write()
			.expect("predicate registry poisoned")
			.register(keyword, predicate);
	}

	/// Sets the descriptor field used as the per-resource decision
	/// cache id. Applies to subjects issued afterwards.
	pub fn set_cache_id_field(&self, field: impl Into<String>) {
		*self.cache_id_field.write().expect("cache id field poisoned") = field.into();
	}

	/// Compiles role descriptions into a fresh model and swaps it in.
	///
	/// Parents may be listed after their children: compilation is
	/// multi-pass, admitting a role once its parent is absent or
	/// already compiled. A pass that makes no progress while roles
	/// remain means a parent is missing or cyclic, and fails with
	/// [`AccessError::UnresolvableParent`] naming the stuck roles.
	pub fn init_role_model(&self, specs: Vec<RoleSpec>) -> Result<()> {
		let predicates = self.predicates.read().expect("predicate registry poisoned");
		let mut model = RoleModel::default();
		let mut pending = specs;

		while !pending.is_empty() {
			let before = pending.len();
			let mut stuck = Vec::new();

			for spec in pending {
				let ready = match &spec.parent {
					None => true,
					Some(parent) => model.roles.contains_key(parent),
				};
				if ready {
					compile_role(&mut model, &spec, &predicates)?;
				} else {
					stuck.push(spec);
				}
			}

			if stuck.len() == before {
				let unresolved = stuck
					.iter()
					.map(|spec| {
						format!(
							"{} (parent '{}')",
							spec.name,
							spec.parent.as_deref().unwrap_or("")
						)
					})
					.collect::<Vec<_>>()
					.join(", ");
				return Err(AccessError::UnresolvableParent(unresolved));
			}
			pending = stuck;
		}

		info!(
			roles = model.roles.len(),
			targets = model.targets.len(),
			permissions = model.permissions.len(),
			"role model loaded"
		);
		*self.model.write().expect("role model lock poisoned") = Arc::new(model);
		Ok(())
	}

	/// The names of all compiled roles.
	pub fn role_names(&self) -> Vec<String> {
		let model = self.model.read().expect("role model lock poisoned");
		let mut names: Vec<String> = model.roles.keys().cloned().collect();
		names.sort();
		names
	}

	/// Issues a subject for a descriptor and registers it.
	///
	/// The descriptor must carry a `roles` array of role-name strings,
	/// all present in the compiled model. The subject id is derived
	/// from the descriptor content, so identical descriptors yield
	/// identical ids.
	pub fn issue_subject(&self, descriptor: Attributes) -> Result<Arc<Subject>> {
		self.issue(descriptor, SubjectKind::Normal)
	}

	/// Issues an always-allow superuser subject.
	///
	/// Admin status is decided at issuance; a live subject never
	/// changes kind.
	pub fn issue_admin(&self, descriptor: Attributes) -> Result<Arc<Subject>> {
		self.issue(descriptor, SubjectKind::Admin)
	}

	/// The shared always-deny subject for unauthenticated requests.
	pub fn null_subject(&self) -> Arc<Subject> {
		Arc::clone(&self.null_subject)
	}

	/// Looks up a live subject by id.
	pub fn get_subject_by_id(&self, id: &SubjectId) -> Result<Arc<Subject>> {
		self
			.subjects
			.get(id)
			.map(|entry| Arc::clone(entry.value()))
			.ok_or_else(|| AccessError::UnknownSubject(id.to_string()))
	}

	/// Removes a subject from the registry. Revoking an id that is not
	/// registered is an error; callers wanting idempotent logout check
	/// [`Domain::is_valid`] first.
	pub fn revoke_subject(&self, id: &SubjectId) -> Result<()> {
		match self.subjects.remove(id) {
			Some(_) => {
				debug!(subject = %id, "subject revoked");
				Ok(())
			}
			None => Err(AccessError::UnknownSubject(id.to_string())),
		}
	}

	/// Returns true if the id names a live subject.
	pub fn is_valid(&self, id: &SubjectId) -> bool {
		self.subjects.contains_key(id)
	}

	fn issue(&self, descriptor: Attributes, kind: SubjectKind) -> Result<Arc<Subject>> {
		let role_names = descriptor_roles(&descriptor)?;

		let model = Arc::clone(&self.model.read().expect("role model lock poisoned"));
		let hierarchy = Arc::clone(&self.hierarchy.read().expect("hierarchy lock poisoned"));

		// Resolve the permission closure once, sorted by operation.
		let mut index: HashMap<String, Vec<Permission>> = HashMap::new();
		for name in &role_names {
			let role = model
				.roles
				.get(name)
				.ok_or_else(|| AccessError::UnknownRole(name.clone()))?;
			for permission in role.resolve(&hierarchy)? {
				index
					.entry(permission.operation().to_string())
					.or_default()
					.push(permission);
			}
		}

		let id = SubjectId::from_descriptor(&descriptor);
		let cache_id_field = self
			.cache_id_field
			.read()
			.expect("cache id field poisoned")
			.clone();
		let subject = Arc::new(Subject::new(
			id.clone(),
			kind,
			role_names,
			descriptor,
			index,
			cache_id_field,
			Arc::clone(&self.predicates),
		));

		debug!(subject = %id, roles = ?subject.roles(), kind = ?kind, "subject issued");
		self.subjects.insert(id, Arc::clone(&subject));
		Ok(subject)
	}
}

impl Default for Domain {
	fn default() -> Self {
		Self::new()
	}
}

fn descriptor_roles(descriptor: &Attributes) -> Result<Vec<String>> {
	let Some(roles) = descriptor.get("roles") else {
		return Err(AccessError::InvalidDescriptor(
			"descriptor has no 'roles' field".to_string(),
		));
	};
	let Some(roles) = roles.as_array() else {
		return Err(AccessError::InvalidDescriptor(
			"'roles' must be an array of role names".to_string(),
		));
	};
	roles
		.iter()
		.map(|role| {
			role.as_str().map(str::to_string).ok_or_else(|| {
				AccessError::InvalidDescriptor("'roles' must contain only strings".to_string())
			})
		})
		.collect()
}

fn compile_role(model: &mut RoleModel, spec: &RoleSpec, predicates: &PredicateRegistry) -> Result<()> {
	let mut permissions = Vec::new();
	for grant in &spec.can {
		for target_spec in grant.targets() {
			let target_key = target_spec.cache_key();

			let target = match model.targets.get(&target_key) {
				Some(target) => Arc::clone(target),
				None => {
					let target = Arc::new(target_spec.compile(grant.operation(), predicates)?);
					model.targets.insert(target_key.clone(), Arc::clone(&target));
					target
				}
			};

			let permission_key = (grant.operation().to_string(), target_key);
			let permission = match model.permissions.get(&permission_key) {
				Some(permission) => Arc::clone(permission),
				None => {
					let permission = Arc::new(
						Permission::new(grant.operation(), target).granted_by(&spec.name),
					);
					model
						.permissions
						.insert(permission_key, Arc::clone(&permission));
					permission
				}
			};
			permissions.push(permission);
		}
	}

	let parent = match &spec.parent {
		// Checked resolvable by the caller before compile_role runs.
		Some(parent) => model.roles.get(parent).cloned(),
		None => None,
	};

	let role = Arc::new(Role::new(&spec.name, parent, permissions));
	debug!(role = %spec.name, "role compiled");
	model.roles.insert(spec.name.clone(), role);
	Ok(())
}
