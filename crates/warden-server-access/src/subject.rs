// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subjects: permission-resolved principals answering access checks.
//!
//! A [`Subject`] is issued per authenticated session by the
//! [`Domain`](crate::Domain). Its permission index is resolved once at
//! issuance (the permission-closure optimization); `can` afterwards is
//! an index lookup plus a short-circuiting OR over the candidate
//! targets, with a positive-only decision cache in front. Everything
//! except that cache is fixed at construction, so a subject stays
//! valid across role-model reloads.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use warden_access_core::{Attributes, Permission, PredicateRegistry, Result};

/// Deterministic subject identifier: the SHA-256 of the canonically
/// serialized descriptor. Identical descriptors always map to the
/// same id within (and across) process runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectId(String);

impl SubjectId {
	/// Derives the id from a descriptor. `serde_json` maps are sorted
	/// by key, so serialization is canonical.
	pub fn from_descriptor(descriptor: &Attributes) -> Self {
		let canonical = serde_json::Value::Object(descriptor.clone()).to_string();
		let digest = Sha256::digest(canonical.as_bytes());
		Self(hex::encode(digest))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for SubjectId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<String> for SubjectId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl From<&str> for SubjectId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

/// What kind of principal a subject represents.
///
/// The kind is fixed at construction and checked before the permission
/// index; a value never changes kind during its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
	/// Decisions come from the resolved permission index.
	Normal,
	/// Superuser: every check passes.
	Admin,
	/// Unauthenticated: every check fails.
	Null,
}

/// Key of one positively-decided access check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DecisionKey {
	operation: String,
	resource_class: Option<String>,
	resource_id: Option<String>,
}

/// An active principal with its resolved permissions.
pub struct Subject {
	id: SubjectId,
	kind: SubjectKind,
	roles: Vec<String>,
	descriptor: Attributes,
	/// operation → applicable permissions, resolved at issuance.
	index: HashMap<String, Vec<Permission>>,
	cache_id_field: String,
	predicates: Arc<RwLock<PredicateRegistry>>,
	/// Positive decisions only; negatives are never provably permanent.
	decisions: DashSet<DecisionKey>,
	issued_at: DateTime<Utc>,
}

impl Subject {
	pub(crate) fn new(
		id: SubjectId,
		kind: SubjectKind,
		roles: Vec<String>,
		descriptor: Attributes,
		index: HashMap<String, Vec<Permission>>,
		cache_id_field: String,
		predicates: Arc<RwLock<PredicateRegistry>>,
	) -> Self {
		Self {
			id,
			kind,
			roles,
			descriptor,
			index,
			cache_id_field,
			predicates,
			decisions: DashSet::new(),
			issued_at: Utc::now(),
		}
	}

	pub fn id(&self) -> &SubjectId {
		&self.id
	}

	pub fn kind(&self) -> SubjectKind {
		self.kind
	}

	/// The role names this subject was issued with.
	pub fn roles(&self) -> &[String] {
		&self.roles
	}

	/// The raw attribute descriptor supplied at issuance.
	pub fn descriptor(&self) -> &Attributes {
		&self.descriptor
	}

	pub fn issued_at(&self) -> DateTime<Utc> {
		self.issued_at
	}

	/// Checks whether this subject may perform `operation` on the
	/// given resource.
	///
	/// Admin subjects always pass and null subjects always fail,
	/// before the index is consulted. Otherwise the candidates for the
	/// operation are evaluated in insertion order and the first match
	/// wins; a confirmed decision is cached under
	/// `(operation, resource_class, resource[cache_id_field])` so
	/// repeated checks against the same resource instance skip target
	/// evaluation. A resource descriptor lacking the cache id field
	/// silently skips caching for that call.
	///
	/// Target evaluation errors (see the strict variants of
	/// [`warden_access_core::Target`]) propagate; they are caller
	/// contract violations, not denials.
	#[instrument(level = "debug", skip(self, resource), fields(subject = %self.id))]
	pub fn can(
		&self,
		operation: &str,
		resource_class: Option<&str>,
		resource: Option<&Attributes>,
	) -> Result<bool> {
		match self.kind {
			SubjectKind::Admin => return Ok(true),
			SubjectKind::Null => return Ok(false),
			SubjectKind::Normal => {}
		}

		let cache_key = self.cache_key(operation, resource_class, resource);
		if let Some(key) = &cache_key {
			if self.decisions.contains(key) {
				debug!(allowed = true, cached = true, "access decision");
				return Ok(true);
			}
		}

		let Some(candidates) = self.index.get(operation) else {
			debug!(allowed = false, "no permission for operation");
			return Ok(false);
		};

		let predicates = self.predicates.read().expect("predicate registry poisoned");
		for permission in candidates {
			if permission.check(&self.descriptor, resource_class, resource, &predicates)? {
				if let Some(key) = cache_key {
					self.decisions.insert(key);
				}
				debug!(
					allowed = true,
					target = %permission.target(),
					granted_by = permission.granting_role().unwrap_or("?"),
					"access decision"
				);
				return Ok(true);
			}
		}

		debug!(allowed = false, "access decision");
		Ok(false)
	}

	fn cache_key(
		&self,
		operation: &str,
		resource_class: Option<&str>,
		resource: Option<&Attributes>,
	) -> Option<DecisionKey> {
		let resource_id = match resource {
			None => None,
			// A concrete resource is only cacheable when it carries
			// the id field; otherwise return None for the whole key.
			Some(resource) => Some(resource.get(&self.cache_id_field)?.to_string()),
		};
		Some(DecisionKey {
			operation: operation.to_string(),
			resource_class: resource_class.map(str::to_string),
			resource_id,
		})
	}

	/// Human-readable listing of the resolved permission index, for
	/// diagnostics. Lines are sorted, so output is stable.
	pub fn debug_dump(&self) -> String {
		let mut lines: Vec<String> = self
			.index
			.iter()
			.flat_map(|(operation, permissions)| {
				permissions.iter().map(move |permission| {
					match permission.granting_role() {
						Some(role) => {
							format!("{operation}: {} (granted by {role})", permission.target())
						}
						None => format!("{operation}: {}", permission.target()),
					}
				})
			})
			.collect();
		lines.sort();

		let mut dump = format!(
			"subject {} ({:?}), roles [{}], issued {}\n",
			self.id,
			self.kind,
			self.roles.join(", "),
			self.issued_at.to_rfc3339(),
		);
		for line in lines {
			let _ = writeln!(dump, "  {line}");
		}
		dump
	}
}

impl std::fmt::Debug for Subject {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subject")
			.field("id", &self.id)
			.field("kind", &self.kind)
			.field("roles", &self.roles)
			.field("operations", &self.index.keys().collect::<Vec<_>>())
			.finish_non_exhaustive()
	}
}
