// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Target predicates constraining where a permission applies.
//!
//! A [`Target`] is an immutable value evaluated against the subject's
//! attributes, the requested resource class, and the resource
//! descriptor. The variant set is closed and dispatched by a single
//! `match`; user-extensible logic goes through [`PredicateRegistry`]
//! instead of new variants.
//!
//! Two variants are strict about the resource descriptor and two are
//! lenient, on purpose:
//!
//! - [`Target::AttributeEquals`] and [`Target::AttributeContains`]
//!   treat a missing descriptor or attribute as a caller-contract
//!   violation ([`AccessError::MalformedResource`]).
//! - [`Target::AttributeEqualsSubject`] answers `false` instead.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;

use crate::error::{AccessError, Result};

/// Attribute bag for subject and resource descriptors.
pub type Attributes = serde_json::Map<String, Value>;

/// Signature of a user-defined target predicate:
/// `(subject, resource_class, resource, operation, extra_args) -> bool`.
pub type PredicateFn =
	dyn Fn(&Attributes, Option<&str>, Option<&Attributes>, &str, &[Value]) -> bool + Send + Sync;

/// Registry of user-defined target predicates, keyed by the keyword
/// that selects them in a target specification.
///
/// Registration is a design-time configuration step; the registry is
/// consulted both when parsing tagged target specifications and when
/// evaluating [`Target::UserDefined`].
#[derive(Default, Clone)]
pub struct PredicateRegistry {
	predicates: HashMap<String, Arc<PredicateFn>>,
}

impl PredicateRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a predicate under the given keyword, replacing any
	/// previous registration.
	pub fn register<F>(&mut self, keyword: impl Into<String>, predicate: F)
	where
		F: Fn(&Attributes, Option<&str>, Option<&Attributes>, &str, &[Value]) -> bool
			+ Send
			+ Sync
			+ 'static,
	{
		self.predicates.insert(keyword.into(), Arc::new(predicate));
	}

	/// Returns true if the keyword has a registered predicate.
	pub fn contains(&self, keyword: &str) -> bool {
		self.predicates.contains_key(keyword)
	}

	/// Looks up a predicate by keyword.
	pub fn get(&self, keyword: &str) -> Option<&Arc<PredicateFn>> {
		self.predicates.get(keyword)
	}
}

impl std::fmt::Debug for PredicateRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PredicateRegistry")
			.field("keywords", &self.predicates.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// A predicate over (subject attributes, resource class, resource
/// descriptor, operation).
///
/// Targets are created once per distinct constraint during role-model
/// compilation, never mutated, and shared across permissions via
/// `Arc`. Equality is structural so equivalent constraints
/// deduplicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
	/// Matches when the requested class equals the stored class;
	/// `None` matches any class.
	Unconditional { class: Option<String> },
	/// Matches when the resource's attribute equals a constant value.
	AttributeEquals {
		class: String,
		attribute: String,
		value: Value,
	},
	/// Matches when the resource's attribute (a collection) contains a
	/// constant value.
	AttributeContains {
		class: String,
		attribute: String,
		value: Value,
	},
	/// Matches when the resource's attribute equals one of the
	/// subject's own attributes (e.g. "only your own posts").
	AttributeEqualsSubject {
		class: String,
		attribute: String,
		subject_attribute: String,
	},
	/// Delegates to a registered predicate.
	UserDefined { name: String, args: Vec<Value> },
}

impl Target {
	/// Evaluates this target.
	///
	/// Must not fail for well-formed inputs; the only errors are the
	/// documented strict-variant contract violations and an
	/// unregistered user-defined keyword.
	pub fn check(
		&self,
		subject: &Attributes,
		resource_class: Option<&str>,
		resource: Option<&Attributes>,
		operation: &str,
		predicates: &PredicateRegistry,
	) -> Result<bool> {
		match self {
			Target::Unconditional { class } => match class {
				None => Ok(true),
				Some(class) => Ok(resource_class == Some(class.as_str())),
			},
			Target::AttributeEquals {
				class,
				attribute,
				value,
			} => {
				if resource_class != Some(class.as_str()) {
					return Ok(false);
				}
				let actual = required_attribute(resource, attribute)?;
				Ok(actual == value)
			}
			Target::AttributeContains {
				class,
				attribute,
				value,
			} => {
				if resource_class != Some(class.as_str()) {
					return Ok(false);
				}
				let actual = required_attribute(resource, attribute)?;
				Ok(contains(actual, value))
			}
			Target::AttributeEqualsSubject {
				class,
				attribute,
				subject_attribute,
			} => {
				if resource_class != Some(class.as_str()) {
					return Ok(false);
				}
				// Lenient: a non-indexable resource or a missing key
				// on either side denies instead of erroring.
				let Some(resource) = resource else {
					return Ok(false);
				};
				match (resource.get(attribute), subject.get(subject_attribute)) {
					(Some(actual), Some(expected)) => Ok(actual == expected),
					_ => Ok(false),
				}
			}
			Target::UserDefined { name, args } => {
				let predicate = predicates
					.get(name)
					.ok_or_else(|| AccessError::UnknownTargetKeyword(name.clone()))?;
				Ok(predicate(subject, resource_class, resource, operation, args))
			}
		}
	}
}

fn required_attribute<'a>(
	resource: Option<&'a Attributes>,
	attribute: &str,
) -> Result<&'a Value> {
	let resource = resource.ok_or_else(|| {
		AccessError::MalformedResource(format!(
			"attribute check on '{attribute}' requires a resource descriptor"
		))
	})?;
	resource.get(attribute).ok_or_else(|| {
		AccessError::MalformedResource(format!("resource descriptor lacks attribute '{attribute}'"))
	})
}

/// Membership test for `AttributeContains`: arrays by element, strings
/// by substring.
fn contains(haystack: &Value, needle: &Value) -> bool {
	match haystack {
		Value::Array(items) => items.contains(needle),
		Value::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
		_ => false,
	}
}

impl std::fmt::Display for Target {
	/// Compact rendering for diagnostics, mirroring the specification
	/// shape: `posts`, `*`, `[if-equals posts user_id id]`.
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Target::Unconditional { class: None } => write!(f, "*"),
			Target::Unconditional { class: Some(class) } => write!(f, "{class}"),
			Target::AttributeEquals {
				class,
				attribute,
				value,
			} => write!(f, "[if-const {class} {attribute} {value}]"),
			Target::AttributeContains {
				class,
				attribute,
				value,
			} => write!(f, "[if-contains {class} {attribute} {value}]"),
			Target::AttributeEqualsSubject {
				class,
				attribute,
				subject_attribute,
			} => write!(f, "[if-equals {class} {attribute} {subject_attribute}]"),
			Target::UserDefined { name, args } => {
				write!(f, "[{name}")?;
				for arg in args {
					write!(f, " {arg}")?;
				}
				write!(f, "]")
			}
		}
	}
}

// Targets are hashed for structural deduplication; `serde_json::Value`
// has no `Hash` impl, so constant values hash via their canonical JSON
// rendering (object keys are sorted, so the rendering is stable).
impl Hash for Target {
	fn hash<H: Hasher>(&self, state: &mut H) {
		std::mem::discriminant(self).hash(state);
		match self {
			Target::Unconditional { class } => class.hash(state),
			Target::AttributeEquals {
				class,
				attribute,
				value,
			}
			| Target::AttributeContains {
				class,
				attribute,
				value,
			} => {
				class.hash(state);
				attribute.hash(state);
				value.to_string().hash(state);
			}
			Target::AttributeEqualsSubject {
				class,
				attribute,
				subject_attribute,
			} => {
				class.hash(state);
				attribute.hash(state);
				subject_attribute.hash(state);
			}
			Target::UserDefined { name, args } => {
				name.hash(state);
				for arg in args {
					arg.to_string().hash(state);
				}
			}
		}
	}
}
