// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire shapes for role descriptions.
//!
//! Role models are stored as nested maps and lists, e.g.
//!
//! ```json
//! {
//!   "name": "publisher",
//!   "parent": "guest",
//!   "can": [
//!     ["crud", [["if-equals", "posts", "user_id", "id"]]],
//!     ["read", ["comments", "posts"]]
//!   ]
//! }
//! ```
//!
//! These types deserialize that format directly and compile target
//! specifications into [`Target`] values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AccessError, Result};
use crate::target::{PredicateRegistry, Target};

/// One role description as loaded from the role-model source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent: Option<String>,
	pub can: Vec<GrantSpec>,
}

/// One grant inside a role: an operation name and the targets it
/// applies to. Serializes as a two-element list: `["crud", ["posts"]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSpec(pub String, pub Vec<TargetSpec>);

impl GrantSpec {
	pub fn operation(&self) -> &str {
		&self.0
	}

	pub fn targets(&self) -> &[TargetSpec] {
		&self.1
	}
}

/// A single target specification, dispatched on shape:
///
/// - a bare string is a resource class (unconditional within it),
/// - `true` is unconditional over any class (`false` is rejected:
///   negative permissions are not representable),
/// - a list is `[keyword, ...args]` for a builtin or registered
///   user-defined target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
	Any(bool),
	Class(String),
	Tagged(Vec<Value>),
}

/// Builtin tagged-target keywords.
const KW_CONST: &str = "if-const";
const KW_EQUALS: &str = "if-equals";
const KW_CONTAINS: &str = "if-contains";

impl TargetSpec {
	/// Deterministic structural key for target interning.
	///
	/// Canonical JSON: object keys inside argument values are sorted,
	/// so equal specifications always produce equal keys.
	pub fn cache_key(&self) -> String {
		match self {
			TargetSpec::Any(any) => any.to_string(),
			TargetSpec::Class(name) => Value::String(name.clone()).to_string(),
			TargetSpec::Tagged(items) => Value::Array(items.clone()).to_string(),
		}
	}

	/// Compiles this specification into a [`Target`].
	///
	/// `operation` is only used for error reporting. Tagged keywords
	/// that are neither builtin nor registered in `predicates` fail
	/// with [`AccessError::UnknownTargetKeyword`].
	pub fn compile(&self, operation: &str, predicates: &PredicateRegistry) -> Result<Target> {
		match self {
			TargetSpec::Class(name) => Ok(Target::Unconditional {
				class: Some(name.clone()),
			}),
			TargetSpec::Any(true) => Ok(Target::Unconditional { class: None }),
			TargetSpec::Any(false) => Err(AccessError::NegativePermission(operation.to_string())),
			TargetSpec::Tagged(items) => compile_tagged(items, predicates),
		}
	}
}

fn compile_tagged(items: &[Value], predicates: &PredicateRegistry) -> Result<Target> {
	let Some(Value::String(keyword)) = items.first() else {
		return Err(AccessError::InvalidTargetSpec(
			"tagged target must start with a keyword string".to_string(),
		));
	};

	match keyword.as_str() {
		KW_CONST => {
			let (class, attribute) = class_and_attribute(keyword, items)?;
			let value = constant_arg(keyword, items)?;
			Ok(Target::AttributeEquals {
				class,
				attribute,
				value,
			})
		}
		KW_CONTAINS => {
			let (class, attribute) = class_and_attribute(keyword, items)?;
			let value = constant_arg(keyword, items)?;
			Ok(Target::AttributeContains {
				class,
				attribute,
				value,
			})
		}
		KW_EQUALS => {
			let (class, attribute) = class_and_attribute(keyword, items)?;
			let Some(Value::String(subject_attribute)) = items.get(3) else {
				return Err(arity_error(keyword));
			};
			Ok(Target::AttributeEqualsSubject {
				class,
				attribute,
				subject_attribute: subject_attribute.clone(),
			})
		}
		other if predicates.contains(other) => Ok(Target::UserDefined {
			name: other.to_string(),
			args: items[1..].to_vec(),
		}),
		other => Err(AccessError::UnknownTargetKeyword(other.to_string())),
	}
}

fn class_and_attribute(keyword: &str, items: &[Value]) -> Result<(String, String)> {
	match (items.get(1), items.get(2)) {
		(Some(Value::String(class)), Some(Value::String(attribute))) => {
			Ok((class.clone(), attribute.clone()))
		}
		_ => Err(arity_error(keyword)),
	}
}

fn constant_arg(keyword: &str, items: &[Value]) -> Result<Value> {
	items.get(3).cloned().ok_or_else(|| arity_error(keyword))
}

fn arity_error(keyword: &str) -> AccessError {
	AccessError::InvalidTargetSpec(format!("'{keyword}' target has missing or mistyped arguments"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn role_spec_deserializes_stored_format() {
		let spec: RoleSpec = serde_json::from_value(json!({
			"name": "publisher",
			"parent": "guest",
			"can": [
				["crud", [["if-equals", "posts", "user_id", "id"]]],
				["read", ["comments", "posts"]]
			]
		}))
		.unwrap();

		assert_eq!(spec.name, "publisher");
		assert_eq!(spec.parent.as_deref(), Some("guest"));
		assert_eq!(spec.can.len(), 2);
		assert_eq!(spec.can[0].operation(), "crud");
		assert!(matches!(spec.can[0].targets()[0], TargetSpec::Tagged(_)));
		assert_eq!(
			spec.can[1].targets(),
			&[
				TargetSpec::Class("comments".to_string()),
				TargetSpec::Class("posts".to_string()),
			]
		);
	}

	#[test]
	fn role_spec_without_parent() {
		let spec: RoleSpec = serde_json::from_value(json!({
			"name": "guest",
			"can": [["read", ["comments", "posts"]]]
		}))
		.unwrap();
		assert!(spec.parent.is_none());

		// And it round-trips without inventing a null parent.
		let back = serde_json::to_value(&spec).unwrap();
		assert!(back.get("parent").is_none());
	}

	#[test]
	fn boolean_true_is_unconditional_any() {
		let spec: TargetSpec = serde_json::from_value(json!(true)).unwrap();
		let target = spec.compile("read", &PredicateRegistry::new()).unwrap();
		assert_eq!(target, Target::Unconditional { class: None });
	}

	#[test]
	fn boolean_false_is_a_negative_permission() {
		let spec: TargetSpec = serde_json::from_value(json!(false)).unwrap();
		let err = spec.compile("create", &PredicateRegistry::new()).unwrap_err();
		assert!(matches!(err, AccessError::NegativePermission(op) if op == "create"));
	}

	#[test]
	fn builtin_keywords_compile() {
		let predicates = PredicateRegistry::new();

		let spec = TargetSpec::Tagged(vec![
			json!("if-const"),
			json!("photos"),
			json!("status"),
			json!("published"),
		]);
		assert_eq!(
			spec.compile("read", &predicates).unwrap(),
			Target::AttributeEquals {
				class: "photos".to_string(),
				attribute: "status".to_string(),
				value: json!("published"),
			}
		);

		let spec = TargetSpec::Tagged(vec![
			json!("if-contains"),
			json!("photos"),
			json!("tags"),
			json!("public"),
		]);
		assert_eq!(
			spec.compile("read", &predicates).unwrap(),
			Target::AttributeContains {
				class: "photos".to_string(),
				attribute: "tags".to_string(),
				value: json!("public"),
			}
		);

		let spec = TargetSpec::Tagged(vec![
			json!("if-equals"),
			json!("posts"),
			json!("user_id"),
			json!("id"),
		]);
		assert_eq!(
			spec.compile("crud", &predicates).unwrap(),
			Target::AttributeEqualsSubject {
				class: "posts".to_string(),
				attribute: "user_id".to_string(),
				subject_attribute: "id".to_string(),
			}
		);
	}

	#[test]
	fn unknown_keyword_is_rejected() {
		let spec = TargetSpec::Tagged(vec![json!("if-nonsense"), json!("posts")]);
		let err = spec.compile("read", &PredicateRegistry::new()).unwrap_err();
		assert!(matches!(err, AccessError::UnknownTargetKeyword(kw) if kw == "if-nonsense"));
	}

	#[test]
	fn registered_keyword_compiles_to_user_defined() {
		let mut predicates = PredicateRegistry::new();
		predicates.register("if-owner-online", |_s, _c, _r, _o, _a| true);

		let spec = TargetSpec::Tagged(vec![json!("if-owner-online"), json!(5)]);
		assert_eq!(
			spec.compile("read", &predicates).unwrap(),
			Target::UserDefined {
				name: "if-owner-online".to_string(),
				args: vec![json!(5)],
			}
		);
	}

	#[test]
	fn short_builtin_spec_is_invalid() {
		let spec = TargetSpec::Tagged(vec![json!("if-const"), json!("photos")]);
		let err = spec.compile("read", &PredicateRegistry::new()).unwrap_err();
		assert!(matches!(err, AccessError::InvalidTargetSpec(_)));
	}

	#[test]
	fn cache_keys_are_structural() {
		let a = TargetSpec::Tagged(vec![json!("if-const"), json!("photos"), json!("s"), json!(1)]);
		let b = TargetSpec::Tagged(vec![json!("if-const"), json!("photos"), json!("s"), json!(1)]);
		assert_eq!(a.cache_key(), b.cache_key());
		assert_ne!(
			TargetSpec::Class("posts".to_string()).cache_key(),
			TargetSpec::Any(true).cache_key()
		);
	}
}
