// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The operation hypernym hierarchy.
//!
//! A hypernym is a coarse operation that subsumes finer-grained ones:
//! granting `write` grants every operation `write` includes. The
//! hierarchy drives permission closure expansion
//! ([`crate::Permission::resolve`]).

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, Result};

/// Persisted shape of one operation record, e.g.
/// `{"name": "crud", "includes": ["create", "read", "update", "delete"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
	pub name: String,
	pub includes: Vec<String>,
}

/// Mapping from hypernym operation to its ordered sub-operations.
///
/// Cycle-free by construction: every constructor rejects a hierarchy
/// in which some operation is its own transitive hypernym.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHierarchy {
	includes: BTreeMap<String, Vec<String>>,
}

impl OperationHierarchy {
	/// Builds a hierarchy from a hypernym → sub-operations mapping.
	pub fn new<I>(entries: I) -> Result<Self>
	where
		I: IntoIterator<Item = (String, Vec<String>)>,
	{
		let hierarchy = Self {
			includes: entries.into_iter().collect(),
		};
		hierarchy.ensure_acyclic()?;
		Ok(hierarchy)
	}

	/// Builds a hierarchy from persisted operation records.
	pub fn from_specs(specs: Vec<OperationSpec>) -> Result<Self> {
		Self::new(specs.into_iter().map(|s| (s.name, s.includes)))
	}

	/// A hierarchy with no hypernyms; every operation is a leaf.
	pub fn empty() -> Self {
		Self {
			includes: BTreeMap::new(),
		}
	}

	/// Bypasses cycle validation, to let tests exercise the expansion
	/// guard against inputs `new` would reject.
	#[cfg(test)]
	pub(crate) fn new_unchecked<I>(entries: I) -> Self
	where
		I: IntoIterator<Item = (String, Vec<String>)>,
	{
		Self {
			includes: entries.into_iter().collect(),
		}
	}

	/// Returns true if the operation is a hypernym key.
	pub fn is_hypernym(&self, operation: &str) -> bool {
		self.includes.contains_key(operation)
	}

	/// The ordered sub-operations of a hypernym, if it is one.
	pub fn sub_operations(&self, operation: &str) -> Option<&[String]> {
		self.includes.get(operation).map(Vec::as_slice)
	}

	/// Iterates over all hypernym entries.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
		self
			.includes
			.iter()
			.map(|(k, v)| (k.as_str(), v.as_slice()))
	}

	fn ensure_acyclic(&self) -> Result<()> {
		let mut done: HashSet<&str> = HashSet::new();
		for root in self.includes.keys() {
			if done.contains(root.as_str()) {
				continue;
			}
			let mut path: Vec<&str> = Vec::new();
			self.visit(root, &mut path, &mut done)?;
		}
		Ok(())
	}

	fn visit<'a>(
		&'a self,
		operation: &'a str,
		path: &mut Vec<&'a str>,
		done: &mut HashSet<&'a str>,
	) -> Result<()> {
		if path.contains(&operation) {
			return Err(AccessError::HierarchyCycle(operation.to_string()));
		}
		if done.contains(operation) {
			return Ok(());
		}
		if let Some(subs) = self.includes.get(operation) {
			path.push(operation);
			for sub in subs {
				self.visit(sub, path, done)?;
			}
			path.pop();
		}
		done.insert(operation);
		Ok(())
	}
}

impl Default for OperationHierarchy {
	/// The stock hierarchy: `write` expands to create/update/delete,
	/// `crud` to read/write.
	fn default() -> Self {
		Self {
			includes: BTreeMap::from([
				(
					"write".to_string(),
					vec![
						"create".to_string(),
						"update".to_string(),
						"delete".to_string(),
					],
				),
				(
					"crud".to_string(),
					vec!["read".to_string(), "write".to_string()],
				),
			]),
		}
	}
}
