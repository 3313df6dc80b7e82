// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access-control engine: role compilation, subject issuance, and
//! cached access decisions.
//!
//! The building blocks (roles, permissions, targets, the operation
//! hierarchy) live in `warden-access-core`; this crate runs them. A
//! [`Domain`] compiles role descriptions into an interned model and
//! issues [`Subject`]s, each carrying its permission index resolved at
//! issuance so that [`Subject::can`] is a lookup instead of a graph
//! walk.
//!
//! ```
//! use serde_json::json;
//! use warden_server_access::Domain;
//!
//! # fn main() -> warden_access_core::Result<()> {
//! let roles = serde_json::from_value(json!([
//! 	{"name": "guest", "can": [["read", ["posts"]]]}
//! ])).expect("role model");
//! let domain = Domain::load(roles, Default::default())?;
//!
//! let descriptor = json!({"id": 1, "roles": ["guest"]});
//! let subject = domain.issue_subject(descriptor.as_object().cloned().unwrap())?;
//! assert!(subject.can("read", Some("posts"), None)?);
//! assert!(!subject.can("delete", Some("posts"), None)?);
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod subject;

pub use domain::Domain;
pub use subject::{Subject, SubjectId, SubjectKind};

pub use warden_access_core::{
	AccessError, Attributes, GrantSpec, OperationHierarchy, OperationSpec, Permission,
	PredicateRegistry, Result, Role, RoleSpec, Target, TargetSpec,
};
