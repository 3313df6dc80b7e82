// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core model types for the Warden access control system.
//!
//! This crate provides the pure, side-effect-free half of Warden's
//! role- and attribute-based access control: targets, permissions,
//! roles, the operation hypernym hierarchy, and the wire shapes role
//! models are stored in. The stateful engine that compiles role models
//! and answers access checks lives in `warden-server-access`.
//!
//! # Overview
//!
//! - A [`Target`] constrains where a grant applies: a resource class,
//!   an attribute equality or inclusion test, a comparison against the
//!   subject's own attributes, or a registered user-defined predicate.
//! - A [`Permission`] pairs an operation with a target and expands
//!   through the [`OperationHierarchy`] into its leaf-operation
//!   closure (granting `crud` grants create/read/update/delete).
//! - A [`Role`] bundles permissions and may inherit from a parent
//!   role; [`Role::resolve`] computes the effective permission set.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warden_access_core::{
//!     OperationHierarchy, Permission, PredicateRegistry, Role, Target,
//! };
//!
//! let target = Arc::new(Target::Unconditional {
//!     class: Some("posts".to_string()),
//! });
//! let role = Role::new(
//!     "editor",
//!     None,
//!     vec![Arc::new(Permission::new("crud", target))],
//! );
//!
//! let resolved = role.resolve(&OperationHierarchy::default()).unwrap();
//! assert!(resolved.iter().any(|p| p.operation() == "update"));
//! ```

pub mod error;
pub mod hierarchy;
pub mod permission;
pub mod role;
pub mod spec;
pub mod target;

pub use error::{AccessError, Result};
pub use hierarchy::{OperationHierarchy, OperationSpec};
pub use permission::Permission;
pub use role::Role;
pub use spec::{GrantSpec, RoleSpec, TargetSpec};
pub use target::{Attributes, PredicateFn, PredicateRegistry, Target};
