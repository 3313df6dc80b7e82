// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the access control system.
//!
//! Every variant indicates a configuration or caller-contract defect,
//! not a transient fault. None are retried internally; the boundary
//! layer decides how to surface them.

use thiserror::Error;

/// Errors that can occur while compiling a role model or evaluating
/// an access decision.
#[derive(Debug, Error)]
pub enum AccessError {
	/// A role names a parent that never becomes resolvable (missing
	/// from the input, or part of a parent cycle).
	#[error("unresolvable parent reference(s) in role model: {0}")]
	UnresolvableParent(String),

	/// The operation hierarchy contains an operation that is its own
	/// transitive hypernym.
	#[error("operation hierarchy cycle involving '{0}'")]
	HierarchyCycle(String),

	/// A target specification of `false`. Deny rules are not
	/// representable; omission is the only deny mechanism.
	#[error("negative permission for operation '{0}': leave the grant out instead")]
	NegativePermission(String),

	/// A tagged target specification whose keyword is neither a
	/// builtin nor a registered user-defined target.
	#[error("unknown target keyword '{0}'")]
	UnknownTargetKeyword(String),

	/// A target specification that cannot be interpreted (wrong arity
	/// or argument types for its keyword).
	#[error("invalid target specification: {0}")]
	InvalidTargetSpec(String),

	/// A resource descriptor that does not support the keyed lookup a
	/// strict target variant requires.
	#[error("malformed resource descriptor: {0}")]
	MalformedResource(String),

	/// A subject descriptor references a role not present in the
	/// compiled model.
	#[error("unknown role '{0}'")]
	UnknownRole(String),

	/// Lookup or revocation of a subject id that is not registered.
	#[error("unknown subject '{0}'")]
	UnknownSubject(String),

	/// A subject descriptor missing its `roles` field, or carrying one
	/// of the wrong shape.
	#[error("invalid subject descriptor: {0}")]
	InvalidDescriptor(String),
}

/// Convenience result type for access control operations.
pub type Result<T> = std::result::Result<T, AccessError>;
