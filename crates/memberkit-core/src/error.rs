//! # Error Types: Structured Error Hierarchy
//!
//! Defines the single error type raised by members, classes, and the state
//! codec. All variants use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Validation errors carry the owning class, the member name, and the
//!   expected vs actual kind names.
//! - State protocol errors (`Arity`, `NotAMapping`, `UnknownAttribute`) are
//!   raised before or at the specific entry that triggered them.
//! - `SystemFault` marks an integration defect, never a usage error.
//! - Errors produced by user callbacks (factories, resolvers, owner
//!   validators) travel as `Callback` and are never re-wrapped by the engine.

use std::error::Error as StdError;

use thiserror::Error;

/// Error raised anywhere in the member engine.
#[derive(Error, Debug)]
pub enum MemberError {
    /// A value's runtime kind does not satisfy a typed constraint.
    #[error("the '{member}' member on the '{class}' object must be of type '{expected}'. Got object of type '{actual}' instead")]
    TypeKind {
        /// Name of the class owning the member.
        class: String,
        /// Member name.
        member: String,
        /// Name of the required kind.
        expected: String,
        /// Name of the rejected value's kind.
        actual: String,
    },

    /// A non-optional member was read before it was ever written.
    #[error("the value of the non-optional member '{member}' on the '{class}' object has not been set")]
    MissingValue {
        /// Name of the class owning the member.
        class: String,
        /// Member name.
        member: String,
    },

    /// A call received the wrong number of positional arguments.
    #[error("{callable}() takes exactly {expected} positional argument(s) ({given} given)")]
    Arity {
        /// Name of the callable.
        callable: String,
        /// Number of positional arguments accepted.
        expected: usize,
        /// Number of positional arguments supplied.
        given: usize,
    },

    /// A state argument does not expose key/value iteration.
    #[error("'{actual}' object has no attribute 'items'")]
    NotAMapping {
        /// Kind name of the rejected argument.
        actual: String,
    },

    /// An attribute name is not known to the object's class.
    #[error("'{class}' object has no attribute '{name}'")]
    UnknownAttribute {
        /// Class name.
        class: String,
        /// Requested attribute name.
        name: String,
    },

    /// Internal bookkeeping is missing or corrupted.
    #[error("system fault: {0}")]
    SystemFault(String),

    /// A kind could not be constructed from the supplied arguments.
    #[error("cannot construct '{kind}': {reason}")]
    Construct {
        /// Name of the kind being constructed.
        kind: String,
        /// Why construction failed.
        reason: String,
    },

    /// A class or member declaration is malformed.
    #[error("invalid declaration: {0}")]
    Declaration(String),

    /// A forward type name could not be resolved.
    #[error("cannot resolve forward type '{0}'")]
    Unresolved(String),

    /// Error raised by a user-supplied callback.
    #[error(transparent)]
    Callback(Box<dyn StdError + Send + Sync>),
}

impl MemberError {
    /// Wrap an arbitrary error raised inside a user callback.
    pub fn callback(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Callback(err.into())
    }

    /// Whether this error signals an environment defect rather than misuse.
    pub fn is_system_fault(&self) -> bool {
        matches!(self, Self::SystemFault(_))
    }
}

/// Convenience alias used across the workspace.
pub type Result<T, E = MemberError> = std::result::Result<T, E>;
