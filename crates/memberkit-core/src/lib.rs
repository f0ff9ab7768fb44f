//! # memberkit-core: Foundational Types for memberkit
//!
//! This crate is the leaf of the memberkit crate graph. It defines the
//! dynamic value model that members validate and store, the runtime kinds
//! those values belong to, and the error taxonomy shared by every layer.
//!
//! ## Key Design Principles
//!
//! 1. **Kinds are identity-compared type objects.** A `Kind` carries its
//!    linearized ancestry, so an exact-or-descendant check is a membership
//!    scan over a short list, with no structural matching.
//!
//! 2. **Values are cheap to clone.** Scalars and containers clone by value;
//!    heap objects are `Arc`-shared and compare by identity.
//!
//! 3. **One error enum.** `MemberError` covers validation, missing values,
//!    the state protocol, and integration faults. Callback errors ride
//!    through `MemberError::Callback` without re-wrapping.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `memberkit-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod builtins;
pub mod error;
pub mod kind;
pub mod object;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use builtins::builtin_kinds;
pub use error::{MemberError, Result};
pub use kind::{Constructor, Kind, Kwargs};
pub use object::{Object, ObjectRef, Opaque};
pub use value::{Dict, Value};
