//! # memberkit-member: Declared-Field Members
//!
//! Members are class-level field descriptors. Each carries one validation
//! mode and one default-value mode; the owning class's storage calls into
//! them on every write and on the first read of an unset field.
//!
//! ## Member Kinds
//!
//! - **Member** (`member.rs`): the base descriptor, its mode tables, and
//!   mode dispatch. `Member::value(default)` is the unconstrained kind.
//!
//! - **Typed** (`typed.rs`): values must be of one kind or a descendant;
//!   default chosen from factory, constructor arguments, or optionality.
//!
//! - **ForwardTyped** (`forward.rs`): a `Typed` whose kind is resolved on
//!   first use, then rewrites itself into the concrete typed modes.
//!
//! ## Design
//!
//! Mode changes are the only mutation a member ever sees after
//! declaration. Callbacks are stored as closures or handler trait objects,
//! never looked up by name at dispatch time.

pub mod forward;
pub mod member;
pub mod typed;

pub use forward::{ForwardResolver, ForwardTyped, Resolution, Resolve};
pub use member::{
    DefaultMode, Factory, Member, MemberHandler, OwnerFactory, OwnerValidator, ValidateMode,
};
pub use typed::Typed;
