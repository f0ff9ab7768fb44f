//! # memberkit-object: Classes, Instances, and the Type Registry
//!
//! The storage side of the member engine. Members describe fields; this
//! crate lays them out, holds their values per instance, and routes
//! attribute reads and writes to the right storage area.
//!
//! ## Storage areas
//!
//! - **Member table**: one entry per member index, unset until written or
//!   until the first read computes the default.
//! - **Fixed slots**: plain named storage without validation, declared with
//!   `ClassBuilder::slot`. Unset slots read as `UnknownAttribute`.
//! - **Dict extras**: free-form attributes, present only for classes built
//!   `with_dict()` or declaring a `__dict__` slot.
//!
//! ## Design
//!
//! Classes are immutable once built. Their kinds carry a constructor, so a
//! class is callable anywhere a kind is (typed defaults with `args` build
//! instances through it).

pub mod class;
pub mod instance;
pub mod registry;

pub use class::{is_reserved_slot, Class, ClassBuilder, SlotNames, DICT_SLOT, RESERVED_SLOT_NAMES};
pub use instance::Instance;
pub use registry::TypeRegistry;
