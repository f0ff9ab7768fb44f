//! # Member Base: Validation and Default-Value Modes
//!
//! A `Member` is the class-level descriptor for one declared field. It owns
//! exactly one active [`ValidateMode`] and one active [`DefaultMode`]. Every
//! instance of the declaring class (and of its subclasses) shares the same
//! `Member`, so a mode change is visible to all of them at once.
//!
//! ## Mode Dispatch
//!
//! ```text
//! write:  new ──▶ do_validate(owner, old, new) ──▶ stored value
//! read:   unset ──▶ do_default_value(owner) ──▶ do_validate(owner, None, v) ──▶ stored value
//! ```
//!
//! `MemberMethod` modes route to a [`MemberHandler`] carried by the member
//! kind itself (this is how `ForwardTyped` defers its type). `ObjectMethod`
//! modes route to a closure that receives the owning object.
//!
//! ## Locking
//!
//! The mode table sits behind a `parking_lot::RwLock`. Dispatch clones the
//! active mode and releases the lock before calling any factory, validator,
//! or handler, so callbacks may freely re-enter the member.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use memberkit_core::{Kind, MemberError, Object, Result, Value};
use parking_lot::RwLock;

/// Zero-argument default factory.
pub type Factory = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// Default factory receiving the owning object.
pub type OwnerFactory = Arc<dyn Fn(&dyn Object) -> Result<Value> + Send + Sync>;

/// Validator receiving the owning object, the old value, and the new value.
pub type OwnerValidator = Arc<dyn Fn(&dyn Object, &Value, Value) -> Result<Value> + Send + Sync>;

/// Behavior supplied by a member kind for its `MemberMethod` modes.
pub trait MemberHandler: Send + Sync + fmt::Debug {
    /// Compute the default value for `owner`.
    fn default_value(&self, member: &Member, owner: &dyn Object) -> Result<Value>;

    /// Validate `new` before it is stored on `owner`.
    fn validate(&self, member: &Member, owner: &dyn Object, old: &Value, new: Value) -> Result<Value>;

    /// Create an independent copy for a duplicated member.
    fn duplicate(&self) -> Arc<dyn MemberHandler>;

    /// Downcasting hook.
    fn as_any(&self) -> &dyn Any;
}

/// How a member validates a proposed value.
#[derive(Clone)]
pub enum ValidateMode {
    /// Accept anything unchanged.
    NoOp,
    /// Accept `None` or a value whose kind is the given kind or a descendant.
    Typed(Kind),
    /// Like `Typed`, but `None` is rejected.
    NonOptionalTyped(Kind),
    /// Delegate to a validator that receives the owner.
    ObjectMethod(OwnerValidator),
    /// Delegate to the member kind's handler.
    MemberMethod(Arc<dyn MemberHandler>),
}

/// How a member computes its value the first time it is read unset.
#[derive(Clone)]
pub enum DefaultMode {
    /// The default is `None`.
    NoOp,
    /// The default is a constant (cloned per read).
    Static(Value),
    /// The default is produced by a zero-argument factory.
    CallObject(Factory),
    /// The default is produced by a factory receiving the owner.
    ObjectMethod(OwnerFactory),
    /// The default is produced by the member kind's handler.
    MemberMethod(Arc<dyn MemberHandler>),
    /// Reading before writing is an error.
    NonOptional,
}

impl fmt::Debug for ValidateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp => f.write_str("NoOp"),
            Self::Typed(kind) => write!(f, "Typed({kind})"),
            Self::NonOptionalTyped(kind) => write!(f, "NonOptionalTyped({kind})"),
            Self::ObjectMethod(_) => f.write_str("ObjectMethod"),
            Self::MemberMethod(handler) => write!(f, "MemberMethod({handler:?})"),
        }
    }
}

impl fmt::Debug for DefaultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp => f.write_str("NoOp"),
            Self::Static(value) => write!(f, "Static({value:?})"),
            Self::CallObject(_) => f.write_str("CallObject"),
            Self::ObjectMethod(_) => f.write_str("ObjectMethod"),
            Self::MemberMethod(handler) => write!(f, "MemberMethod({handler:?})"),
            Self::NonOptional => f.write_str("NonOptional"),
        }
    }
}

#[derive(Debug, Clone)]
struct Modes {
    validate: ValidateMode,
    default: DefaultMode,
}

/// A declared field descriptor.
///
/// The name and storage index are assigned by the owning class when the
/// class is built; until then the member is anonymous.
pub struct Member {
    name: String,
    index: usize,
    modes: RwLock<Modes>,
}

impl Member {
    /// An unconstrained member whose default is `None`.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            index: 0,
            modes: RwLock::new(Modes {
                validate: ValidateMode::NoOp,
                default: DefaultMode::NoOp,
            }),
        }
    }

    /// An unconstrained member with a constant default.
    pub fn value(default: impl Into<Value>) -> Self {
        Self::new().with_default_value_mode(DefaultMode::Static(default.into()))
    }

    /// Builder-style [`Member::set_validate_mode`].
    pub fn with_validate_mode(self, mode: ValidateMode) -> Self {
        self.set_validate_mode(mode);
        self
    }

    /// Builder-style [`Member::set_default_value_mode`].
    pub fn with_default_value_mode(self, mode: DefaultMode) -> Self {
        self.set_default_value_mode(mode);
        self
    }

    /// The declared name, empty until bound by a class.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assign the declared name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The storage index within an instance's member table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Assign the storage index.
    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Install a new validation mode.
    pub fn set_validate_mode(&self, mode: ValidateMode) {
        tracing::trace!(member = %self.name, ?mode, "validate mode installed");
        self.modes.write().validate = mode;
    }

    /// Install a new default-value mode.
    pub fn set_default_value_mode(&self, mode: DefaultMode) {
        tracing::trace!(member = %self.name, ?mode, "default mode installed");
        self.modes.write().default = mode;
    }

    /// The active validation mode.
    pub fn validate_mode(&self) -> ValidateMode {
        self.modes.read().validate.clone()
    }

    /// The active default-value mode.
    pub fn default_value_mode(&self) -> DefaultMode {
        self.modes.read().default.clone()
    }

    /// Rewrite both modes under a single write lock.
    ///
    /// Readers observe either the old pair or the new pair, never a mix.
    pub fn transition_modes(&self, f: impl FnOnce(&mut ValidateMode, &mut DefaultMode)) {
        let mut modes = self.modes.write();
        let Modes { validate, default } = &mut *modes;
        f(validate, default);
    }

    /// Run the active validation mode.
    ///
    /// # Errors
    ///
    /// Returns `MemberError::TypeKind` when a typed mode rejects the value,
    /// and propagates errors raised by validator callbacks.
    pub fn do_validate(&self, owner: &dyn Object, old: &Value, new: Value) -> Result<Value> {
        let mode = self.validate_mode();
        self.validate_with(&mode, owner, old, new)
    }

    pub(crate) fn validate_with(
        &self,
        mode: &ValidateMode,
        owner: &dyn Object,
        old: &Value,
        new: Value,
    ) -> Result<Value> {
        match mode {
            ValidateMode::NoOp => Ok(new),
            ValidateMode::Typed(kind) => {
                if new.is_none() || new.kind().is_subtype_of(kind) {
                    Ok(new)
                } else {
                    Err(self.type_error(owner, kind, &new))
                }
            }
            ValidateMode::NonOptionalTyped(kind) => {
                if !new.is_none() && new.kind().is_subtype_of(kind) {
                    Ok(new)
                } else {
                    Err(self.type_error(owner, kind, &new))
                }
            }
            ValidateMode::ObjectMethod(validator) => validator(owner, old, new),
            ValidateMode::MemberMethod(handler) => handler.validate(self, owner, old, new),
        }
    }

    /// Run the active default-value mode.
    ///
    /// # Errors
    ///
    /// Returns `MemberError::MissingValue` in `NonOptional` mode and
    /// propagates errors raised by factories and handlers.
    pub fn do_default_value(&self, owner: &dyn Object) -> Result<Value> {
        match self.default_value_mode() {
            DefaultMode::NoOp => Ok(Value::None),
            DefaultMode::Static(value) => Ok(value),
            DefaultMode::CallObject(factory) => factory(),
            DefaultMode::ObjectMethod(factory) => factory(owner),
            DefaultMode::MemberMethod(handler) => handler.default_value(self, owner),
            DefaultMode::NonOptional => Err(MemberError::MissingValue {
                class: owner.kind().name().to_string(),
                member: self.name.clone(),
            }),
        }
    }

    /// Compute the value an unset member takes on first read.
    ///
    /// The default is validated against an old value of `None`, exactly as
    /// if it had been written.
    pub fn initial_value(&self, owner: &dyn Object) -> Result<Value> {
        let value = self.do_default_value(owner)?;
        self.do_validate(owner, &Value::None, value)
    }

    /// Generic clone: copies name, index, and both modes.
    ///
    /// Handlers referenced by `MemberMethod` modes are duplicated so the
    /// copy never shares handler state with `self`. A handler installed in
    /// both modes is duplicated once and installed in both.
    pub fn duplicate(&self) -> Member {
        let Modes { validate, default } = self.modes.read().clone();
        let mut copies: Vec<(Arc<dyn MemberHandler>, Arc<dyn MemberHandler>)> = Vec::new();
        let mut copy_of = |handler: &Arc<dyn MemberHandler>| {
            if let Some((_, copy)) = copies.iter().find(|(orig, _)| Arc::ptr_eq(orig, handler)) {
                return copy.clone();
            }
            let copy = handler.duplicate();
            copies.push((handler.clone(), copy.clone()));
            copy
        };
        let validate = match validate {
            ValidateMode::MemberMethod(handler) => ValidateMode::MemberMethod(copy_of(&handler)),
            other => other,
        };
        let default = match default {
            DefaultMode::MemberMethod(handler) => DefaultMode::MemberMethod(copy_of(&handler)),
            other => other,
        };
        Member {
            name: self.name.clone(),
            index: self.index,
            modes: RwLock::new(Modes { validate, default }),
        }
    }

    fn type_error(&self, owner: &dyn Object, kind: &Kind, value: &Value) -> MemberError {
        MemberError::TypeKind {
            class: owner.kind().name().to_string(),
            member: self.name.clone(),
            expected: kind.name().to_string(),
            actual: value.type_name(),
        }
    }
}

impl Default for Member {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modes = self.modes.read();
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("validate", &modes.validate)
            .field("default", &modes.default)
            .finish()
    }
}
