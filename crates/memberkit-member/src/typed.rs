//! # Typed: Members Constrained to One Kind
//!
//! A `Typed` member accepts values whose runtime kind is the declared kind
//! or one of its descendants. The check is an ancestry membership test, not
//! a structural one. Use an unconstrained member (or a custom
//! `ObjectMethod` validator) for heterogeneous values.
//!
//! ## Default selection
//!
//! Fixed at declaration time, first match wins:
//!
//! 1. `factory` given → call the factory.
//! 2. `args` or `kwargs` given → call `kind(*args, **kwargs)`.
//! 3. not optional → reading before writing raises `MissingValue`.
//! 4. otherwise → `None`.
//!
//! ## Optionality
//!
//! `optional` (the default) lets `None` through validation; a non-optional
//! member rejects `None` with `TypeKind`.

use std::sync::Arc;

use memberkit_core::{Kind, Kwargs, Result, Value};

use crate::member::{DefaultMode, Factory, Member, ValidateMode};

/// Declaration of a `Typed` member.
#[derive(Clone)]
pub struct Typed {
    kind: Kind,
    args: Option<Vec<Value>>,
    kwargs: Option<Kwargs>,
    factory: Option<Factory>,
    optional: bool,
}

impl Typed {
    /// Declare a member accepting values of `kind`.
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            args: None,
            kwargs: None,
            factory: None,
            optional: true,
        }
    }

    /// Positional arguments for constructing the default as `kind(*args)`.
    pub fn args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Keyword arguments for constructing the default as `kind(**kwargs)`.
    pub fn kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = Some(kwargs);
        self
    }

    /// Explicit default factory. Takes precedence over `args`/`kwargs`.
    pub fn factory(mut self, factory: impl Fn() -> Result<Value> + Send + Sync + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Whether `None` is a valid value. Defaults to `true`.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// The declared kind.
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Produce the member with its modes installed.
    pub fn build(self) -> Member {
        let member = Member::new();
        if let Some(factory) = self.factory {
            member.set_default_value_mode(DefaultMode::CallObject(factory));
        } else if self.args.is_some() || self.kwargs.is_some() {
            member.set_default_value_mode(DefaultMode::CallObject(construct_factory(
                self.kind.clone(),
                self.args.unwrap_or_default(),
                self.kwargs.unwrap_or_default(),
            )));
        } else if !self.optional {
            member.set_default_value_mode(DefaultMode::NonOptional);
        }
        member.set_validate_mode(typed_validate_mode(self.kind, self.optional));
        member
    }
}

impl From<Typed> for Member {
    fn from(typed: Typed) -> Self {
        typed.build()
    }
}

/// The validation mode for a typed member with the given optionality.
pub(crate) fn typed_validate_mode(kind: Kind, optional: bool) -> ValidateMode {
    if optional {
        ValidateMode::Typed(kind)
    } else {
        ValidateMode::NonOptionalTyped(kind)
    }
}

/// A factory calling `kind(*args, **kwargs)` on every invocation.
pub(crate) fn construct_factory(kind: Kind, args: Vec<Value>, kwargs: Kwargs) -> Factory {
    Arc::new(move || kind.construct(&args, &kwargs))
}
