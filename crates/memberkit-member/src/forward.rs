//! # ForwardTyped: Typed Members With Deferred Kind Resolution
//!
//! A `ForwardTyped` member names its kind through a zero-argument resolve
//! callback instead of a concrete `Kind`, so a class can declare a member
//! whose kind does not exist yet (itself, or a class declared later).
//!
//! ## State Machine
//!
//! ```text
//! Unresolved { resolve, args, kwargs, optional }
//!        │  first default computation OR first validation
//!        ▼
//! Resolved(kind) ── modes rewritten to Typed / NonOptionalTyped + kind(*args, **kwargs)
//! ```
//!
//! The transition is one-way. Whichever path runs first calls `resolve`;
//! the result is memoized in a `OnceCell`, and both member modes are then
//! rewritten under a single write lock, so every later access goes through
//! the concrete typed path and never touches the resolver again.
//!
//! ## Concurrency
//!
//! The member is shared by every instance of the declaring class, so the
//! transition is class-wide. The `OnceCell` serializes concurrent first use
//! (one caller resolves, the others wait for its result). A resolve
//! callback must not read or write the member it is resolving: re-entering
//! the cell during initialization blocks forever. Callers that cannot
//! guarantee this should warm the member up before sharing the class.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use memberkit_core::{Kind, Kwargs, Object, Result, Value};
use once_cell::sync::OnceCell;

use crate::member::{DefaultMode, Factory, Member, MemberHandler, ValidateMode};
use crate::typed::{construct_factory, typed_validate_mode};

/// Zero-argument callback returning the member's kind.
pub type Resolve = Arc<dyn Fn() -> Result<Kind> + Send + Sync>;

/// Declaration of a `ForwardTyped` member.
#[derive(Clone)]
pub struct ForwardTyped {
    resolve: Resolve,
    args: Option<Vec<Value>>,
    kwargs: Option<Kwargs>,
    factory: Option<Factory>,
    optional: bool,
}

impl ForwardTyped {
    /// Declare a member whose kind is produced by `resolve` on first use.
    pub fn new(resolve: impl Fn() -> Result<Kind> + Send + Sync + 'static) -> Self {
        Self {
            resolve: Arc::new(resolve),
            args: None,
            kwargs: None,
            factory: None,
            optional: true,
        }
    }

    /// Positional arguments for constructing the default once resolved.
    pub fn args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Keyword arguments for constructing the default once resolved.
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

    /// Produce the member with the resolver installed.
    pub fn build(self) -> Member {
        let uses_constructor = self.factory.is_none()
            && (self.args.is_some() || self.kwargs.is_some());
        let resolver: Arc<dyn MemberHandler> = Arc::new(ForwardResolver {
            resolve: self.resolve,
            args: self.args,
            kwargs: self.kwargs,
            optional: self.optional,
            resolved: OnceCell::new(),
        });
        let member = Member::new();
        if let Some(factory) = self.factory {
            member.set_default_value_mode(DefaultMode::CallObject(factory));
        } else if uses_constructor {
            member.set_default_value_mode(DefaultMode::MemberMethod(resolver.clone()));
        } else if !self.optional {
            member.set_default_value_mode(DefaultMode::NonOptional);
        }
        member.set_validate_mode(ValidateMode::MemberMethod(resolver));
        member
    }

    /// Inspect where a forward member stands in its resolution.
    ///
    /// A resolved forward member is indistinguishable from a concrete typed
    /// member, so any `Typed` or `NonOptionalTyped` member reports
    /// `Resolved` with its kind. Returns `None` for members with no type
    /// constraint at all.
    pub fn resolution_of(member: &Member) -> Option<Resolution> {
        match member.validate_mode() {
            ValidateMode::MemberMethod(handler) => handler
                .as_any()
                .downcast_ref::<ForwardResolver>()
                .map(ForwardResolver::state),
            ValidateMode::Typed(kind) | ValidateMode::NonOptionalTyped(kind) => {
                Some(Resolution::Resolved(kind))
            }
            _ => None,
        }
    }
}

impl From<ForwardTyped> for Member {
    fn from(forward: ForwardTyped) -> Self {
        forward.build()
    }
}

/// Observable state of a forward resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// `resolve` has not yet succeeded.
    Unresolved,
    /// The kind is known and the member behaves as a typed member.
    Resolved(Kind),
}

/// Handler behind a `ForwardTyped` member's `MemberMethod` modes.
pub struct ForwardResolver {
    resolve: Resolve,
    args: Option<Vec<Value>>,
    kwargs: Option<Kwargs>,
    optional: bool,
    resolved: OnceCell<Kind>,
}

impl ForwardResolver {
    /// Current resolution state.
    pub fn state(&self) -> Resolution {
        match self.resolved.get() {
            Some(kind) => Resolution::Resolved(kind.clone()),
            None => Resolution::Unresolved,
        }
    }

    /// Optionality snapshotted at declaration time.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Resolve the kind, running `resolve` at most once per successful call.
    ///
    /// A failed resolve is not memoized; the next access retries.
    fn kind(&self) -> Result<Kind> {
        self.resolved
            .get_or_try_init(|| {
                let kind = (self.resolve)()?;
                tracing::debug!(kind = %kind, "forward member type resolved");
                Ok(kind)
            })
            .cloned()
    }

    fn is(&self, handler: &Arc<dyn MemberHandler>) -> bool {
        Arc::as_ptr(handler) as *const () == self as *const Self as *const ()
    }

    /// Rewrite every mode still pointing at this resolver to its concrete form.
    fn settle(&self, member: &Member, kind: &Kind) {
        member.transition_modes(|validate, default| {
            let owns_validate = matches!(validate, ValidateMode::MemberMethod(h) if self.is(h));
            if owns_validate {
                *validate = typed_validate_mode(kind.clone(), self.optional);
            }
            let owns_default = matches!(default, DefaultMode::MemberMethod(h) if self.is(h));
            if owns_default {
                *default = DefaultMode::CallObject(construct_factory(
                    kind.clone(),
                    self.args.clone().unwrap_or_default(),
                    self.kwargs.clone().unwrap_or_default(),
                ));
            }
        });
    }
}

impl MemberHandler for ForwardResolver {
    fn default_value(&self, member: &Member, _owner: &dyn Object) -> Result<Value> {
        let kind = self.kind()?;
        self.settle(member, &kind);
        let empty = Kwargs::new();
        kind.construct(
            self.args.as_deref().unwrap_or_default(),
            self.kwargs.as_ref().unwrap_or(&empty),
        )
    }

    fn validate(&self, member: &Member, owner: &dyn Object, old: &Value, new: Value) -> Result<Value> {
        let kind = self.kind()?;
        self.settle(member, &kind);
        let mode = typed_validate_mode(kind, self.optional);
        member.validate_with(&mode, owner, old, new)
    }

    /// Copies `resolve`, `args`, `kwargs`, and `optional`; the copy starts
    /// unresolved and resolves independently.
    fn duplicate(&self) -> Arc<dyn MemberHandler> {
        Arc::new(ForwardResolver {
            resolve: self.resolve.clone(),
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
            optional: self.optional,
            resolved: OnceCell::new(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for ForwardResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardResolver")
            .field("state", &self.state())
            .field("optional", &self.optional)
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .finish()
    }
}
