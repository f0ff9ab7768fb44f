//! # Runtime Kinds: Type Objects With Linearized Ancestry
//!
//! A `Kind` is the runtime type of a [`Value`]. Typed members check values
//! against a kind with an exact-or-descendant membership test: the value's
//! kind must be the required kind itself or carry it in its ancestor list.
//! There is no structural or duck-typed matching.
//!
//! ## Linearization
//!
//! Ancestors are computed once, at construction, by walking each base's own
//! linearization left to right and keeping the *last* occurrence of any kind
//! that appears more than once. Shared diamond bases therefore sort after
//! every subclass that reaches them, and `object` always comes last.
//!
//! ## Identity
//!
//! Kinds compare and hash by identity. Two kinds with the same name declared
//! separately are different kinds.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use crate::error::{MemberError, Result};
use crate::object::Opaque;
use crate::value::Value;

/// Keyword arguments passed to a kind constructor.
pub type Kwargs = IndexMap<String, Value>;

/// Constructor installed on a kind: `(kind, args, kwargs) -> instance`.
pub type Constructor = Arc<dyn Fn(&Kind, &[Value], &Kwargs) -> Result<Value> + Send + Sync>;

/// A runtime type object.
#[derive(Clone)]
pub struct Kind(Arc<KindInner>);

struct KindInner {
    name: String,
    bases: Vec<Kind>,
    ancestors: Vec<Kind>,
    constructor: OnceCell<Constructor>,
}

impl Kind {
    /// Declare a new kind deriving from `bases`.
    ///
    /// An empty base list derives from `object`. The kind has no
    /// constructor until one is installed with [`Kind::set_constructor`].
    pub fn new(name: impl Into<String>, bases: &[Kind]) -> Self {
        let bases = if bases.is_empty() {
            vec![Kind::object()]
        } else {
            bases.to_vec()
        };
        let ancestors = linearize(&bases);
        Self(Arc::new(KindInner {
            name: name.into(),
            bases,
            ancestors,
            constructor: OnceCell::new(),
        }))
    }

    /// Declare a kind whose constructor produces bare, attribute-less objects.
    pub fn opaque(name: impl Into<String>, bases: &[Kind]) -> Self {
        let kind = Self::new(name, bases);
        let ctor: Constructor = Arc::new(|kind: &Kind, args: &[Value], kwargs: &Kwargs| {
            if !args.is_empty() || !kwargs.is_empty() {
                return Err(MemberError::Construct {
                    kind: kind.name().to_string(),
                    reason: "takes no arguments".to_string(),
                });
            }
            Ok(Value::Object(Arc::new(Opaque::new(kind.clone()))))
        });
        // A freshly created cell cannot already be populated.
        let _ = kind.0.constructor.set(ctor);
        kind
    }

    /// The root kind every other kind descends from.
    pub(crate) fn root(name: &str) -> Self {
        Self(Arc::new(KindInner {
            name: name.to_string(),
            bases: Vec::new(),
            ancestors: Vec::new(),
            constructor: OnceCell::new(),
        }))
    }

    /// The kind's declared name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Direct bases, in declaration order.
    pub fn bases(&self) -> &[Kind] {
        &self.0.bases
    }

    /// The linearized ancestry: this kind first, then every ancestor.
    pub fn mro(&self) -> impl Iterator<Item = &Kind> {
        std::iter::once(self).chain(self.0.ancestors.iter())
    }

    /// Exact-or-descendant check: `self` is `other` or inherits from it.
    pub fn is_subtype_of(&self, other: &Kind) -> bool {
        self == other || self.0.ancestors.iter().any(|k| k == other)
    }

    /// Install the constructor used when this kind is called.
    ///
    /// # Errors
    ///
    /// Returns `MemberError::Declaration` if a constructor is already installed.
    pub fn set_constructor(&self, ctor: Constructor) -> Result<()> {
        self.0.constructor.set(ctor).map_err(|_| {
            MemberError::Declaration(format!(
                "kind '{}' already has a constructor",
                self.name()
            ))
        })
    }

    /// Whether calling this kind can produce a value.
    pub fn is_constructible(&self) -> bool {
        self.0.constructor.get().is_some()
    }

    /// Call the kind as a constructor: `kind(*args, **kwargs)`.
    ///
    /// # Errors
    ///
    /// Returns `MemberError::Construct` if the kind has no constructor, and
    /// propagates whatever the constructor raises.
    pub fn construct(&self, args: &[Value], kwargs: &Kwargs) -> Result<Value> {
        match self.0.constructor.get() {
            Some(ctor) => ctor(self, args, kwargs),
            None => Err(MemberError::Construct {
                kind: self.name().to_string(),
                reason: "kind is not callable".to_string(),
            }),
        }
    }

    /// Shorthand for calling the kind with no arguments.
    pub fn call0(&self) -> Result<Value> {
        self.construct(&[], &Kwargs::new())
    }

    /// Address-based identity, stable for the kind's lifetime.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

fn linearize(bases: &[Kind]) -> Vec<Kind> {
    let order: Vec<Kind> = bases.iter().flat_map(|b| b.mro().cloned()).collect();
    order
        .iter()
        .enumerate()
        .filter(|&(i, k)| !order[i + 1..].contains(k))
        .map(|(_, k)| k.clone())
        .collect()
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Kind {}

impl Hash for Kind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kind({})", self.name())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(kind: &Kind) -> Vec<&str> {
        kind.mro().map(|k| k.name()).collect()
    }

    #[test]
    fn new_kind_descends_from_object() {
        let k = Kind::new("Point", &[]);
        assert!(k.is_subtype_of(&Kind::object()));
        assert_eq!(names(&k), vec!["Point", "object"]);
    }

    #[test]
    fn subtype_is_not_symmetric() {
        let base = Kind::new("Base", &[]);
        let child = Kind::new("Child", &[base.clone()]);
        assert!(child.is_subtype_of(&base));
        assert!(!base.is_subtype_of(&child));
    }

    #[test]
    fn diamond_linearization_keeps_shared_base_last() {
        let a = Kind::new("A", &[]);
        let b = Kind::new("B", &[a.clone()]);
        let c = Kind::new("C", &[a.clone()]);
        let d = Kind::new("D", &[b, c]);
        assert_eq!(names(&d), vec!["D", "B", "C", "A", "object"]);
    }

    #[test]
    fn same_name_kinds_are_distinct() {
        let one = Kind::new("Same", &[]);
        let two = Kind::new("Same", &[]);
        assert_ne!(one, two);
        assert!(!one.is_subtype_of(&two));
    }

    #[test]
    fn kind_without_constructor_is_not_callable() {
        let k = Kind::new("Abstract", &[]);
        assert!(!k.is_constructible());
        assert!(matches!(k.call0(), Err(MemberError::Construct { .. })));
    }

    #[test]
    fn opaque_kind_builds_fresh_objects() {
        let k = Kind::opaque("Token", &[]);
        let a = k.call0().unwrap();
        let b = k.call0().unwrap();
        assert_eq!(a.kind(), k);
        assert_ne!(a, b);
        assert!(k.construct(&[Value::Int(1)], &Kwargs::new()).is_err());
    }

    #[test]
    fn constructor_can_only_be_installed_once() {
        let k = Kind::opaque("Once", &[]);
        let ctor: Constructor = Arc::new(|_: &Kind, _: &[Value], _: &Kwargs| Ok(Value::None));
        assert!(matches!(
            k.set_constructor(ctor),
            Err(MemberError::Declaration(_))
        ));
    }
}
