//! # Dynamic Values
//!
//! `Value` is the currency passed through validators, default policies, and
//! the state codec. Scalars, strings, datetimes, lists, and dicts compare
//! structurally; `Object` values compare by identity, so two instances with
//! equal attributes are still different values.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

use crate::kind::Kind;
use crate::object::{Object, ObjectRef};

/// Ordered string-keyed mapping, used for dict values and captured state.
pub type Dict = IndexMap<String, Value>;

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    None,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// UTC instant.
    DateTime(DateTime<Utc>),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Ordered mapping.
    Dict(Dict),
    /// Shared reference to a heap object.
    Object(ObjectRef),
}

impl Value {
    /// The runtime kind of this value.
    pub fn kind(&self) -> Kind {
        match self {
            Self::None => Kind::none_type(),
            Self::Bool(_) => Kind::bool(),
            Self::Int(_) => Kind::int(),
            Self::Float(_) => Kind::float(),
            Self::Str(_) => Kind::str(),
            Self::DateTime(_) => Kind::datetime(),
            Self::List(_) => Kind::list(),
            Self::Dict(_) => Kind::dict(),
            Self::Object(obj) => obj.kind().clone(),
        }
    }

    /// Name of the runtime kind, for error messages.
    pub fn type_name(&self) -> String {
        match self {
            Self::Object(obj) => obj.kind().name().to_string(),
            other => other.kind().name().to_string(),
        }
    }

    /// Whether this is `Value::None`.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Truthiness: empty containers, zero, and `None` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::DateTime(_) | Self::Object(_) => true,
            Self::List(items) => !items.is_empty(),
            Self::Dict(map) => !map.is_empty(),
        }
    }

    /// Integer view, if this is an `Int` or `Bool`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// String view, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Object view, if this is an `Object`.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Dict view, if this is a `Dict`.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Whether two values are the same object (identity, not equality).
    ///
    /// Non-object values are never identical to anything.
    pub fn is_same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => same_object(a, b),
            _ => false,
        }
    }
}

fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => same_object(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => f.write_str(s),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Dict(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Object(obj) => write!(f, "<{} object>", obj.kind().name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Dict> for Value {
    fn from(map: Dict) -> Self {
        Self::Dict(map)
    }
}

impl<T: Object + 'static> From<Arc<T>> for Value {
    fn from(obj: Arc<T>) -> Self {
        Self::Object(obj)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Opaque;

    #[test]
    fn scalar_kinds() {
        assert_eq!(Value::None.kind(), Kind::none_type());
        assert_eq!(Value::from(true).kind(), Kind::bool());
        assert_eq!(Value::from(3).kind(), Kind::int());
        assert_eq!(Value::from(1.5).kind(), Kind::float());
        assert_eq!(Value::from("x").kind(), Kind::str());
        assert_eq!(Value::List(vec![]).kind(), Kind::list());
        assert_eq!(Value::Dict(Dict::new()).kind(), Kind::dict());
    }

    #[test]
    fn objects_compare_by_identity() {
        let kind = Kind::new("Thing", &[]);
        let a: Value = Arc::new(Opaque::new(kind.clone())).into();
        let b: Value = Arc::new(Opaque::new(kind)).into();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.is_same_object(&a.clone()));
        assert!(!a.is_same_object(&b));
    }

    #[test]
    fn containers_compare_structurally() {
        let mut m1 = Dict::new();
        m1.insert("a".into(), Value::from(1));
        let m2 = m1.clone();
        assert_eq!(Value::Dict(m1), Value::Dict(m2));
        assert_eq!(
            Value::List(vec![Value::from(1), Value::from("x")]),
            Value::List(vec![Value::from(1), Value::from("x")])
        );
    }

    #[test]
    fn bool_and_int_are_distinct_values() {
        assert_ne!(Value::from(true), Value::from(1));
        assert_eq!(Value::from(true).as_int(), Some(1));
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::None);
        assert_eq!(Value::from(Some(4)), Value::Int(4));
    }

    #[test]
    fn display_renders_literals() {
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::from(false).to_string(), "False");
        assert_eq!(Value::from(2.0).to_string(), "2.0");
        assert_eq!(
            Value::List(vec![Value::from(1), Value::from(2)]).to_string(),
            "[1, 2]"
        );
    }
}
