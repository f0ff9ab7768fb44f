//! Object trait implemented by every heap value carried in [`Value::Object`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{MemberError, Result};
use crate::kind::Kind;
use crate::value::Value;

/// A runtime object with a kind and an attribute protocol.
///
/// Member callbacks receive their owner as `&dyn Object`, so owner-side
/// validators and default factories can read sibling attributes without
/// knowing the concrete storage type.
pub trait Object: Send + Sync + fmt::Debug {
    /// The object's runtime kind.
    fn kind(&self) -> &Kind;

    /// Read an attribute through the object's normal read path.
    fn get_attr(&self, name: &str) -> Result<Value> {
        Err(MemberError::UnknownAttribute {
            class: self.kind().name().to_string(),
            name: name.to_string(),
        })
    }

    /// Write an attribute through the object's normal write path.
    fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        let _ = value;
        Err(MemberError::UnknownAttribute {
            class: self.kind().name().to_string(),
            name: name.to_string(),
        })
    }

    /// Downcasting hook.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an object.
pub type ObjectRef = Arc<dyn Object>;

/// A bare object with a kind and no attributes.
#[derive(Debug)]
pub struct Opaque {
    kind: Kind,
}

impl Opaque {
    /// Create a bare object of `kind`.
    pub fn new(kind: Kind) -> Self {
        Self { kind }
    }
}

impl Object for Opaque {
    fn kind(&self) -> &Kind {
        &self.kind
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
