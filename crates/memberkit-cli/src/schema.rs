//! # Class Schemas
//!
//! YAML documents declaring opaque kinds and classes. Classes are built in
//! document order, so a base must be declared before the classes that
//! extend it. Member types are looked up when the class is built, except
//! for `forward` members, which look their type up on first use and may
//! therefore name the declaring class itself or a class declared later.
//!
//! ```yaml
//! kinds:
//!   - name: Token
//! classes:
//!   - name: Node
//!     slots: [tag, __dict__]
//!     members:
//!       - { name: value, kind: typed, type: int, args: [] }
//!       - { name: next, kind: forward, type: Node }
//!       - { name: label, kind: value, default: "node" }
//! ```
//!
//! Constructor arguments and `value` defaults use the same tagged JSON
//! encoding as captured state, so datetimes are written as
//! `{__datetime__: "..."}`.

use std::path::Path;
use std::sync::{Arc, Weak};

use memberkit_core::{Kind, Kwargs, MemberError, Value};
use memberkit_member::{ForwardTyped, Member, Typed};
use memberkit_object::{Class, ClassBuilder, TypeRegistry};
use memberkit_state::{decode_value, CodecError};
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;

/// A registry shared with the forward members that resolve through it.
pub type SharedRegistry = Arc<RwLock<TypeRegistry>>;

/// Failure while loading or building a schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The file could not be read.
    #[error("cannot read schema {path}: {source}")]
    Io {
        /// Schema path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not a valid schema.
    #[error("invalid schema: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A base class is not declared before its subclass.
    #[error("class '{class}' extends undeclared class '{base}'")]
    UnknownBase {
        /// The class being built.
        class: String,
        /// The missing base.
        base: String,
    },

    /// A typed member names a type that is not registered.
    #[error("member '{member}' of class '{class}' has unknown type '{type_name}'")]
    UnknownType {
        /// The class being built.
        class: String,
        /// The member being declared.
        member: String,
        /// The missing type name.
        type_name: String,
    },

    /// Building a class or registering a name failed.
    #[error(transparent)]
    Member(#[from] MemberError),

    /// A default or constructor argument could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ─── Document model ─────────────────────────────────────────────────

/// A schema document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Schema {
    /// Opaque kinds, registered before any class.
    #[serde(default)]
    pub kinds: Vec<KindDecl>,
    /// Classes, built in order.
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
}

/// An opaque kind declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindDecl {
    pub name: String,
    #[serde(default)]
    pub bases: Vec<String>,
}

/// A class declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default)]
    pub dict: bool,
    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

/// A member declaration, tagged by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum MemberDecl {
    /// A member constrained to a type known at build time.
    Typed {
        name: String,
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default = "optional_by_default")]
        optional: bool,
        #[serde(default)]
        args: Option<Vec<serde_json::Value>>,
        #[serde(default)]
        kwargs: Option<serde_json::Map<String, serde_json::Value>>,
    },
    /// A typed member whose type is looked up on first use.
    Forward {
        name: String,
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default = "optional_by_default")]
        optional: bool,
        #[serde(default)]
        args: Option<Vec<serde_json::Value>>,
        #[serde(default)]
        kwargs: Option<serde_json::Map<String, serde_json::Value>>,
    },
    /// An unconstrained member with a constant default.
    Value {
        name: String,
        #[serde(default)]
        default: serde_json::Value,
    },
}

fn optional_by_default() -> bool {
    true
}

impl MemberDecl {
    /// The declared member name.
    pub fn name(&self) -> &str {
        match self {
            Self::Typed { name, .. } | Self::Forward { name, .. } | Self::Value { name, .. } => {
                name
            }
        }
    }
}

// ─── Loading and building ───────────────────────────────────────────

/// Read and build a schema file.
pub fn load(path: &Path) -> Result<SharedRegistry, SchemaError> {
    let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    build_str(&text)
}

/// Parse and build a schema document.
pub fn build_str(text: &str) -> Result<SharedRegistry, SchemaError> {
    let schema: Schema = serde_yaml::from_str(text)?;
    build(&schema)
}

/// Build every kind and class in `schema` into a fresh registry.
pub fn build(schema: &Schema) -> Result<SharedRegistry, SchemaError> {
    let registry: SharedRegistry = Arc::new(RwLock::new(TypeRegistry::new()));
    for decl in &schema.kinds {
        let bases = decl
            .bases
            .iter()
            .map(|base| registry.read().resolve(base))
            .collect::<Result<Vec<Kind>, _>>()?;
        registry.write().register_kind(Kind::opaque(decl.name.clone(), &bases))?;
    }
    for decl in &schema.classes {
        let class = build_class(decl, &registry)?;
        registry.write().register_class(class)?;
    }
    tracing::debug!(
        kinds = schema.kinds.len(),
        classes = schema.classes.len(),
        "schema built"
    );
    Ok(registry)
}

fn build_class(decl: &ClassDecl, registry: &SharedRegistry) -> Result<Class, SchemaError> {
    let mut builder = ClassBuilder::new(decl.name.clone()).slots(decl.slots.iter().cloned());
    if decl.dict {
        builder = builder.with_dict();
    }
    for base in &decl.bases {
        let class = registry.read().class(base).cloned().ok_or_else(|| {
            SchemaError::UnknownBase {
                class: decl.name.clone(),
                base: base.clone(),
            }
        })?;
        builder = builder.extends(&class);
    }
    for member in &decl.members {
        builder = builder.member(member.name(), build_member(&decl.name, member, registry)?);
    }
    Ok(builder.build()?)
}

fn build_member(
    class: &str,
    decl: &MemberDecl,
    registry: &SharedRegistry,
) -> Result<Member, SchemaError> {
    // Decoding may instantiate registered classes, so it runs on a snapshot
    // of the registry rather than under its lock.
    let snapshot = registry.read().clone();
    let member = match decl {
        MemberDecl::Typed {
            name,
            type_name,
            optional,
            args,
            kwargs,
        } => {
            let kind = snapshot.kind(type_name).cloned().ok_or_else(|| {
                SchemaError::UnknownType {
                    class: class.to_string(),
                    member: name.clone(),
                    type_name: type_name.clone(),
                }
            })?;
            let mut typed = Typed::new(kind).optional(*optional);
            if let Some(args) = args {
                typed = typed.args(decode_args(args, &snapshot)?);
            }
            if let Some(kwargs) = kwargs {
                typed = typed.kwargs(decode_kwargs(kwargs, &snapshot)?);
            }
            typed.build()
        }
        MemberDecl::Forward {
            type_name,
            optional,
            args,
            kwargs,
            ..
        } => {
            let mut forward = forward_lookup(registry, type_name.clone()).optional(*optional);
            if let Some(args) = args {
                forward = forward.args(decode_args(args, &snapshot)?);
            }
            if let Some(kwargs) = kwargs {
                forward = forward.kwargs(decode_kwargs(kwargs, &snapshot)?);
            }
            forward.build()
        }
        MemberDecl::Value { default, .. } => Member::value(decode_value(default, &snapshot)?),
    };
    Ok(member)
}

/// A forward member resolving `type_name` through `registry` on first use.
pub fn forward_lookup(registry: &SharedRegistry, type_name: String) -> ForwardTyped {
    let registry: Weak<RwLock<TypeRegistry>> = Arc::downgrade(registry);
    ForwardTyped::new(move || {
        let registry = registry.upgrade().ok_or_else(|| {
            MemberError::Unresolved(format!("registry for '{type_name}' was dropped"))
        })?;
        let kind = registry.read().resolve(&type_name)?;
        Ok(kind)
    })
}

fn decode_args(
    args: &[serde_json::Value],
    registry: &TypeRegistry,
) -> Result<Vec<Value>, CodecError> {
    args.iter().map(|arg| decode_value(arg, registry)).collect()
}

fn decode_kwargs(
    kwargs: &serde_json::Map<String, serde_json::Value>,
    registry: &TypeRegistry,
) -> Result<Kwargs, CodecError> {
    kwargs
        .iter()
        .map(|(k, v)| Ok::<_, CodecError>((k.clone(), decode_value(v, registry)?)))
        .collect()
}
