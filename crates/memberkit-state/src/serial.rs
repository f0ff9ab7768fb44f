//! # Serialization Adapter: Tagged JSON Encoding of Captured State
//!
//! External serializers never see instances directly. They go through
//! [`capture`](crate::capture) and receive the canonical state mapping, so
//! the mapping's shape (extras, then slots, then members) is exactly what
//! ends up on the wire.
//!
//! ## Encoding
//!
//! | `Value`          | JSON                                            |
//! |------------------|-------------------------------------------------|
//! | `None`           | `null`                                          |
//! | `Bool` / `Int`   | boolean / integer                               |
//! | `Float`          | number (non-finite floats are rejected)         |
//! | `Str`            | string                                          |
//! | `DateTime`       | `{"__datetime__": "<rfc3339>"}`                 |
//! | `List` / `Dict`  | array / object, in insertion order              |
//! | instance         | `{"__class__": "<name>", "__state__": {...}}`   |
//!
//! Other objects have no encoding. Dict keys that collide with the tags are
//! rejected so that decoding is unambiguous. Reference cycles between
//! instances are detected and rejected.
//!
//! Decoding looks classes up in a [`TypeRegistry`], instantiates them with
//! every field unset, and applies the decoded state through
//! [`restore`](crate::restore), so every member value is validated again.

use chrono::{DateTime, SecondsFormat, Utc};
use memberkit_core::{Dict, MemberError, Value};
use memberkit_object::{Instance, TypeRegistry};
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value as Json};
use thiserror::Error;

use crate::codec::{capture, restore};

/// Tag key for an encoded instance's class name.
pub const CLASS_TAG: &str = "__class__";
/// Tag key for an encoded instance's captured state.
pub const STATE_TAG: &str = "__state__";
/// Tag key for an encoded datetime.
pub const DATETIME_TAG: &str = "__datetime__";

const TAGS: [&str; 3] = [CLASS_TAG, STATE_TAG, DATETIME_TAG];

/// Failure while encoding or decoding state.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Capture, restore, or validation failed.
    #[error(transparent)]
    Member(#[from] MemberError),

    /// JSON numbers cannot carry NaN or infinities.
    #[error("cannot encode non-finite float {0}")]
    NonFiniteFloat(f64),

    /// The object is not an instance of a memberkit class.
    #[error("cannot encode object of type '{0}'")]
    Unencodable(String),

    /// An instance reaches itself through its own state.
    #[error("reference cycle through a '{0}' instance")]
    Cycle(String),

    /// A dict key collides with an encoding tag.
    #[error("dict key '{0}' is reserved for tagged values")]
    ReservedKey(String),

    /// The encoded class name is not registered.
    #[error("no class named '{0}' is registered")]
    UnknownClass(String),

    /// A tagged object does not have the expected shape.
    #[error("malformed '{tag}' value: {reason}")]
    Malformed {
        /// The tag being decoded.
        tag: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

// ─── Encoding ───────────────────────────────────────────────────────

/// Encode a value as tagged JSON.
///
/// # Errors
///
/// See [`CodecError`]. Errors raised while capturing nested instances
/// propagate as `CodecError::Member`.
pub fn encode_value(value: &Value) -> Result<Json, CodecError> {
    Encoder::default().value(value)
}

/// Capture an instance and encode its state mapping as a JSON object.
pub fn encode_state(instance: &Instance) -> Result<Map<String, Json>, CodecError> {
    let mut encoder = Encoder::default();
    encoder.enter(instance)?;
    encoder.state(instance)
}

#[derive(Default)]
struct Encoder {
    visiting: Vec<usize>,
}

impl Encoder {
    fn value(&mut self, value: &Value) -> Result<Json, CodecError> {
        Ok(match value {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Float(x) => {
                Json::Number(Number::from_f64(*x).ok_or(CodecError::NonFiniteFloat(*x))?)
            }
            Value::Str(s) => Json::String(s.clone()),
            Value::DateTime(dt) => tagged(DATETIME_TAG, Json::String(rfc3339(dt))),
            Value::List(items) => {
                Json::Array(items.iter().map(|v| self.value(v)).collect::<Result<_, _>>()?)
            }
            Value::Dict(map) => Json::Object(self.dict(map)?),
            Value::Object(obj) => {
                let instance = obj
                    .as_any()
                    .downcast_ref::<Instance>()
                    .ok_or_else(|| CodecError::Unencodable(obj.kind().name().to_string()))?;
                self.instance(instance)?
            }
        })
    }

    fn dict(&mut self, map: &Dict) -> Result<Map<String, Json>, CodecError> {
        let mut out = Map::new();
        for (key, value) in map {
            if TAGS.contains(&key.as_str()) {
                return Err(CodecError::ReservedKey(key.clone()));
            }
            out.insert(key.clone(), self.value(value)?);
        }
        Ok(out)
    }

    fn instance(&mut self, instance: &Instance) -> Result<Json, CodecError> {
        self.enter(instance)?;
        let state = self.state(instance)?;
        self.visiting.pop();
        let mut out = Map::new();
        out.insert(CLASS_TAG.to_string(), Json::String(instance.class().name().to_string()));
        out.insert(STATE_TAG.to_string(), Json::Object(state));
        Ok(Json::Object(out))
    }

    fn enter(&mut self, instance: &Instance) -> Result<(), CodecError> {
        let id = instance as *const Instance as usize;
        if self.visiting.contains(&id) {
            return Err(CodecError::Cycle(instance.class().name().to_string()));
        }
        self.visiting.push(id);
        Ok(())
    }

    fn state(&mut self, instance: &Instance) -> Result<Map<String, Json>, CodecError> {
        let state = capture(instance)?;
        self.dict(&state)
    }
}

fn tagged(tag: &str, payload: Json) -> Json {
    let mut out = Map::new();
    out.insert(tag.to_string(), payload);
    Json::Object(out)
}

fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

// ─── Decoding ───────────────────────────────────────────────────────

/// Decode tagged JSON, instantiating classes from `registry`.
///
/// # Errors
///
/// Returns `CodecError::UnknownClass` for unregistered class names,
/// `CodecError::Malformed` for badly shaped tags, and
/// `CodecError::Member` for any error raised while restoring state.
pub fn decode_value(json: &Json, registry: &TypeRegistry) -> Result<Value, CodecError> {
    Ok(match json {
        Json::Null => Value::None,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(
            items
                .iter()
                .map(|item| decode_value(item, registry))
                .collect::<Result<_, _>>()?,
        ),
        Json::Object(map) => decode_object(map, registry)?,
    })
}

/// Restore an encoded state mapping onto an existing instance.
pub fn decode_state(
    instance: &Instance,
    state: &Map<String, Json>,
    registry: &TypeRegistry,
) -> Result<(), CodecError> {
    let mut items = Vec::with_capacity(state.len());
    for (name, value) in state {
        items.push((name.as_str(), decode_value(value, registry)?));
    }
    restore(instance, items)?;
    Ok(())
}

fn decode_object(map: &Map<String, Json>, registry: &TypeRegistry) -> Result<Value, CodecError> {
    if let Some(payload) = map.get(DATETIME_TAG) {
        let text = payload.as_str().ok_or_else(|| malformed(DATETIME_TAG, "expected a string"))?;
        let dt = DateTime::parse_from_rfc3339(text)
            .map_err(|e| malformed(DATETIME_TAG, e.to_string()))?;
        return Ok(Value::DateTime(dt.with_timezone(&Utc)));
    }
    if let Some(name) = map.get(CLASS_TAG) {
        let name = name.as_str().ok_or_else(|| malformed(CLASS_TAG, "expected a string"))?;
        let class = registry
            .class(name)
            .ok_or_else(|| CodecError::UnknownClass(name.to_string()))?;
        let instance = class.instantiate();
        match map.get(STATE_TAG) {
            Some(Json::Object(state)) => decode_state(&instance, state, registry)?,
            Some(_) => return Err(malformed(STATE_TAG, "expected an object")),
            None => {}
        }
        return Ok(Value::from(instance));
    }
    let mut out = Dict::new();
    for (key, value) in map {
        out.insert(key.clone(), decode_value(value, registry)?);
    }
    Ok(Value::Dict(out))
}

fn malformed(tag: &'static str, reason: impl Into<String>) -> CodecError {
    CodecError::Malformed {
        tag,
        reason: reason.into(),
    }
}

// ─── Serde adapter ──────────────────────────────────────────────────

/// Serializes an instance as its captured, encoded state mapping.
///
/// This is the implicit path a generic serializer takes: it calls
/// `capture`, never reads storage directly.
pub struct Snapshot<'a>(pub &'a Instance);

impl Serialize for Snapshot<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_state(self.0)
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use memberkit_core::Kind;
    use memberkit_member::{Member, Typed};
    use memberkit_object::{Class, ClassBuilder};

    fn point() -> Class {
        ClassBuilder::new("Point")
            .member("x", Typed::new(Kind::int()))
            .member("y", Typed::new(Kind::int()))
            .build()
            .unwrap()
    }

    #[test]
    fn snapshot_serializes_captured_state_in_order() {
        let obj = point().instantiate();
        obj.set_attr("y", Value::Int(2)).unwrap();
        obj.set_attr("x", Value::Int(1)).unwrap();
        let text = serde_json::to_string(&Snapshot(&obj)).unwrap();
        assert_eq!(text, r#"{"x":1,"y":2}"#);
    }

    #[test]
    fn snapshot_surfaces_capture_errors() {
        let class = ClassBuilder::new("Broken")
            .member("when", Typed::new(Kind::datetime()).factory(|| Ok(Value::Float(0.0))))
            .build()
            .unwrap();
        let obj = class.instantiate();
        let err = serde_json::to_string(&Snapshot(&obj)).unwrap_err();
        assert!(err.to_string().contains("must be of type 'datetime'"));
    }

    #[test]
    fn nested_instances_and_datetimes_decode_back() {
        let mut registry = TypeRegistry::new();
        let point = point();
        let event = ClassBuilder::new("Event")
            .member("at", Typed::new(Kind::datetime()))
            .member("where", Typed::new(point.kind().clone()))
            .member("tags", Member::value(Value::List(vec!["a".into()])))
            .build()
            .unwrap();
        registry.register_class(point.clone()).unwrap();
        registry.register_class(event.clone()).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let place = point.instantiate();
        place.set_attr("x", Value::Int(3)).unwrap();
        let obj = event.instantiate();
        obj.set_attr("at", Value::DateTime(at)).unwrap();
        obj.set_attr("where", Value::from(place)).unwrap();

        let json = encode_value(&Value::from(obj)).unwrap();
        assert_eq!(json["__class__"], "Event");
        assert_eq!(json["__state__"]["at"]["__datetime__"], "2024-05-01T12:00:00Z");
        assert_eq!(json["__state__"]["where"]["__state__"]["y"], Json::Null);

        let decoded = decode_value(&json, &registry).unwrap();
        let decoded = decoded.as_object().unwrap();
        assert_eq!(decoded.kind(), event.kind());
        assert_eq!(decoded.get_attr("at").unwrap(), Value::DateTime(at));
        let place = decoded.get_attr("where").unwrap();
        assert_eq!(place.as_object().unwrap().get_attr("x").unwrap(), Value::Int(3));
    }

    #[test]
    fn cycles_are_rejected() {
        let class = ClassBuilder::new("Loop")
            .member("next", Member::new())
            .build()
            .unwrap();
        let a = class.instantiate();
        let b = class.instantiate();
        a.set_attr("next", Value::from(b.clone())).unwrap();
        b.set_attr("next", Value::from(a.clone())).unwrap();
        assert!(matches!(encode_value(&Value::from(a)), Err(CodecError::Cycle(_))));
    }

    #[test]
    fn shared_instances_are_not_cycles() {
        let class = ClassBuilder::new("Pair")
            .member("left", Member::new())
            .member("right", Member::new())
            .build()
            .unwrap();
        let shared = point().instantiate();
        let pair = class.instantiate();
        pair.set_attr("left", Value::from(shared.clone())).unwrap();
        pair.set_attr("right", Value::from(shared)).unwrap();
        assert!(encode_value(&Value::from(pair)).is_ok());
    }

    #[test]
    fn unencodable_values_are_rejected() {
        let opaque = Kind::opaque("Handle", &[]).call0().unwrap();
        assert!(matches!(encode_value(&opaque), Err(CodecError::Unencodable(_))));
        assert!(matches!(
            encode_value(&Value::Float(f64::NAN)),
            Err(CodecError::NonFiniteFloat(_))
        ));
        let mut tagged = Dict::new();
        tagged.insert(CLASS_TAG.to_string(), Value::Int(1));
        assert!(matches!(encode_value(&Value::Dict(tagged)), Err(CodecError::ReservedKey(_))));
    }

    #[test]
    fn decoding_validates_through_restore() {
        let mut registry = TypeRegistry::new();
        registry.register_class(point()).unwrap();
        let json = serde_json::json!({"__class__": "Point", "__state__": {"x": "one"}});
        let err = decode_value(&json, &registry).unwrap_err();
        assert!(matches!(err, CodecError::Member(MemberError::TypeKind { .. })));
        let json = serde_json::json!({"__class__": "Nowhere"});
        assert!(matches!(decode_value(&json, &registry), Err(CodecError::UnknownClass(_))));
    }
}
