//! # Builtin Kinds
//!
//! The kinds of the non-object [`Value`] variants, plus the `object` root.
//! Each is created once per process and carries a constructor that mirrors
//! calling the type with arguments.
//!
//! | Kind       | Bases    | `kind()`      | `kind(x)`                          |
//! |------------|----------|---------------|------------------------------------|
//! | `object`   | -        | bare object   | rejected                           |
//! | `NoneType` | object   | `None`        | rejected                           |
//! | `int`      | object   | `0`           | int, bool, truncated float, parsed str |
//! | `bool`     | int      | `False`       | truthiness of `x`                  |
//! | `float`    | object   | `0.0`         | float, int, bool, parsed str       |
//! | `str`      | object   | `""`          | display form of `x`                |
//! | `datetime` | object   | rejected      | RFC 3339 str, or `(y, m, d[, H, M, S])` |
//! | `list`     | object   | `[]`          | copy of a list                     |
//! | `dict`     | object   | `{}` / kwargs | copy of a dict, merged with kwargs |

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;

use crate::error::{MemberError, Result};
use crate::kind::{Constructor, Kind, Kwargs};
use crate::object::Opaque;
use crate::value::Value;

static OBJECT: Lazy<Kind> = Lazy::new(|| {
    let kind = Kind::root("object");
    install(&kind, |kind, args, kwargs| {
        no_arguments(kind, args, kwargs)?;
        Ok(Value::Object(Arc::new(Opaque::new(kind.clone()))))
    });
    kind
});

static NONE_TYPE: Lazy<Kind> = Lazy::new(|| {
    let kind = Kind::new("NoneType", &[]);
    install(&kind, |kind, args, kwargs| {
        no_arguments(kind, args, kwargs)?;
        Ok(Value::None)
    });
    kind
});

static INT: Lazy<Kind> = Lazy::new(|| {
    let kind = Kind::new("int", &[]);
    install(&kind, |kind, args, kwargs| {
        match at_most_one(kind, args, kwargs)? {
            None => Ok(Value::Int(0)),
            Some(Value::Int(i)) => Ok(Value::Int(*i)),
            Some(Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
            Some(Value::Float(x)) if x.is_finite() => {
                let whole = x.trunc();
                if (i64::MIN as f64..i64::MAX as f64).contains(&whole) {
                    Ok(Value::Int(whole as i64))
                } else {
                    Err(construct_error(kind, "float out of range"))
                }
            }
            Some(Value::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| construct_error(kind, format!("invalid literal {s:?}: {e}"))),
            Some(other) => Err(construct_error(
                kind,
                format!("unsupported argument of type '{}'", other.type_name()),
            )),
        }
    });
    kind
});

static BOOL: Lazy<Kind> = Lazy::new(|| {
    let kind = Kind::new("bool", &[Kind::int()]);
    install(&kind, |kind, args, kwargs| {
        Ok(Value::Bool(
            at_most_one(kind, args, kwargs)?.is_some_and(Value::is_truthy),
        ))
    });
    kind
});

static FLOAT: Lazy<Kind> = Lazy::new(|| {
    let kind = Kind::new("float", &[]);
    install(&kind, |kind, args, kwargs| {
        match at_most_one(kind, args, kwargs)? {
            None => Ok(Value::Float(0.0)),
            Some(Value::Float(x)) => Ok(Value::Float(*x)),
            Some(Value::Int(i)) => Ok(Value::Float(*i as f64)),
            Some(Value::Bool(b)) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            Some(Value::Str(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| construct_error(kind, format!("invalid literal {s:?}: {e}"))),
            Some(other) => Err(construct_error(
                kind,
                format!("unsupported argument of type '{}'", other.type_name()),
            )),
        }
    });
    kind
});

static STR: Lazy<Kind> = Lazy::new(|| {
    let kind = Kind::new("str", &[]);
    install(&kind, |kind, args, kwargs| {
        Ok(Value::Str(
            at_most_one(kind, args, kwargs)?
                .map(ToString::to_string)
                .unwrap_or_default(),
        ))
    });
    kind
});

static DATETIME: Lazy<Kind> = Lazy::new(|| {
    let kind = Kind::new("datetime", &[]);
    install(&kind, |kind, args, kwargs| {
        if !kwargs.is_empty() {
            return Err(construct_error(kind, "keyword arguments are not supported"));
        }
        match args {
            [] => Err(construct_error(kind, "missing required argument 'year'")),
            [Value::Str(s)] => DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| construct_error(kind, format!("invalid timestamp {s:?}: {e}"))),
            [Value::DateTime(dt)] => Ok(Value::DateTime(*dt)),
            parts if parts.len() >= 3 && parts.len() <= 6 => {
                let mut fields = [0i64; 6];
                for (slot, part) in fields.iter_mut().zip(parts) {
                    *slot = part.as_int().ok_or_else(|| {
                        construct_error(
                            kind,
                            format!("integer argument expected, got '{}'", part.type_name()),
                        )
                    })?;
                }
                datetime_from_fields(kind, fields)
            }
            _ => Err(construct_error(kind, "expected 1 or 3 to 6 arguments")),
        }
    });
    kind
});

static LIST: Lazy<Kind> = Lazy::new(|| {
    let kind = Kind::new("list", &[]);
    install(&kind, |kind, args, kwargs| {
        match at_most_one(kind, args, kwargs)? {
            None => Ok(Value::List(Vec::new())),
            Some(Value::List(items)) => Ok(Value::List(items.clone())),
            Some(other) => Err(construct_error(
                kind,
                format!("'{}' object is not iterable", other.type_name()),
            )),
        }
    });
    kind
});

static DICT: Lazy<Kind> = Lazy::new(|| {
    let kind = Kind::new("dict", &[]);
    install(&kind, |kind, args, kwargs| {
        let mut map = match args {
            [] => Kwargs::new(),
            [Value::Dict(items)] => items.clone(),
            [other] => {
                return Err(construct_error(
                    kind,
                    format!("'{}' object is not a mapping", other.type_name()),
                ))
            }
            _ => {
                return Err(MemberError::Arity {
                    callable: kind.name().to_string(),
                    expected: 1,
                    given: args.len(),
                })
            }
        };
        map.extend(kwargs.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(Value::Dict(map))
    });
    kind
});

impl Kind {
    /// The `object` root kind.
    pub fn object() -> Kind {
        OBJECT.clone()
    }

    /// The kind of `Value::None`.
    pub fn none_type() -> Kind {
        NONE_TYPE.clone()
    }

    /// The `bool` kind, a subtype of `int`.
    pub fn bool() -> Kind {
        BOOL.clone()
    }

    /// The `int` kind.
    pub fn int() -> Kind {
        INT.clone()
    }

    /// The `float` kind.
    pub fn float() -> Kind {
        FLOAT.clone()
    }

    /// The `str` kind.
    pub fn str() -> Kind {
        STR.clone()
    }

    /// The `datetime` kind.
    pub fn datetime() -> Kind {
        DATETIME.clone()
    }

    /// The `list` kind.
    pub fn list() -> Kind {
        LIST.clone()
    }

    /// The `dict` kind.
    pub fn dict() -> Kind {
        DICT.clone()
    }
}

/// Every builtin kind, in a stable order.
pub fn builtin_kinds() -> Vec<Kind> {
    vec![
        Kind::object(),
        Kind::none_type(),
        Kind::bool(),
        Kind::int(),
        Kind::float(),
        Kind::str(),
        Kind::datetime(),
        Kind::list(),
        Kind::dict(),
    ]
}

fn install(
    kind: &Kind,
    ctor: impl Fn(&Kind, &[Value], &Kwargs) -> Result<Value> + Send + Sync + 'static,
) {
    let ctor: Constructor = Arc::new(ctor);
    // Builtins are installed exactly once, from their Lazy initializer.
    let _ = kind.set_constructor(ctor);
}

fn construct_error(kind: &Kind, reason: impl Into<String>) -> MemberError {
    MemberError::Construct {
        kind: kind.name().to_string(),
        reason: reason.into(),
    }
}

fn no_arguments(kind: &Kind, args: &[Value], kwargs: &Kwargs) -> Result<()> {
    if args.is_empty() && kwargs.is_empty() {
        Ok(())
    } else {
        Err(construct_error(kind, "takes no arguments"))
    }
}

fn at_most_one<'a>(kind: &Kind, args: &'a [Value], kwargs: &Kwargs) -> Result<Option<&'a Value>> {
    if !kwargs.is_empty() {
        return Err(construct_error(kind, "keyword arguments are not supported"));
    }
    match args {
        [] => Ok(None),
        [one] => Ok(Some(one)),
        _ => Err(MemberError::Arity {
            callable: kind.name().to_string(),
            expected: 1,
            given: args.len(),
        }),
    }
}

fn datetime_from_fields(kind: &Kind, fields: [i64; 6]) -> Result<Value> {
    let [year, month, day, hour, minute, second] = fields;
    let narrow = |v: i64| {
        u32::try_from(v).map_err(|_| construct_error(kind, format!("field out of range: {v}")))
    };
    let year = i32::try_from(year)
        .map_err(|_| construct_error(kind, format!("year out of range: {year}")))?;
    Utc.with_ymd_and_hms(
        year,
        narrow(month)?,
        narrow(day)?,
        narrow(hour)?,
        narrow(minute)?,
        narrow(second)?,
    )
    .single()
    .map(Value::DateTime)
    .ok_or_else(|| construct_error(kind, "date fields do not form a valid instant"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn call(kind: &Kind, args: &[Value]) -> Result<Value> {
        kind.construct(args, &Kwargs::new())
    }

    #[test]
    fn bool_is_subtype_of_int() {
        assert!(Kind::bool().is_subtype_of(&Kind::int()));
        assert!(!Kind::int().is_subtype_of(&Kind::bool()));
    }

    #[test]
    fn every_builtin_descends_from_object() {
        for kind in builtin_kinds() {
            assert!(kind.is_subtype_of(&Kind::object()), "{kind}");
        }
    }

    #[test]
    fn builtin_kinds_are_singletons() {
        assert_eq!(Kind::int(), Kind::int());
        assert_eq!(Kind::int().id(), Kind::int().id());
    }

    #[test]
    fn zero_argument_defaults() {
        assert_eq!(Kind::int().call0().unwrap(), Value::Int(0));
        assert_eq!(Kind::bool().call0().unwrap(), Value::Bool(false));
        assert_eq!(Kind::float().call0().unwrap(), Value::Float(0.0));
        assert_eq!(Kind::str().call0().unwrap(), Value::from(""));
        assert_eq!(Kind::list().call0().unwrap(), Value::List(vec![]));
        assert_eq!(Kind::none_type().call0().unwrap(), Value::None);
    }

    #[test]
    fn int_conversions() {
        assert_eq!(call(&Kind::int(), &["42".into()]).unwrap(), Value::Int(42));
        assert_eq!(call(&Kind::int(), &[Value::Float(3.9)]).unwrap(), Value::Int(3));
        assert!(matches!(
            call(&Kind::int(), &["nope".into()]),
            Err(MemberError::Construct { .. })
        ));
        assert!(matches!(
            call(&Kind::int(), &[Value::Int(1), Value::Int(2)]),
            Err(MemberError::Arity { given: 2, .. })
        ));
    }

    #[test]
    fn int_rejects_floats_outside_its_range() {
        for x in [1e300, -1e300, 9.3e18] {
            assert!(matches!(
                call(&Kind::int(), &[Value::Float(x)]),
                Err(MemberError::Construct { ref reason, .. }) if reason == "float out of range"
            ));
        }
        assert_eq!(
            call(&Kind::int(), &[Value::Float(-9.2e18)]).unwrap(),
            Value::Int(-9_200_000_000_000_000_000)
        );
    }

    #[test]
    fn datetime_requires_arguments() {
        assert!(Kind::datetime().call0().is_err());
        let dt = call(
            &Kind::datetime(),
            &[Value::Int(2022), Value::Int(3), Value::Int(14)],
        )
        .unwrap();
        match dt {
            Value::DateTime(dt) => assert_eq!((dt.year(), dt.month(), dt.day()), (2022, 3, 14)),
            other => panic!("expected datetime, got {other:?}"),
        }
        assert!(call(&Kind::datetime(), &["2022-03-14T00:00:00Z".into()]).is_ok());
        assert!(call(&Kind::datetime(), &[Value::Int(2022), Value::Int(13), Value::Int(1)]).is_err());
    }

    #[test]
    fn dict_merges_keywords() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("b".into(), Value::Int(2));
        let mut seed = Kwargs::new();
        seed.insert("a".into(), Value::Int(1));
        let v = Kind::dict().construct(&[Value::Dict(seed)], &kwargs).unwrap();
        let map = v.as_dict().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn object_constructs_distinct_opaque_values() {
        let a = Kind::object().call0().unwrap();
        let b = Kind::object().call0().unwrap();
        assert_eq!(a.kind(), Kind::object());
        assert!(!a.is_same_object(&b));
    }
}
