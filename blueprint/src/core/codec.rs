//! Structural codec: typed values to and from the generic value tree.
//!
//! The tree is `serde_json::Value` with insertion-ordered mappings, so the
//! same intermediate form feeds every format adapter. Each encodable type
//! implements [`Codec`]; records and enumerations get theirs from a
//! registered [`Schema`](super::schema::Schema).

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Number, Value};

use super::migrate::Migrator;
use crate::error::{Error, Result};

/// Wire-neutral intermediate form.
pub type ValueTree = Value;

/// String-keyed node of a [`ValueTree`].
pub type Mapping = Map<String, Value>;

/// Dotted location of a value inside the tree, used in error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Declared semantic type of a field.
#[derive(Debug, Clone)]
pub enum Kind {
    Bool,
    Integer,
    Float,
    String,
    Optional(Box<Kind>),
    Sequence(Box<Kind>),
    Mapping(Box<Kind>),
    Enumeration(&'static str),
    /// Field list is resolved lazily so self-referential records stay finite.
    Record {
        name: &'static str,
        fields: fn() -> Vec<FieldKind>,
    },
    /// Untyped tree, stored as-is.
    Any,
}

/// Name and kind of one record field.
#[derive(Debug, Clone)]
pub struct FieldKind {
    pub name: &'static str,
    pub kind: Kind,
}

impl Kind {
    /// Scalars are the only kinds a CSV cell can hold.
    pub fn is_scalar(&self) -> bool {
        match self {
            Kind::Bool | Kind::Integer | Kind::Float | Kind::String | Kind::Enumeration(_) => true,
            Kind::Optional(inner) => inner.is_scalar(),
            _ => false,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Bool => f.write_str("bool"),
            Kind::Integer => f.write_str("int"),
            Kind::Float => f.write_str("float"),
            Kind::String => f.write_str("str"),
            Kind::Optional(inner) => write!(f, "{inner} | None"),
            Kind::Sequence(inner) => write!(f, "list[{inner}]"),
            Kind::Mapping(inner) => write!(f, "dict[str, {inner}]"),
            Kind::Enumeration(name) | Kind::Record { name, .. } => f.write_str(name),
            Kind::Any => f.write_str("any"),
        }
    }
}

/// A type that can travel through the value tree.
pub trait Codec: Sized {
    fn kind() -> Kind;

    fn encode(&self, path: &FieldPath) -> Result<Value>;

    fn decode(value: &Value, path: &FieldPath) -> Result<Self>;

    /// Value for a key that is missing or null and has no declared default.
    fn absent(path: &FieldPath) -> Result<Self> {
        Err(Error::schema(
            path,
            format!("not a {}: value is missing", Self::kind()),
        ))
    }

    /// File name used when a save or load names none.
    fn file_name() -> Option<String> {
        None
    }

    /// Declared schema version and migration chain, if the type is versioned.
    fn migrator() -> Option<Migrator> {
        None
    }

    /// Rejects an inconsistently registered schema before any payload is read.
    fn verify() -> Result<()> {
        Ok(())
    }
}

/// Encode `value` starting at the tree root.
pub fn encode<T: Codec>(value: &T) -> Result<Value> {
    value.encode(&FieldPath::root())
}

/// Decode a `T` from the tree root.
pub fn decode<T: Codec>(tree: &Value) -> Result<T> {
    T::decode(tree, &FieldPath::root())
}

fn mismatch(path: &FieldPath, kind: &Kind, value: &Value) -> Error {
    let shown = match value {
        Value::Null => "value is missing".to_string(),
        other => other.to_string(),
    };
    Error::schema(path, format!("not a {kind}: {shown}"))
}

impl Codec for bool {
    fn kind() -> Kind {
        Kind::Bool
    }

    fn encode(&self, _path: &FieldPath) -> Result<Value> {
        Ok(Value::Bool(*self))
    }

    fn decode(value: &Value, path: &FieldPath) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(mismatch(path, &Kind::Bool, other)),
        }
    }
}

impl Codec for String {
    fn kind() -> Kind {
        Kind::String
    }

    fn encode(&self, _path: &FieldPath) -> Result<Value> {
        Ok(Value::String(self.clone()))
    }

    fn decode(value: &Value, path: &FieldPath) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(mismatch(path, &Kind::String, other)),
        }
    }
}

/// Integral value of a number or numeric string; floats are refused.
fn decode_integral(value: &Value, path: &FieldPath) -> Result<i128> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i128::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(i128::from(u))
            } else {
                Err(Error::schema(path, format!("not a int, got float: {n}")))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| mismatch(path, &Kind::Integer, value)),
        other => Err(mismatch(path, &Kind::Integer, other)),
    }
}

macro_rules! integer_codec {
    ($($ty:ty),*) => {$(
        impl Codec for $ty {
            fn kind() -> Kind {
                Kind::Integer
            }

            fn encode(&self, _path: &FieldPath) -> Result<Value> {
                Ok(Value::from(*self))
            }

            fn decode(value: &Value, path: &FieldPath) -> Result<Self> {
                let wide = decode_integral(value, path)?;
                <$ty>::try_from(wide).map_err(|_| {
                    Error::schema(path, format!("{wide} out of range for {}", stringify!($ty)))
                })
            }
        }
    )*};
}

integer_codec!(i32, i64, u16, u32, u64, usize);

fn decode_float(value: &Value, path: &FieldPath) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| mismatch(path, &Kind::Float, value)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| mismatch(path, &Kind::Float, value)),
        other => Err(mismatch(path, &Kind::Float, other)),
    }
}

fn encode_float(value: f64, path: &FieldPath) -> Result<Value> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| Error::schema(path, format!("not a finite float: {value}")))
}

impl Codec for f64 {
    fn kind() -> Kind {
        Kind::Float
    }

    fn encode(&self, path: &FieldPath) -> Result<Value> {
        encode_float(*self, path)
    }

    fn decode(value: &Value, path: &FieldPath) -> Result<Self> {
        decode_float(value, path)
    }
}

impl Codec for f32 {
    fn kind() -> Kind {
        Kind::Float
    }

    fn encode(&self, path: &FieldPath) -> Result<Value> {
        encode_float(f64::from(*self), path)
    }

    fn decode(value: &Value, path: &FieldPath) -> Result<Self> {
        decode_float(value, path).map(|v| v as f32)
    }
}

impl<T: Codec> Codec for Option<T> {
    fn kind() -> Kind {
        Kind::Optional(Box::new(T::kind()))
    }

    fn encode(&self, path: &FieldPath) -> Result<Value> {
        match self {
            Some(inner) => inner.encode(path),
            None => Ok(Value::Null),
        }
    }

    fn decode(value: &Value, path: &FieldPath) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::decode(other, path).map(Some),
        }
    }

    fn absent(_path: &FieldPath) -> Result<Self> {
        Ok(None)
    }

    fn verify() -> Result<()> {
        T::verify()
    }
}

impl<T: Codec> Codec for Vec<T> {
    fn kind() -> Kind {
        Kind::Sequence(Box::new(T::kind()))
    }

    fn encode(&self, path: &FieldPath) -> Result<Value> {
        self.iter()
            .enumerate()
            .map(|(i, item)| item.encode(&path.child(i.to_string())))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    fn decode(value: &Value, path: &FieldPath) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(mismatch(path, &Self::kind(), value));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| T::decode(item, &path.child(i.to_string())))
            .collect()
    }

    fn verify() -> Result<()> {
        T::verify()
    }
}

impl<T: Codec> Codec for BTreeMap<String, T> {
    fn kind() -> Kind {
        Kind::Mapping(Box::new(T::kind()))
    }

    fn encode(&self, path: &FieldPath) -> Result<Value> {
        let mut out = Mapping::new();
        for (key, item) in self {
            out.insert(key.clone(), item.encode(&path.child(key.as_str()))?);
        }
        Ok(Value::Object(out))
    }

    fn decode(value: &Value, path: &FieldPath) -> Result<Self> {
        let Value::Object(entries) = value else {
            return Err(mismatch(path, &Self::kind(), value));
        };
        entries
            .iter()
            .map(|(key, item)| Ok((key.clone(), T::decode(item, &path.child(key.as_str()))?)))
            .collect()
    }

    fn verify() -> Result<()> {
        T::verify()
    }
}

impl Codec for Value {
    fn kind() -> Kind {
        Kind::Any
    }

    fn encode(&self, _path: &FieldPath) -> Result<Value> {
        Ok(self.clone())
    }

    fn decode(value: &Value, _path: &FieldPath) -> Result<Self> {
        Ok(value.clone())
    }

    fn absent(_path: &FieldPath) -> Result<Self> {
        Ok(Value::Null)
    }
}
