use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A cell in a block parameter or surface row.
///
/// `Inf` is only meaningful for radii and object distance. `Auto` means the
/// cell was left blank and the system picks the value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Number(f64),
    Inf,
    #[default]
    Auto,
    Text(String),
}

impl Value {
    /// Normalizes raw editor input.
    ///
    /// Blank and `AUTO` become `Auto`; `INF`/`Infinity` in any case and with an
    /// optional sign become `Inf`; numeric strings become numbers; anything
    /// else (glass names, surface types) is kept as text.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("auto") {
            return Value::Auto;
        }
        let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
        if unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity") {
            return Value::Inf;
        }
        match s.parse::<f64>() {
            Ok(v) => Value::from_f64(v),
            Err(_) => Value::Text(s.to_string()),
        }
    }

    pub fn from_f64(v: f64) -> Self {
        if v.is_nan() {
            Value::Auto
        } else if v.is_infinite() {
            Value::Inf
        } else {
            Value::Number(v)
        }
    }

    /// Re-parses text cells so that `"12"` and `12` compare equal.
    pub fn normalized(self) -> Self {
        match self {
            Value::Text(s) => Value::parse(&s),
            Value::Number(v) => Value::from_f64(v),
            other => other,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Value::Auto)
    }

    pub fn is_inf(&self) -> bool {
        matches!(self, Value::Inf)
    }

    /// Finite numeric content only.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    /// Like `as_number` but maps `Inf` to `f64::INFINITY`.
    pub fn as_length(&self) -> Option<f64> {
        match self {
            Value::Inf => Some(f64::INFINITY),
            other => other.as_number(),
        }
    }

    pub fn number_or(&self, default: f64) -> f64 {
        self.as_number().unwrap_or(default)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_nonzero(&self) -> bool {
        matches!(self.as_number(), Some(v) if v != 0.0)
    }

    /// A strictly positive integer, as used for 1-based row indices.
    pub fn as_index(&self) -> Option<usize> {
        match self.as_number() {
            Some(v) if v >= 1.0 && v.fract() == 0.0 => Some(v as usize),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{v}"),
            Value::Inf => f.write_str("INF"),
            Value::Auto => Ok(()),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::from_f64(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::parse(s)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(v) => serializer.serialize_f64(*v),
            Value::Inf => serializer.serialize_str("INF"),
            Value::Auto => serializer.serialize_str("AUTO"),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, INF, AUTO, a glass name or null")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::from_f64(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::parse(v))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Auto)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Auto)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
