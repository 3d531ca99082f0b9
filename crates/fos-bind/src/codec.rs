//! Value Codec
//!
//! Coerces `data-{identifier}-{key}-value` attribute text to typed values
//! and back. Decoding failures are returned to the caller, which falls back
//! to the declared default and reports the error.

use std::fmt;

use serde_json::{Map, Value as Json};

/// Declared type of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Default used when a declaration gives none
    pub fn default_value(self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Number => Value::Number(0.0),
            Self::Boolean => Value::Boolean(false),
            Self::Array => Value::Array(Vec::new()),
            Self::Object => Value::Object(Map::new()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    Array(Vec<Json>),
    Object(Map<String, Json>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Number(_) => ValueType::Number,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Array(_) => ValueType::Array,
            Self::Object(_) => ValueType::Object,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Json]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map<String, Json>> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Why a literal could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected}, {reason}")]
pub struct DecodeError {
    pub expected: ValueType,
    pub reason: String,
}

impl DecodeError {
    fn new(expected: ValueType, reason: impl Into<String>) -> Self {
        Self { expected, reason: reason.into() }
    }
}

/// Decode attribute text. An absent attribute yields `default`.
pub fn decode(raw: Option<&str>, ty: ValueType, default: &Value) -> Result<Value, DecodeError> {
    let Some(raw) = raw else {
        return Ok(default.clone());
    };

    match ty {
        ValueType::String => Ok(Value::String(raw.to_string())),
        ValueType::Number => {
            let cleaned: String = raw.trim().chars().filter(|&c| c != '_').collect();
            if cleaned.is_empty() {
                return Err(DecodeError::new(ty, "got empty text"));
            }
            match cleaned.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Value::Number(n)),
                _ => Err(DecodeError::new(ty, format!("got {raw:?}"))),
            }
        }
        ValueType::Boolean => match raw {
            "" | "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            other => Err(DecodeError::new(ty, format!("got {other:?}"))),
        },
        ValueType::Array => match serde_json::from_str(raw) {
            Ok(Json::Array(items)) => Ok(Value::Array(items)),
            Ok(_) => Err(DecodeError::new(ty, "got a different JSON kind")),
            Err(e) => Err(DecodeError::new(ty, e.to_string())),
        },
        ValueType::Object => match serde_json::from_str(raw) {
            Ok(Json::Object(map)) => Ok(Value::Object(map)),
            Ok(_) => Err(DecodeError::new(ty, "got a different JSON kind")),
            Err(e) => Err(DecodeError::new(ty, e.to_string())),
        },
    }
}

/// Encode a value as attribute text
pub fn encode(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Array(items) => Json::Array(items.clone()).to_string(),
        Value::Object(map) => Json::Object(map.clone()).to_string(),
    }
}

/// Typecast an action parameter: JSON literal when it parses, text otherwise
pub fn typecast(raw: &str) -> Json {
    serde_json::from_str(raw).unwrap_or_else(|_| Json::String(raw.to_string()))
}
