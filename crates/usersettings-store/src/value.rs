//! Setting values.
//!
//! A [`SettingValue`] is any JSON value: null, bool, number, string,
//! array or object. It serializes transparently, so the wire shape and
//! the on-disk text are plain JSON with no type tag.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;

/// A dynamically typed setting value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingValue(Value);

impl SettingValue {
    /// The JSON `null` value.
    pub const fn null() -> Self {
        Self(Value::Null)
    }

    /// Convert any serializable Rust value into a setting value.
    ///
    /// Fails with a serialization error when the value has no JSON
    /// representation, e.g. a map whose keys are not strings.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> StoreResult<Self> {
        Ok(Self(serde_json::to_value(value)?))
    }

    /// Decode into a concrete Rust type.
    pub fn into_typed<T: DeserializeOwned>(self) -> StoreResult<T> {
        Ok(serde_json::from_value(self.0)?)
    }

    /// Encode to the text stored in the `value` column.
    pub fn encode(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Decode text previously produced by [`SettingValue::encode`].
    pub fn decode(text: &str) -> StoreResult<Self> {
        Ok(Self(serde_json::from_str(text)?))
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Name of the JSON type held, for messages and listings.
    pub fn type_name(&self) -> &'static str {
        match self.0 {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Value> for SettingValue {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<SettingValue> for Value {
    fn from(value: SettingValue) -> Self {
        value.0
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_owned()))
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self(Value::String(value))
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self(Value::Bool(value))
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl From<u64> for SettingValue {
    fn from(value: u64) -> Self {
        Self(Value::from(value))
    }
}

/// Non-finite floats have no JSON form and become `null`.
impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self(Value::from(value))
    }
}

// ── tests ────────────────────────────────────────────────────────────
