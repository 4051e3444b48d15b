use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Snapshot of a widget instance's property values, keyed by property name.
///
/// `BTreeMap` keeps iteration deterministic so that two snapshots holding the
/// same entries always compare and serialize identically.
pub type PropertyValues = BTreeMap<String, Value>;

/// Generic runtime value type for widget property values.
///
/// Supports all JSON-compatible types. Raw edits from the property pane, the
/// literal results of bound expressions, and event payloads from the mapping
/// library all arrive as `Value`s and are normalized by
/// [`validate`](crate::schema::validate).
///
/// Serializes untagged, i.e. exactly like the equivalent JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON null. Treated as "absent" by the validator.
    #[default]
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// JSON array (ordered sequence of values).
    Array(Vec<Value>),
    /// JSON object (ordered map of string keys to values).
    /// Uses `BTreeMap` so structural equality ignores key insertion order.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of `Int` and `Float` values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a key when this value is a map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Short type label used in log fields and diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "object",
        }
    }

    /// Parses JSON text into a `Value`.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when `text` is not a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<serde_json::Value>(text).map(Self::from)
    }

    /// Converts into the equivalent `serde_json::Value`.
    ///
    /// Non-finite floats have no JSON representation and become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
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

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
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

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn from_json_preserves_integers() {
        assert_eq!(Value::from(json!(13)), Value::Int(13));
        assert_eq!(Value::from(json!(51.505)), Value::Float(51.505));
    }

    #[test]
    fn map_equality_ignores_key_order() {
        let a = Value::from_json_str(r#"{"lat": 1, "long": 2}"#).unwrap();
        let b = Value::from_json_str(r#"{"long": 2, "lat": 1}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_like_json() {
        let value = Value::from(json!({"lat": 51.5, "tags": ["a", true, null]}));
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"lat":51.5,"tags":["a",true,null]}"#);
    }

    #[test]
    fn deserializes_untagged() {
        let value: Value = serde_json::from_str(r#"[1, 2.5, "x", {"k": false}]"#).unwrap();
        assert_eq!(value, Value::from(json!([1, 2.5, "x", {"k": false}])));
    }

    #[test]
    fn to_json_roundtrips_structure() {
        let original = json!({"positions": [[51.505, -0.09], [51.51, -0.1]]});
        assert_eq!(Value::from(original.clone()).to_json(), original);
    }

    #[test]
    fn non_finite_float_becomes_json_null() {
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn kind_labels() {
        assert_eq!(Value::Int(1).kind(), "number");
        assert_eq!(Value::Map(BTreeMap::new()).kind(), "object");
        assert_eq!(Value::Null.kind(), "null");
    }
}
