//! Declarative property schemas and the recursive validator that normalizes
//! configuration values against them.
//!
//! A [`PropertySchema`] is immutable and composable: an `Array` of `Object`s
//! whose keys are themselves `Array`s, and so on. [`validate`] walks a value and
//! a schema together and always produces a usable result:
//!
//! - wrong types normalize to `None` ("undefined"), letting the caller fall
//!   back to a default,
//! - numbers outside their range are clamped to the nearest bound,
//! - absent keys pick up the default their schema declares,
//! - invalid array elements are dropped without affecting their siblings.
//!
//! Every deviation is reported as a [`Finding`]. Findings are warnings for the
//! property pane, never errors: validation cannot fail.
//!
//! Validation is deterministic and idempotent. Re-validating a normalized value
//! returns the same value.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::types::Value;

/// Schemes a `Url` value may use. Everything else (`javascript:`, `data:`,
/// `vbscript:`, `file:`, ...) is rejected.
const SAFE_SCHEMES: &[&str] = &["http", "https"];

static SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").expect("scheme pattern is valid")
});

/// Tile-server templates such as `https://{s}.tile.example.org/{z}/{x}/{y}.png`.
static TEMPLATE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[A-Za-z0-9_\-]*\}").expect("placeholder pattern is valid"));

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

/// What happens to object keys that are not listed in `allowed_keys`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnknownKeyPolicy {
    /// Drop the key and report [`Finding::UnknownKey`]. The rest of the object survives.
    Drop,
    /// Reject the whole object: it normalizes to `None`.
    Reject,
}

/// One allowed key of an [`PropertySchema::Object`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySchema {
    /// Key name as it appears in the object.
    pub name: String,
    /// Schema the key's value is validated against.
    pub schema: PropertySchema,
    /// Whether the key must be present.
    pub required: bool,
}

impl KeySchema {
    #[must_use]
    pub fn required(name: impl Into<String>, schema: PropertySchema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: true,
        }
    }

    #[must_use]
    pub fn optional(name: impl Into<String>, schema: PropertySchema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
        }
    }
}

/// Declarative schema for one property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PropertySchema {
    /// Opaque JSON passed through unchanged (GeoJSON `properties`, raw coordinates).
    Any,
    Boolean,
    Text,
    /// An absolute `http`/`https` URL. Tile templates with `{placeholders}` are allowed.
    Url,
    /// A number in `[min, max]`. `default` is used when the value is absent.
    Number {
        min: f64,
        max: f64,
        default: Option<f64>,
    },
    Object {
        allowed_keys: Vec<KeySchema>,
        unknown_key_policy: UnknownKeyPolicy,
    },
    Array {
        element: Box<PropertySchema>,
    },
    /// A fixed-length array whose positions each have their own schema, e.g.
    /// a `[lat, long]` pair. Any unusable position invalidates the whole tuple.
    Tuple {
        elements: Vec<PropertySchema>,
    },
}

impl PropertySchema {
    /// A number in `[min, max]` with no default.
    #[must_use]
    pub fn number(min: f64, max: f64) -> Self {
        Self::Number {
            min,
            max,
            default: None,
        }
    }

    /// A number in `[min, max]` falling back to `default` when absent.
    #[must_use]
    pub fn number_with_default(min: f64, max: f64, default: f64) -> Self {
        Self::Number {
            min,
            max,
            default: Some(default),
        }
    }

    /// An object that drops unknown keys.
    #[must_use]
    pub fn object(allowed_keys: Vec<KeySchema>) -> Self {
        Self::Object {
            allowed_keys,
            unknown_key_policy: UnknownKeyPolicy::Drop,
        }
    }

    /// An object that rejects itself entirely when it carries unknown keys.
    #[must_use]
    pub fn strict_object(allowed_keys: Vec<KeySchema>) -> Self {
        Self::Object {
            allowed_keys,
            unknown_key_policy: UnknownKeyPolicy::Reject,
        }
    }

    #[must_use]
    pub fn array_of(element: PropertySchema) -> Self {
        Self::Array {
            element: Box::new(element),
        }
    }

    #[must_use]
    pub fn tuple(elements: Vec<PropertySchema>) -> Self {
        Self::Tuple { elements }
    }

    /// The value substituted when a value for this schema is absent.
    #[must_use]
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Self::Number {
                default: Some(d), ..
            } => Some(number_value(*d)),
            _ => None,
        }
    }

    /// Human-readable name of the expected type, used in findings.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Any => "any value",
            Self::Boolean => "boolean",
            Self::Text => "text",
            Self::Url => "url",
            Self::Number { .. } => "number",
            Self::Object { .. } => "object",
            Self::Array { .. } => "array",
            Self::Tuple { .. } => "tuple",
        }
    }
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Non-fatal problem discovered while validating configuration.
///
/// `path` is the property name qualified down to the offending value, e.g.
/// `defaultMarkers[1].lat`.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Finding {
    #[error("{path}: expected {expected}")]
    TypeMismatch { path: String, expected: &'static str },
    #[error("{path}: value out of range, clamped to [{min}, {max}]")]
    OutOfRange { path: String, min: f64, max: f64 },
    #[error("{path}: missing required key `{key}`")]
    MissingRequired { path: String, key: String },
    #[error("{path}: unknown key `{key}`")]
    UnknownKey { path: String, key: String },
    #[error("{path}: unsafe or malformed url")]
    UnsafeUrl { path: String },
    #[error("visibility dependency cycle between {}", .members.join(", "))]
    VisibilityCycle { members: Vec<String> },
}

/// Discriminant of a [`Finding`], for filtering and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindingKind {
    TypeMismatch,
    OutOfRange,
    MissingRequired,
    UnknownKey,
    UnsafeUrl,
    VisibilityCycle,
}

impl Finding {
    #[must_use]
    pub fn kind(&self) -> FindingKind {
        match self {
            Self::TypeMismatch { .. } => FindingKind::TypeMismatch,
            Self::OutOfRange { .. } => FindingKind::OutOfRange,
            Self::MissingRequired { .. } => FindingKind::MissingRequired,
            Self::UnknownKey { .. } => FindingKind::UnknownKey,
            Self::UnsafeUrl { .. } => FindingKind::UnsafeUrl,
            Self::VisibilityCycle { .. } => FindingKind::VisibilityCycle,
        }
    }

    /// Path of the offending value. Cycle diagnostics have no single path.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::TypeMismatch { path, .. }
            | Self::OutOfRange { path, .. }
            | Self::MissingRequired { path, .. }
            | Self::UnknownKey { path, .. }
            | Self::UnsafeUrl { path } => Some(path),
            Self::VisibilityCycle { .. } => None,
        }
    }
}

/// Result of validating a value against a schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Validated {
    /// Normalized value, or `None` when the input was unusable and the schema has no default.
    pub value: Option<Value>,
    /// Everything that had to be corrected, in traversal order.
    pub findings: Vec<Finding>,
}

impl Validated {
    /// `true` when the input needed no correction.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Validates `value` against `schema`, reporting findings under `path`.
///
/// `None` and [`Value::Null`] are both treated as absent and resolve to the
/// schema's default, if any, without a finding. A present value that cannot
/// be used also falls back to the schema's default, with a finding.
///
/// # Examples
///
/// ```
/// use mapwidget_core::schema::{validate, PropertySchema};
/// use mapwidget_core::Value;
///
/// let result = validate(Some(&Value::Int(150)), &PropertySchema::number(-90.0, 90.0), "lat");
/// assert_eq!(result.value, Some(Value::Int(90)));
/// assert_eq!(result.findings.len(), 1);
/// ```
#[must_use]
pub fn validate(value: Option<&Value>, schema: &PropertySchema, path: &str) -> Validated {
    let mut findings = Vec::new();
    let value =
        validate_into(value, schema, path, &mut findings).or_else(|| schema.default_value());
    Validated { value, findings }
}

fn validate_into(
    value: Option<&Value>,
    schema: &PropertySchema,
    path: &str,
    findings: &mut Vec<Finding>,
) -> Option<Value> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return schema.default_value();
    };

    match schema {
        PropertySchema::Any => Some(value.clone()),
        PropertySchema::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            _ => mismatch(schema, path, findings),
        },
        PropertySchema::Text => match value {
            Value::String(_) => Some(value.clone()),
            _ => mismatch(schema, path, findings),
        },
        PropertySchema::Url => validate_url(value, path, findings),
        PropertySchema::Number { min, max, .. } => {
            validate_number(value, *min, *max, path, findings)
        }
        PropertySchema::Object {
            allowed_keys,
            unknown_key_policy,
        } => validate_object(value, schema, allowed_keys, *unknown_key_policy, path, findings),
        PropertySchema::Array { element } => validate_array(value, schema, element, path, findings),
        PropertySchema::Tuple { elements } => validate_tuple(value, schema, elements, path, findings),
    }
}

fn mismatch(schema: &PropertySchema, path: &str, findings: &mut Vec<Finding>) -> Option<Value> {
    findings.push(Finding::TypeMismatch {
        path: path.to_string(),
        expected: schema.type_name(),
    });
    None
}

fn validate_url(value: &Value, path: &str, findings: &mut Vec<Finding>) -> Option<Value> {
    let Some(text) = value.as_str() else {
        return mismatch(&PropertySchema::Url, path, findings);
    };
    if is_safe_url(text) {
        Some(value.clone())
    } else {
        findings.push(Finding::UnsafeUrl {
            path: path.to_string(),
        });
        None
    }
}

/// Returns `true` for absolute `http`/`https` URLs, tile templates included.
#[must_use]
pub fn is_safe_url(text: &str) -> bool {
    let text = text.trim();
    let Some(captures) = SCHEME.captures(text) else {
        return false;
    };
    let scheme = captures[1].to_ascii_lowercase();
    if !SAFE_SCHEMES.contains(&scheme.as_str()) {
        return false;
    }
    let concrete = TEMPLATE_PLACEHOLDER.replace_all(text, "a");
    Url::parse(&concrete).is_ok_and(|url| url.host_str().is_some_and(|host| !host.is_empty()))
}

fn validate_number(
    value: &Value,
    min: f64,
    max: f64,
    path: &str,
    findings: &mut Vec<Finding>,
) -> Option<Value> {
    let Some(n) = value.as_f64().filter(|n| !n.is_nan()) else {
        return mismatch(&PropertySchema::number(min, max), path, findings);
    };
    if n < min || n > max {
        findings.push(Finding::OutOfRange {
            path: path.to_string(),
            min,
            max,
        });
        return Some(number_value(n.clamp(min, max)));
    }
    Some(value.clone())
}

fn validate_object(
    value: &Value,
    schema: &PropertySchema,
    allowed_keys: &[KeySchema],
    policy: UnknownKeyPolicy,
    path: &str,
    findings: &mut Vec<Finding>,
) -> Option<Value> {
    let parsed;
    let map = match value {
        Value::Map(map) => map,
        Value::String(text) => match Value::from_json_str(text) {
            Ok(Value::Map(map)) => {
                parsed = map;
                &parsed
            }
            _ => return mismatch(schema, path, findings),
        },
        _ => return mismatch(schema, path, findings),
    };

    let unknown: Vec<&String> = map
        .keys()
        .filter(|key| !allowed_keys.iter().any(|allowed| &allowed.name == *key))
        .collect();
    for key in &unknown {
        findings.push(Finding::UnknownKey {
            path: path.to_string(),
            key: (*key).clone(),
        });
    }
    if policy == UnknownKeyPolicy::Reject && !unknown.is_empty() {
        return None;
    }

    let mut normalized = BTreeMap::new();
    for key in allowed_keys {
        let key_path = child_path(path, &key.name);
        match map.get(&key.name).filter(|v| !v.is_null()) {
            None => {
                if key.required {
                    findings.push(Finding::MissingRequired {
                        path: path.to_string(),
                        key: key.name.clone(),
                    });
                }
                if let Some(default) = key.schema.default_value() {
                    normalized.insert(key.name.clone(), default);
                }
            }
            Some(present) => match validate_into(Some(present), &key.schema, &key_path, findings) {
                Some(v) => {
                    normalized.insert(key.name.clone(), v);
                }
                // A present but unusable required key invalidates the whole object.
                None if key.required => return None,
                None => {
                    if let Some(default) = key.schema.default_value() {
                        normalized.insert(key.name.clone(), default);
                    }
                }
            },
        }
    }
    Some(Value::Map(normalized))
}

fn validate_array(
    value: &Value,
    schema: &PropertySchema,
    element: &PropertySchema,
    path: &str,
    findings: &mut Vec<Finding>,
) -> Option<Value> {
    let parsed;
    let items = match value {
        Value::Array(items) => items,
        Value::String(text) => match Value::from_json_str(text) {
            Ok(Value::Array(items)) => {
                parsed = items;
                &parsed
            }
            _ => return mismatch(schema, path, findings),
        },
        _ => return mismatch(schema, path, findings),
    };

    let mut normalized = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let item_path = index_path(path, index);
        if item.is_null() {
            mismatch(element, &item_path, findings);
            continue;
        }
        if let Some(v) = validate_into(Some(item), element, &item_path, findings) {
            normalized.push(v);
        }
    }
    Some(Value::Array(normalized))
}

fn validate_tuple(
    value: &Value,
    schema: &PropertySchema,
    elements: &[PropertySchema],
    path: &str,
    findings: &mut Vec<Finding>,
) -> Option<Value> {
    let Some(items) = value.as_array().filter(|items| items.len() == elements.len()) else {
        return mismatch(schema, path, findings);
    };
    let mut normalized = Vec::with_capacity(items.len());
    for (index, (item, element)) in items.iter().zip(elements).enumerate() {
        let item_path = index_path(path, index);
        if item.is_null() {
            return mismatch(element, &item_path, findings);
        }
        normalized.push(validate_into(Some(item), element, &item_path, findings)?);
    }
    Some(Value::Array(normalized))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Largest integer magnitude an `f64` represents exactly (2^53).
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Integral numbers become `Int` so defaults and clamped bounds read like the
/// literals users typed.
#[allow(clippy::cast_possible_truncation)]
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INT {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    }
}

/// `parent.key`, or just `key` at the root.
#[must_use]
pub fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// `parent[index]`.
#[must_use]
pub fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn marker_schema() -> PropertySchema {
        PropertySchema::object(vec![
            KeySchema::required("lat", PropertySchema::number_with_default(-90.0, 90.0, 0.0)),
            KeySchema::required("long", PropertySchema::number_with_default(-180.0, 180.0, 0.0)),
            KeySchema::optional("popupText", PropertySchema::Text),
        ])
    }

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn kinds(result: &Validated) -> Vec<FindingKind> {
        result.findings.iter().map(Finding::kind).collect()
    }

    // ---- scalars ----

    #[test]
    fn boolean_mismatch_is_undefined() {
        let result = validate(Some(&v(json!("yes"))), &PropertySchema::Boolean, "allowZoom");
        assert_eq!(result.value, None);
        assert_eq!(
            result.findings,
            vec![Finding::TypeMismatch {
                path: "allowZoom".to_string(),
                expected: "boolean"
            }]
        );
    }

    #[test]
    fn text_passes_through() {
        let result = validate(Some(&v(json!("You are here"))), &PropertySchema::Text, "markerText");
        assert!(result.is_clean());
        assert_eq!(result.value, Some(v(json!("You are here"))));
    }

    #[test]
    fn number_clamps_to_max() {
        let schema = PropertySchema::number_with_default(-90.0, 90.0, 0.0);
        let result = validate(Some(&Value::Int(150)), &schema, "lat");
        assert_eq!(result.value.and_then(|n| n.as_f64()), Some(90.0));
        assert_eq!(
            result.findings,
            vec![Finding::OutOfRange {
                path: "lat".to_string(),
                min: -90.0,
                max: 90.0
            }]
        );
    }

    #[test]
    fn number_clamps_to_min() {
        let result = validate(Some(&Value::Int(-200)), &PropertySchema::number(-180.0, 180.0), "long");
        assert_eq!(result.value.as_ref().and_then(|n| n.as_f64()), Some(-180.0));
        assert_eq!(kinds(&result), vec![FindingKind::OutOfRange]);
    }

    #[test]
    fn fractional_clamp_keeps_float() {
        let result = validate(Some(&Value::Float(1.5)), &PropertySchema::number(0.0, 0.65), "opacity");
        assert_eq!(result.value, Some(Value::Float(0.65)));
    }

    #[test]
    fn absent_number_takes_default() {
        let schema = PropertySchema::number_with_default(0.0, 25.0, 10.0);
        let result = validate(None, &schema, "zoom");
        assert_eq!(result.value, Some(Value::Int(10)));
        assert!(result.is_clean());
        assert_eq!(validate(Some(&Value::Null), &schema, "zoom").value, Some(Value::Int(10)));
    }

    #[test]
    fn unusable_number_falls_back_to_schema_default() {
        let schema = PropertySchema::number_with_default(0.0, 25.0, 10.0);
        let result = validate(Some(&v(json!("far"))), &schema, "zoom");
        assert_eq!(result.value, Some(Value::Int(10)));
        assert_eq!(kinds(&result), vec![FindingKind::TypeMismatch]);
    }

    #[test]
    fn nan_is_not_numeric() {
        let result = validate(Some(&Value::Float(f64::NAN)), &PropertySchema::number(0.0, 1.0), "opacity");
        assert_eq!(result.value, None);
        assert_eq!(kinds(&result), vec![FindingKind::TypeMismatch]);
    }

    #[test]
    fn numeric_string_is_a_mismatch() {
        let result = validate(Some(&v(json!("bad"))), &PropertySchema::number(-90.0, 90.0), "lat");
        assert_eq!(result.value, None);
        assert_eq!(kinds(&result), vec![FindingKind::TypeMismatch]);
    }

    // ---- urls ----

    #[test]
    fn tile_template_url_is_accepted() {
        let url = v(json!("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"));
        let result = validate(Some(&url), &PropertySchema::Url, "url");
        assert!(result.is_clean());
        assert_eq!(result.value, Some(url));
    }

    #[test]
    fn script_and_data_schemes_are_rejected() {
        for bad in [
            "javascript:alert(1)",
            "  JavaScript:alert(1)",
            "data:text/html;base64,PHNjcmlwdD4=",
            "vbscript:msgbox",
            "file:///etc/passwd",
        ] {
            let result = validate(Some(&v(json!(bad))), &PropertySchema::Url, "url");
            assert_eq!(result.value, None, "{bad} should be rejected");
            assert_eq!(kinds(&result), vec![FindingKind::UnsafeUrl]);
        }
    }

    #[test]
    fn relative_or_hostless_url_is_rejected() {
        assert!(!is_safe_url("/tiles/{z}/{x}/{y}.png"));
        assert!(!is_safe_url("https://"));
        assert!(is_safe_url("http://localhost:8080/tiles"));
    }

    #[test]
    fn non_string_url_is_a_type_mismatch() {
        let result = validate(Some(&Value::Int(3)), &PropertySchema::Url, "url");
        assert_eq!(kinds(&result), vec![FindingKind::TypeMismatch]);
    }

    // ---- objects ----

    #[test]
    fn missing_required_key_takes_default() {
        let schema = PropertySchema::object(vec![KeySchema::required(
            "lat",
            PropertySchema::number_with_default(-90.0, 90.0, 0.0),
        )]);
        let result = validate(Some(&v(json!({}))), &schema, "mapCenter");
        let value = result.value.clone().unwrap();
        assert_eq!(value.get("lat"), Some(&Value::Int(0)));
        assert_eq!(
            result.findings,
            vec![Finding::MissingRequired {
                path: "mapCenter".to_string(),
                key: "lat".to_string()
            }]
        );
    }

    #[test]
    fn optional_key_absent_takes_default_silently() {
        let schema = PropertySchema::object(vec![
            KeySchema::required("name", PropertySchema::Text),
            KeySchema::optional("opacity", PropertySchema::number_with_default(0.0, 1.0, 1.0)),
        ]);
        let result = validate(Some(&v(json!({"name": "OSM"}))), &schema, "tileLayers[0]");
        assert!(result.is_clean());
        assert_eq!(result.value, Some(v(json!({"name": "OSM", "opacity": 1}))));
    }

    #[test]
    fn unknown_keys_are_dropped_under_drop_policy() {
        let result = validate(
            Some(&v(json!({"lat": 1, "long": 2, "color": "red"}))),
            &marker_schema(),
            "marker",
        );
        assert_eq!(result.value, Some(v(json!({"lat": 1, "long": 2}))));
        assert_eq!(
            result.findings,
            vec![Finding::UnknownKey {
                path: "marker".to_string(),
                key: "color".to_string()
            }]
        );
    }

    #[test]
    fn unknown_keys_reject_strict_object() {
        let schema = PropertySchema::strict_object(vec![KeySchema::optional("color", PropertySchema::Text)]);
        let result = validate(Some(&v(json!({"color": "red", "weight": 2}))), &schema, "options");
        assert_eq!(result.value, None);
        assert_eq!(kinds(&result), vec![FindingKind::UnknownKey]);
    }

    #[test]
    fn invalid_required_key_invalidates_object() {
        let result = validate(Some(&v(json!({"lat": "bad", "long": 0}))), &marker_schema(), "m");
        assert_eq!(result.value, None);
        assert_eq!(
            result.findings,
            vec![Finding::TypeMismatch {
                path: "m.lat".to_string(),
                expected: "number"
            }]
        );
    }

    #[test]
    fn invalid_optional_key_is_omitted() {
        let result = validate(
            Some(&v(json!({"lat": 1, "long": 2, "popupText": 7}))),
            &marker_schema(),
            "m",
        );
        assert_eq!(result.value, Some(v(json!({"lat": 1, "long": 2}))));
        assert_eq!(kinds(&result), vec![FindingKind::TypeMismatch]);
    }

    #[test]
    fn object_accepts_json_text() {
        let text = Value::String(r#"{"lat": 51.505, "long": -0.09}"#.to_string());
        let result = validate(Some(&text), &marker_schema(), "mapCenter");
        assert!(result.is_clean());
        assert_eq!(result.value, Some(v(json!({"lat": 51.505, "long": -0.09}))));
    }

    #[test]
    fn nested_paths_are_qualified() {
        let schema = PropertySchema::array_of(PropertySchema::object(vec![KeySchema::optional(
            "options",
            PropertySchema::object(vec![KeySchema::optional("color", PropertySchema::Text)]),
        )]));
        let result = validate(Some(&v(json!([{}, {"options": {"color": 3}}]))), &schema, "circles");
        assert_eq!(result.findings[0].path(), Some("circles[1].options.color"));
        assert_eq!(result.value, Some(v(json!([{}, {"options": {}}]))));
    }

    // ---- arrays ----

    #[test]
    fn array_isolates_malformed_elements() {
        let schema = PropertySchema::array_of(marker_schema());
        let input = v(json!([{"lat": 51.5, "long": -0.09}, {"lat": "bad", "long": -0.09}]));
        let result = validate(Some(&input), &schema, "defaultMarkers");
        assert_eq!(result.value, Some(v(json!([{"lat": 51.5, "long": -0.09}]))));
        assert_eq!(
            result.findings,
            vec![Finding::TypeMismatch {
                path: "defaultMarkers[1].lat".to_string(),
                expected: "number"
            }]
        );
    }

    #[test]
    fn non_array_is_a_type_mismatch() {
        let schema = PropertySchema::array_of(marker_schema());
        let result = validate(Some(&v(json!({"lat": 1}))), &schema, "circles");
        assert_eq!(result.value, None);
        assert_eq!(kinds(&result), vec![FindingKind::TypeMismatch]);
    }

    #[test]
    fn array_accepts_json_text() {
        let schema = PropertySchema::array_of(marker_schema());
        let text = Value::String(r#"[{"lat": 10, "long": 10, "popupText": "old"}]"#.to_string());
        let result = validate(Some(&text), &schema, "defaultMarkers");
        assert_eq!(result.value, Some(v(json!([{"lat": 10, "long": 10, "popupText": "old"}]))));
    }

    #[test]
    fn unparseable_text_is_a_type_mismatch() {
        let schema = PropertySchema::array_of(PropertySchema::Any);
        let result = validate(Some(&v(json!("[{"))), &schema, "lines");
        assert_eq!(result.value, None);
        assert_eq!(kinds(&result), vec![FindingKind::TypeMismatch]);
    }

    #[test]
    fn null_elements_are_dropped_with_finding() {
        let schema = PropertySchema::array_of(PropertySchema::number(0.0, 1.0));
        let result = validate(Some(&v(json!([0.5, null]))), &schema, "xs");
        assert_eq!(result.value, Some(v(json!([0.5]))));
        assert_eq!(result.findings[0].path(), Some("xs[1]"));
    }

    #[test]
    fn validation_is_idempotent_on_a_messy_list() {
        let schema = PropertySchema::array_of(marker_schema());
        let input = v(json!([
            {"lat": 150, "long": -0.09, "extra": 1},
            {"long": 3},
            {"lat": "x", "long": 1},
            "nope"
        ]));
        let once = validate(Some(&input), &schema, "m");
        let twice = validate(once.value.as_ref(), &schema, "m");
        assert_eq!(once.value, twice.value);
    }

    // ---- tuples ----

    fn pair() -> PropertySchema {
        PropertySchema::tuple(vec![
            PropertySchema::number(-90.0, 90.0),
            PropertySchema::number(-180.0, 180.0),
        ])
    }

    #[test]
    fn tuple_checks_each_position_against_its_own_range() {
        let result = validate(Some(&v(json!([120, 170]))), &pair(), "p");
        assert_eq!(result.value, Some(v(json!([90, 170]))));
        assert_eq!(result.findings[0].path(), Some("p[0]"));
        assert_eq!(kinds(&result), vec![FindingKind::OutOfRange]);
    }

    #[test]
    fn tuple_of_wrong_length_is_a_type_mismatch() {
        for input in [json!([1]), json!([1, 2, 3]), json!("1,2")] {
            let result = validate(Some(&v(input)), &pair(), "p");
            assert_eq!(result.value, None);
            assert_eq!(kinds(&result), vec![FindingKind::TypeMismatch]);
        }
    }

    #[test]
    fn unusable_position_invalidates_the_tuple() {
        let schema = PropertySchema::array_of(pair());
        let result = validate(Some(&v(json!([[51.5, -0.09], [51.51, "x"]]))), &schema, "positions");
        assert_eq!(result.value, Some(v(json!([[51.5, -0.09]]))));
        assert_eq!(result.findings[0].path(), Some("positions[1][1]"));
    }

    #[test]
    fn finding_display_names_the_path() {
        let finding = Finding::MissingRequired {
            path: "tileLayers[0]".to_string(),
            key: "url".to_string(),
        };
        assert_eq!(finding.to_string(), "tileLayers[0]: missing required key `url`");
    }
}
