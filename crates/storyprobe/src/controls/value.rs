//! Control values and their encodings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value of a single story arg.
///
/// Maps are ordered so that the JSON form is canonical: sorted keys, no
/// insignificant whitespace. Values survive a JSON round trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    /// `null` / unset
    Null,
    /// Boolean toggle
    Boolean(bool),
    /// Integer or float
    Number(serde_json::Number),
    /// Text, select option, color literal
    Text(String),
    /// Ordered sequence
    List(Vec<ControlValue>),
    /// Object arg
    Map(BTreeMap<String, ControlValue>),
}

impl ControlValue {
    /// Canonical JSON text
    #[must_use]
    pub fn to_canonical_json(&self) -> String {
        Value::from(self.clone()).to_string()
    }

    /// Borrow as text, if this is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as boolean, if this is one
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value as f64
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// True for lists and maps
    #[must_use]
    pub const fn is_complex(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Encode for typing into a controls-panel input
    #[must_use]
    pub fn to_ui_input(&self) -> UiInput {
        match self {
            Self::Boolean(b) => UiInput::Toggle(*b),
            Self::Text(s) => UiInput::Text(s.clone()),
            Self::Number(n) => UiInput::Text(n.to_string()),
            Self::Null => UiInput::Text(String::new()),
            Self::List(_) | Self::Map(_) => UiInput::Json(self.to_canonical_json()),
        }
    }

    /// Decode a raw controls-panel reading.
    ///
    /// `kind` is what the panel reports for the input: `checkbox`, `number`,
    /// `range`, `json`, `textarea`, `select` or `text`. Only `json` editors
    /// are parsed as JSON; a plain `textarea` is a text control. Raw strings
    /// that do not parse for their kind are kept as text.
    #[must_use]
    pub fn from_ui_reading(kind: &str, raw: &Value) -> Self {
        match (kind, raw) {
            (_, Value::Bool(b)) => Self::Boolean(*b),
            ("checkbox", Value::String(s)) => Self::Boolean(matches!(s.as_str(), "true" | "on")),
            ("number" | "range", Value::String(s)) => {
                if s.trim().is_empty() {
                    return Self::Null;
                }
                serde_json::from_str::<serde_json::Number>(s.trim())
                    .map_or_else(|_| Self::Text(s.clone()), Self::Number)
            }
            ("json", Value::String(s)) => serde_json::from_str::<Value>(s)
                .map_or_else(|_| Self::Text(s.clone()), Self::from),
            _ => Self::from(raw.clone()),
        }
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            other => f.write_str(&other.to_canonical_json()),
        }
    }
}

/// What to do with a controls-panel input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum UiInput {
    /// Check or uncheck
    Toggle(bool),
    /// Type or select this text
    Text(String),
    /// Replace the JSON editor content
    Json(String),
}

impl From<Value> for ControlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<ControlValue> for Value {
    fn from(value: ControlValue) -> Self {
        match value {
            ControlValue::Null => Self::Null,
            ControlValue::Boolean(b) => Self::Bool(b),
            ControlValue::Number(n) => Self::Number(n),
            ControlValue::Text(s) => Self::String(s),
            ControlValue::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            ControlValue::Map(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for ControlValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for ControlValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ControlValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for ControlValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for ControlValue {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u32> for ControlValue {
    fn from(n: u32) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for ControlValue {
    /// Non-finite floats have no JSON form and become `Null`
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl<T: Into<ControlValue>> From<Vec<T>> for ControlValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, ControlValue>> for ControlValue {
    fn from(map: BTreeMap<String, ControlValue>) -> Self {
        Self::Map(map)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    mod conversion_tests {
        use super::*;

        #[test]
        fn test_canonical_json_sorts_keys() {
            let value = ControlValue::from(json!({"z": 1, "a": {"y": [1, "two"], "b": null}}));
            assert_eq!(
                value.to_canonical_json(),
                r#"{"a":{"b":null,"y":[1,"two"]},"z":1}"#
            );
        }

        #[test]
        fn test_serde_untagged() {
            let value: ControlValue = serde_json::from_str(r#"[true, 2.5, "x"]"#).unwrap();
            assert_eq!(
                value,
                ControlValue::List(vec![
                    ControlValue::Boolean(true),
                    ControlValue::from(2.5),
                    ControlValue::from("x"),
                ])
            );
        }

        #[test]
        fn test_display() {
            assert_eq!(ControlValue::from("Updated Button").to_string(), "Updated Button");
            assert_eq!(ControlValue::from(vec![1, 2]).to_string(), "[1,2]");
            assert_eq!(ControlValue::from(f64::NAN), ControlValue::Null);
        }
    }

    mod ui_tests {
        use super::*;

        #[test]
        fn test_to_ui_input() {
            assert_eq!(ControlValue::from(true).to_ui_input(), UiInput::Toggle(true));
            assert_eq!(ControlValue::from(12).to_ui_input(), UiInput::Text("12".into()));
            assert_eq!(
                ControlValue::from(json!({"a": 1})).to_ui_input(),
                UiInput::Json(r#"{"a":1}"#.into())
            );
        }

        #[test]
        fn test_from_ui_reading() {
            assert_eq!(
                ControlValue::from_ui_reading("checkbox", &json!(true)),
                ControlValue::Boolean(true)
            );
            assert_eq!(
                ControlValue::from_ui_reading("number", &json!("42")),
                ControlValue::from(42)
            );
            assert_eq!(
                ControlValue::from_ui_reading("number", &json!("")),
                ControlValue::Null
            );
            assert_eq!(
                ControlValue::from_ui_reading("json", &json!(r#"{"b":2,"a":1}"#)),
                ControlValue::from(json!({"a": 1, "b": 2}))
            );
            assert_eq!(
                ControlValue::from_ui_reading("text", &json!("42")),
                ControlValue::from("42")
            );
            assert_eq!(
                ControlValue::from_ui_reading("json", &json!("{broken")),
                ControlValue::from("{broken")
            );
        }

        #[test]
        fn test_textarea_reading_stays_text() {
            for raw in ["42", "true", "null", "[1]", r#"{"a":1}"#] {
                assert_eq!(
                    ControlValue::from_ui_reading("textarea", &json!(raw)),
                    ControlValue::from(raw),
                    "textarea holding {raw}"
                );
            }
        }

        #[test]
        fn test_ui_input_serializes_tagged() {
            let json = serde_json::to_value(UiInput::Toggle(false)).unwrap();
            assert_eq!(json, json!({"mode": "toggle", "value": false}));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn leaf() -> impl Strategy<Value = ControlValue> {
            prop_oneof![
                Just(ControlValue::Null),
                any::<bool>().prop_map(ControlValue::Boolean),
                any::<i64>().prop_map(ControlValue::from),
                "[a-zA-Z0-9 ]{0,12}".prop_map(ControlValue::Text),
            ]
        }

        fn value() -> impl Strategy<Value = ControlValue> {
            leaf().prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(ControlValue::List),
                    prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                        .prop_map(ControlValue::Map),
                ]
            })
        }

        proptest! {
            #[test]
            fn prop_json_roundtrip_is_lossless(v in value()) {
                let text = v.to_canonical_json();
                let back: ControlValue = serde_json::from_str(&text).unwrap();
                prop_assert_eq!(back, v);
            }
        }
    }
}
