//! Values crossing the remote-script boundary.
//!
//! `execute/sync` may return any JSON value. Rather than hand callers a loose
//! `serde_json::Value`, results are converted into the closed [`ScriptValue`]
//! union so every consumer has to say what it expects.

use serde_json::Value;
use std::collections::BTreeMap;

/// W3C element reference key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
/// Key used by pre-W3C drivers
pub const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// A value returned from (or passed to) a remote script
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ScriptValue>),
    Object(BTreeMap<String, ScriptValue>),
}

impl ScriptValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScriptValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ScriptValue]> {
        match self {
            ScriptValue::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, ScriptValue>> {
        match self {
            ScriptValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Field lookup on an object value; `None` for every other variant.
    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        self.as_object().and_then(|m| m.get(key))
    }

    /// Interpret this value as a wire element reference.
    pub fn as_element_ref(&self) -> Option<ElementRef> {
        let map = self.as_object()?;
        [ELEMENT_KEY, LEGACY_ELEMENT_KEY]
            .iter()
            .filter_map(|k| map.get(*k).and_then(ScriptValue::as_str))
            .find(|id| !id.is_empty())
            .map(ElementRef::new)
    }

    pub fn to_json(&self) -> Value {
        match self {
            ScriptValue::Null => Value::Null,
            ScriptValue::Bool(b) => Value::Bool(*b),
            ScriptValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ScriptValue::String(s) => Value::String(s.clone()),
            ScriptValue::Array(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            ScriptValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for ScriptValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => ScriptValue::Null,
            Value::Bool(b) => ScriptValue::Bool(b),
            // Integers beyond 2^53 lose precision, same as in the page.
            Value::Number(n) => ScriptValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => ScriptValue::String(s),
            Value::Array(items) => ScriptValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ScriptValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(s)
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<f64> for ScriptValue {
    fn from(n: f64) -> Self {
        ScriptValue::Number(n)
    }
}

impl From<&ElementRef> for ScriptValue {
    fn from(r: &ElementRef) -> Self {
        let mut map = BTreeMap::new();
        map.insert(ELEMENT_KEY.to_string(), ScriptValue::String(r.0.clone()));
        ScriptValue::Object(map)
    }
}

/// Opaque, session-scoped handle to a DOM node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        ElementRef(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    /// Decode a wire element object, preferring the W3C key over the legacy one.
    pub fn from_wire(v: &Value) -> Option<Self> {
        [ELEMENT_KEY, LEGACY_ELEMENT_KEY]
            .iter()
            .filter_map(|k| v.get(*k).and_then(Value::as_str))
            .find(|id| !id.is_empty())
            .map(ElementRef::new)
    }

    pub fn to_wire(&self) -> Value {
        serde_json::json!({ ELEMENT_KEY: self.0 })
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
