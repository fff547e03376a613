//! Closed dynamic value representation for source fusion
//!
//! Upstream snapshots are arbitrarily nested JSON/YAML. Instead of merging
//! over the serde value types directly, everything is converted into this
//! small closed representation first:
//!
//! - `Null`, `Bool`, `Int`, `Float`, `Str` - scalar leaves
//! - `Localized` - a `{de, en}` pair, treated as one atomic leaf
//! - `List` - a leaf for merge purposes (replaced wholesale, never spliced)
//! - `Map` - the only shape the merge recurses into
//!
//! Maps preserve insertion order so that provenance and output ordering
//! stay deterministic across runs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered string-keyed map of dynamic values
pub type ValueMap = IndexMap<String, Value>;

/// A `{de, en}` localized string pair
///
/// Detected structurally during conversion: a JSON/YAML map whose keys are
/// exactly `de` and `en` with string values becomes one `Localized` leaf.
/// The merge never descends into it, so a localized overlay value replaces
/// a scalar (or another localized value) atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localized {
    pub de: String,
    pub en: String,
}

impl Localized {
    pub fn new(de: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            de: de.into(),
            en: en.into(),
        }
    }
}

/// Dynamic value over which the source merger operates
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Localized(Localized),
    List(Vec<Value>),
    Map(ValueMap),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Convert from a serde_json value, detecting localized-string leaves.
    pub fn from_json(value: &serde_json::Value) -> Value {
        use serde_json::Value as J;
        match value {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(*b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            J::String(s) => Value::Str(s.clone()),
            J::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            J::Object(map) => {
                if let Some(loc) = localized_from_json(map) {
                    return Value::Localized(loc);
                }
                Value::Map(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Value::from_json(v)))
                        .collect(),
                )
            }
        }
    }

    /// Convert from a serde_yaml value.
    ///
    /// Scalar mapping keys are stringified, which also implements the
    /// building-id coercion rule: a hand-authored overlay keyed by a
    /// 4-digit number (`5406:`) parses as an integer key and comes out as
    /// the string `"5406"`, matching the skeleton's string ids.
    pub fn from_yaml(value: &serde_yaml::Value) -> Value {
        use serde_yaml::Value as Y;
        match value {
            Y::Null => Value::Null,
            Y::Bool(b) => Value::Bool(*b),
            Y::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Y::String(s) => Value::Str(s.clone()),
            Y::Sequence(items) => Value::List(items.iter().map(Value::from_yaml).collect()),
            Y::Mapping(map) => {
                let mut out = ValueMap::new();
                for (k, v) in map {
                    out.insert(yaml_key_to_string(k), Value::from_yaml(v));
                }
                if let Some(loc) = localized_from_map(&out) {
                    return Value::Localized(loc);
                }
                Value::Map(out)
            }
            Y::Tagged(tagged) => Value::from_yaml(&tagged.value),
        }
    }

    /// Convert back into a serde_json value (used for binding merged
    /// records into typed entities and for raw debugging output).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(J::Number)
                .unwrap_or(J::Null),
            Value::Str(s) => J::String(s.clone()),
            Value::Localized(loc) => serde_json::json!({ "de": loc.de, "en": loc.en }),
            Value::List(items) => J::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                J::Object(out)
            }
        }
    }
}

fn yaml_key_to_string(key: &serde_yaml::Value) -> String {
    use serde_yaml::Value as Y;
    match key {
        Y::String(s) => s.clone(),
        Y::Number(n) => n.to_string(),
        Y::Bool(b) => b.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn localized_from_json(map: &serde_json::Map<String, serde_json::Value>) -> Option<Localized> {
    if map.len() != 2 {
        return None;
    }
    match (map.get("de"), map.get("en")) {
        (Some(serde_json::Value::String(de)), Some(serde_json::Value::String(en))) => {
            Some(Localized::new(de.clone(), en.clone()))
        }
        _ => None,
    }
}

fn localized_from_map(map: &ValueMap) -> Option<Localized> {
    if map.len() != 2 {
        return None;
    }
    match (map.get("de"), map.get("en")) {
        (Some(Value::Str(de)), Some(Value::Str(en))) => Some(Localized::new(de.clone(), en.clone())),
        _ => None,
    }
}
