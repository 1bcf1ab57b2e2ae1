//! Canonical, order-independent Elasticsearch configuration
//!
//! Settings are stored as a sorted map from dotted key to leaf value, so the
//! nested form `{"a": {"b": 1}}` and the dotted form `{"a.b": 1}` are the same
//! configuration. Nested maps are flattened away everywhere except inside
//! lists, where each map element keeps its own flattened form.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::error::SettingsError;

/// A leaf value of a canonical configuration
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Number (integer or float)
    Number(serde_json::Number),
    /// String
    String(String),
    /// List of values
    List(Vec<Value>),
    /// Map inside a list, keyed by dotted path
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// The string content, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean content, accepting `"true"`/`"false"` strings
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert back to a JSON value, expanding list maps to nested objects
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => expand(entries),
        }
    }

    fn from_json(value: &serde_json::Value) -> Result<Self, SettingsError> {
        Ok(match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.clone()),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(_) => {
                let mut entries = BTreeMap::new();
                flatten_into(None, value, &mut entries)?;
                Value::Map(entries)
            }
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

/// Flattened Elasticsearch configuration
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CanonicalConfig {
    entries: BTreeMap<String, Value>,
}

impl CanonicalConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalize a JSON document; `null` gives an empty configuration
    pub fn from_value(value: &serde_json::Value) -> Result<Self, SettingsError> {
        match value {
            serde_json::Value::Null => Ok(Self::new()),
            serde_json::Value::Object(_) => {
                let mut entries = BTreeMap::new();
                flatten_into(None, value, &mut entries)?;
                Ok(Self { entries })
            }
            other => Err(SettingsError::invalid(format!(
                "expected a map of settings, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Canonicalize a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        let value: serde_json::Value =
            serde_yaml::from_str(yaml).map_err(|e| SettingsError::invalid(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Configuration holding a single setting
    pub fn single(key: &str, value: impl Into<Value>) -> Result<Self, SettingsError> {
        let mut config = Self::new();
        config.set(key, value)?;
        Ok(config)
    }

    /// Set a setting, replacing any parent or child setting it conflicts with
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), SettingsError> {
        validate_key(key)?;
        insert_normalized(&mut self.entries, key.to_string(), value.into());
        Ok(())
    }

    /// Set a list of strings
    pub fn set_strings(&mut self, key: &str, values: &[&str]) -> Result<(), SettingsError> {
        if values.is_empty() {
            return Err(SettingsError::invalid(format!("no value to set for {key}")));
        }
        self.set(
            key,
            Value::List(values.iter().map(|v| Value::from(*v)).collect()),
        )
    }

    /// Merge other configurations into this one, later ones winning per key
    pub fn merge_with(&mut self, others: &[&CanonicalConfig]) {
        for other in others {
            for (key, value) in &other.entries {
                insert_normalized(&mut self.entries, key.clone(), value.clone());
            }
        }
    }

    /// Value of an exact dotted key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// True if the key or any setting below it is present
    pub fn contains(&self, key: &str) -> bool {
        if self.entries.contains_key(key) {
            return true;
        }
        let prefix = format!("{key}.");
        self.entries
            .range(prefix.clone()..)
            .next()
            .map(|(k, _)| k.starts_with(&prefix))
            .unwrap_or(false)
    }

    /// The subset of `keys` present in this configuration, in input order
    pub fn has_keys(&self, keys: &[&str]) -> Vec<String> {
        keys.iter()
            .filter(|k| self.contains(k))
            .map(|k| k.to_string())
            .collect()
    }

    /// Iterate over `(dotted key, value)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Number of leaf settings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no setting is present
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand to a nested JSON document
    pub fn to_nested(&self) -> serde_json::Value {
        expand(&self.entries)
    }

    /// Render as `elasticsearch.yml` content with sorted keys
    pub fn render(&self) -> Result<String, SettingsError> {
        serde_yaml::to_string(&self.to_nested()).map_err(|e| SettingsError::Render(e.to_string()))
    }

    /// Keys whose value differs between the two configurations
    ///
    /// Keys equal to or below an `ignore` entry are skipped.
    pub fn diff(&self, other: &CanonicalConfig, ignore: &[&str]) -> Vec<String> {
        let ignored = |key: &str| {
            ignore
                .iter()
                .any(|i| key == *i || key.starts_with(&format!("{i}.")))
        };
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(k, v)| other.entries.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .chain(
                other
                    .entries
                    .keys()
                    .filter(|k| !self.entries.contains_key(*k))
                    .cloned(),
            )
            .filter(|k| !ignored(k))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl Serialize for CanonicalConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_nested().serialize(serializer)
    }
}

/// Merge configurations with precedence `defaults < policy < user`
pub fn merge(
    defaults: &CanonicalConfig,
    policy: Option<&CanonicalConfig>,
    user: &CanonicalConfig,
) -> CanonicalConfig {
    let mut merged = defaults.clone();
    if let Some(policy) = policy {
        merged.merge_with(&[policy]);
    }
    merged.merge_with(&[user]);
    merged
}

fn validate_key(key: &str) -> Result<(), SettingsError> {
    if key.split('.').any(str::is_empty) {
        return Err(SettingsError::invalid(format!(
            "setting name {key:?} has an empty segment"
        )));
    }
    Ok(())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "a map",
    }
}

fn flatten_into(
    prefix: Option<&str>,
    value: &serde_json::Value,
    out: &mut BTreeMap<String, Value>,
) -> Result<(), SettingsError> {
    match (prefix, value) {
        (_, serde_json::Value::Object(map)) => {
            for (key, child) in map {
                validate_key(key)?;
                let full = match prefix {
                    Some(p) => format!("{p}.{key}"),
                    None => key.clone(),
                };
                flatten_into(Some(&full), child, out)?;
            }
            Ok(())
        }
        (Some(key), leaf) => {
            insert_normalized(out, key.to_string(), Value::from_json(leaf)?);
            Ok(())
        }
        (None, other) => Err(SettingsError::invalid(format!(
            "expected a map of settings, got {}",
            json_kind(other)
        ))),
    }
}

// A key cannot be both a leaf and a parent: whichever is inserted last wins.
fn insert_normalized(entries: &mut BTreeMap<String, Value>, key: String, value: Value) {
    let child_prefix = format!("{key}.");
    let children: Vec<String> = entries
        .range(child_prefix.clone()..)
        .take_while(|(k, _)| k.starts_with(&child_prefix))
        .map(|(k, _)| k.clone())
        .collect();
    for child in children {
        entries.remove(&child);
    }
    for (idx, _) in key.match_indices('.') {
        entries.remove(&key[..idx]);
    }
    entries.insert(key, value);
}

fn expand(entries: &BTreeMap<String, Value>) -> serde_json::Value {
    let mut root = serde_json::Map::new();
    for (key, value) in entries {
        let segments: Vec<&str> = key.split('.').collect();
        insert_path(&mut root, &segments, value.to_json());
    }
    serde_json::Value::Object(root)
}

fn insert_path(
    map: &mut serde_json::Map<String, serde_json::Value>,
    segments: &[&str],
    value: serde_json::Value,
) {
    match segments {
        [] => {}
        [last] => {
            map.insert(last.to_string(), value);
        }
        [first, rest @ ..] => {
            let child = map
                .entry(first.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if !child.is_object() {
                *child = serde_json::Value::Object(serde_json::Map::new());
            }
            if let serde_json::Value::Object(inner) = child {
                insert_path(inner, rest, value);
            }
        }
    }
}
