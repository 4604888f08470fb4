use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

use crate::errors::{Error, Result};

/// Opaque transfer document, passed to the daemon verbatim.
///
/// Key order is preserved so the serialized form matches what the caller built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferSpec(Map<String, Value>);

impl TransferSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; only objects are accepted
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Config(format!(
                "transfer spec must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Read a spec document from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Handle assigned by the daemon; meaningless outside its lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferId(String);

impl TransferId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_keeps_structure_and_order() {
        let value = json!({
            "direction": "send",
            "remote_host": "demo.example.com",
            "paths": [{"source": "a.txt"}, {"source": "b.txt", "destination": "c.txt"}],
            "ssh_port": 33001,
            "http_fallback": false
        });
        let spec = TransferSpec::from_value(value.clone()).unwrap();
        let text = spec.to_json().unwrap();
        assert!(text.starts_with("{\"direction\":\"send\",\"remote_host\""));

        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, value);
        assert_eq!(TransferSpec::from_json(&text).unwrap(), spec);
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(matches!(
            TransferSpec::from_value(json!([1, 2])),
            Err(Error::Config(_))
        ));
        assert!(matches!(TransferSpec::from_json("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_insert_and_get() {
        let mut spec = TransferSpec::new();
        assert!(spec.is_empty());
        spec.insert("direction", json!("receive"));
        assert_eq!(spec.get("direction"), Some(&json!("receive")));
    }
}
