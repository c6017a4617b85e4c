//! Records: dynamic attribute maps

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::Value;

static NULL: Value = Value::Null;

/// A single record of the collection.
///
/// The attribute set is not declared up front. Reading an attribute that is
/// not present yields `Value::Null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(attr, value);
        self
    }

    /// Returns the attribute value, `Null` if absent
    pub fn get(&self, attr: &str) -> &Value {
        self.0.get(attr).unwrap_or(&NULL)
    }

    pub fn get_mut(&mut self, attr: &str) -> Option<&mut Value> {
        self.0.get_mut(attr)
    }

    /// Returns true if the attribute is present (even if null)
    pub fn contains(&self, attr: &str) -> bool {
        self.0.contains_key(attr)
    }

    pub fn insert(&mut self, attr: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(attr.into(), value.into())
    }

    pub fn remove(&mut self, attr: &str) -> Option<Value> {
        self.0.remove(attr)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_attribute_reads_null() {
        let record = Record::new().with("title", "Alien");
        assert_eq!(record.get("title"), &Value::from("Alien"));
        assert!(record.get("year").is_null());
        assert!(!record.contains("year"));
    }

    #[test]
    fn test_record_from_json_object() {
        let record: Record =
            serde_json::from_value(json!({"id": 1, "title": "Alien", "tags": ["scifi"]})).unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.get("id"), &Value::Number(1.0));
    }

    #[test]
    fn test_record_rejects_non_object() {
        let result: Result<Record, _> = serde_json::from_value(json!([1, 2]));
        assert!(result.is_err());
    }
}
