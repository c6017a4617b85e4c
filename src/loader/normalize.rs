//! Per-dataset record normalization hooks
//!
//! A normalizer rewrites attributes of one freshly parsed record in place.
//! The JSON loader runs its normalizers in order on every record.

use crate::record::{Record, Timestamp, Value};

/// A normalization failure for one attribute; the loader adds the record index
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeFailure {
    pub attr: String,
    pub reason: String,
}

pub type NormalizeResult = Result<(), NormalizeFailure>;

pub trait Normalizer: Send + Sync {
    fn normalize(&self, record: &mut Record) -> NormalizeResult;
}

impl<F> Normalizer for F
where
    F: Fn(&mut Record) -> NormalizeResult + Send + Sync,
{
    fn normalize(&self, record: &mut Record) -> NormalizeResult {
        self(record)
    }
}

/// Turns string attributes holding a date into `Value::Date`.
///
/// Unparsable strings are left as they are.
#[derive(Debug, Clone, Default)]
pub struct DateFields(pub Vec<String>);

impl Normalizer for DateFields {
    fn normalize(&self, record: &mut Record) -> NormalizeResult {
        for attr in &self.0 {
            if let Some(value) = record.get_mut(attr) {
                let parsed = value.as_str().and_then(Timestamp::parse);
                if let Some(at) = parsed {
                    *value = Value::Date(at);
                }
            }
        }
        Ok(())
    }
}

/// Decodes string attributes holding an encoded list, e.g.
/// `"['Drama', 'Crime']"`, into `Value::List`.
///
/// Attributes that already are lists, or are null, are left alone.
#[derive(Debug, Clone, Default)]
pub struct ListFields(pub Vec<String>);

impl ListFields {
    fn decode(text: &str) -> Result<Value, String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Value::List(vec![]));
        }
        serde_json::from_str::<Vec<Value>>(trimmed)
            .or_else(|_| serde_json::from_str::<Vec<Value>>(&trimmed.replace('\'', "\"")))
            .map(Value::List)
            .map_err(|e| format!("not an encoded list: {}", e))
    }
}

impl Normalizer for ListFields {
    fn normalize(&self, record: &mut Record) -> NormalizeResult {
        for attr in &self.0 {
            if let Some(value) = record.get_mut(attr) {
                if let Value::String(text) = value {
                    let decoded = Self::decode(text).map_err(|reason| NormalizeFailure {
                        attr: attr.clone(),
                        reason,
                    })?;
                    *value = decoded;
                }
            }
        }
        Ok(())
    }
}
