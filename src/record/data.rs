//! Stage operands and results
//!
//! Every pipeline stage consumes and produces a `Data`. Most stages expect a
//! flat collection; the per-partition stages also accept a partition map.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::Record;
use super::value::Value;

/// Output of a stage.
///
/// Externally tagged on the wire: `{"collection": [...]}`,
/// `{"partitions": {...}}`, `{"record": {...} | null}`, `{"scalar": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Data {
    /// Ordered sequence of records
    Collection(Vec<Record>),
    /// Group key to per-group output
    Partitions(BTreeMap<String, Data>),
    /// Result of a key lookup
    Record(Option<Record>),
    /// Result of an aggregate
    Scalar(Value),
}

/// Shape of a `Data`, used for operand checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Collection,
    Partitions,
    Record,
    Scalar,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Collection => "collection",
            DataKind::Partitions => "partition map",
            DataKind::Record => "record",
            DataKind::Scalar => "scalar",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Data {
    pub fn kind(&self) -> DataKind {
        match self {
            Data::Collection(_) => DataKind::Collection,
            Data::Partitions(_) => DataKind::Partitions,
            Data::Record(_) => DataKind::Record,
            Data::Scalar(_) => DataKind::Scalar,
        }
    }

    pub fn as_collection(&self) -> Option<&[Record]> {
        match self {
            Data::Collection(records) => Some(records),
            _ => None,
        }
    }

    pub fn into_collection(self) -> Option<Vec<Record>> {
        match self {
            Data::Collection(records) => Some(records),
            _ => None,
        }
    }

    pub fn as_partitions(&self) -> Option<&BTreeMap<String, Data>> {
        match self {
            Data::Partitions(groups) => Some(groups),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Data::Record(record) => record.as_ref(),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Data::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Null scalar, missing record, or empty collection
    pub fn is_empty_result(&self) -> bool {
        match self {
            Data::Collection(records) => records.is_empty(),
            Data::Record(record) => record.is_none(),
            Data::Scalar(value) => value.is_null(),
            Data::Partitions(_) => false,
        }
    }
}

impl From<Vec<Record>> for Data {
    fn from(records: Vec<Record>) -> Self {
        Data::Collection(records)
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Data::Scalar(value)
    }
}
