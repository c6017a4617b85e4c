//! Grouping and the grouped adaptor
//!
//! `group_by` turns a collection into a partition map. `per_partition`
//! lets a per-collection operation run on either shape: on a collection it
//! applies directly, on a partition map it applies to every partition and
//! keeps the keys.

use std::collections::BTreeMap;

use crate::record::{Data, Record};

use super::errors::{ExecutorError, ExecutorResult};

/// Partitions records by the stringified value of `attr`.
///
/// Records keep their relative order inside each group. A record without
/// the attribute lands in the `null` group.
pub fn group_by(records: Vec<Record>, attr: &str) -> BTreeMap<String, Data> {
    let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for record in records {
        let key = record.get(attr).to_string();
        groups.entry(key).or_default().push(record);
    }
    groups
        .into_iter()
        .map(|(key, records)| (key, Data::Collection(records)))
        .collect()
}

/// Applies `apply` to a collection, or to every partition of a partition
/// map (recursively), preserving the map's keys.
pub fn per_partition<F>(operation: &str, data: Data, apply: &F) -> ExecutorResult<Data>
where
    F: Fn(Vec<Record>) -> ExecutorResult<Data>,
{
    match data {
        Data::Collection(records) => apply(records),
        Data::Partitions(groups) => groups
            .into_iter()
            .map(|(key, part)| Ok((key, per_partition(operation, part, apply)?)))
            .collect::<ExecutorResult<BTreeMap<_, _>>>()
            .map(Data::Partitions),
        other => Err(ExecutorError::invalid_operand(operation, other.kind())),
    }
}

/// Requires a flat collection
pub fn collection(operation: &str, data: Data) -> ExecutorResult<Vec<Record>> {
    match data {
        Data::Collection(records) => Ok(records),
        other => Err(ExecutorError::invalid_operand(operation, other.kind())),
    }
}
