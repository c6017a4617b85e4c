//! Key-based set algebra over collections
//!
//! Union keys on a caller-chosen attribute. Intersection and complement
//! always key on `id`.

use std::collections::HashSet;

use crate::record::{Record, Value};

/// Identity attribute for intersection and complement
pub const IDENTITY_ATTR: &str = "id";

/// Typed identity of a key value: `1` and `"1"` stay distinct.
fn identity(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn keys(records: &[Record], attr: &str) -> HashSet<String> {
    records.iter().map(|r| identity(r.get(attr))).collect()
}

/// Appends every record of `b` whose `attr` value is not already present.
///
/// Presence is checked against the growing result, so duplicates inside `b`
/// are collapsed as well.
pub fn union(mut a: Vec<Record>, b: Vec<Record>, attr: &str) -> Vec<Record> {
    let mut seen = keys(&a, attr);
    for record in b {
        if seen.insert(identity(record.get(attr))) {
            a.push(record);
        }
    }
    a
}

/// Keeps the records of `a` whose `id` appears in `b`
pub fn intersect(a: Vec<Record>, b: &[Record]) -> Vec<Record> {
    let present = keys(b, IDENTITY_ATTR);
    a.into_iter()
        .filter(|r| present.contains(&identity(r.get(IDENTITY_ATTR))))
        .collect()
}

/// Records of `base` whose `id` does not appear in `subset`, in base order
pub fn complement(base: &[Record], subset: &[Record]) -> Vec<Record> {
    let excluded = keys(subset, IDENTITY_ATTR);
    base.iter()
        .filter(|r| !excluded.contains(&identity(r.get(IDENTITY_ATTR))))
        .cloned()
        .collect()
}
