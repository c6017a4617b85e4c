//! Pipeline stages
//!
//! A query is an ordered list of stages. Stages are plain data, so a
//! pipeline can be written as JSON:
//!
//! ```json
//! [
//!   {"op": "between", "attr": "year", "low": 1990, "high": 1999},
//!   {"op": "groupBy", "attr": "genre"},
//!   {"op": "sum", "attr": "revenue"}
//! ]
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::{
    AttrParams, BetweenParams, EqualsParams, KeyParams, MatchingParams, Operation, RangeParams,
    SortParams,
};
use crate::record::{Data, DataKind, Value};

fn default_key_attr() -> String {
    "id".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Stage {
    Between {
        attr: String,
        low: Value,
        high: Value,
    },
    Equals {
        attr: String,
        value: Value,
        #[serde(rename = "ignoreCase", default = "default_true")]
        ignore_case: bool,
    },
    Matching {
        attr: String,
        pattern: String,
    },
    Range {
        #[serde(default)]
        low: Option<usize>,
        #[serde(default)]
        high: Option<usize>,
    },
    WithKey {
        value: Value,
        #[serde(default = "default_key_attr")]
        attr: String,
    },
    Sum {
        attr: String,
    },
    Avg {
        attr: String,
    },
    All {
        #[serde(rename = "sortBy", default)]
        sort_by: Vec<String>,
    },
    SortBy {
        attributes: Vec<String>,
    },
    /// Union with the result of a nested pipeline, keyed on `attr`
    Or {
        query: Vec<Stage>,
        #[serde(default = "default_key_attr")]
        attr: String,
    },
    /// Intersection with the result of a nested pipeline, keyed on `id`
    And {
        query: Vec<Stage>,
    },
    Invert,
    GroupBy {
        attr: String,
    },
    /// Replaces an empty output with `data`; evaluated locally
    FallbackIfEmpty {
        data: Data,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Between { .. } => "between",
            Stage::Equals { .. } => "equals",
            Stage::Matching { .. } => "matching",
            Stage::Range { .. } => "range",
            Stage::WithKey { .. } => "withKey",
            Stage::Sum { .. } => "sum",
            Stage::Avg { .. } => "avg",
            Stage::All { .. } => "all",
            Stage::SortBy { .. } => "sortBy",
            Stage::Or { .. } => "or",
            Stage::And { .. } => "and",
            Stage::Invert => "invert",
            Stage::GroupBy { .. } => "groupBy",
            Stage::FallbackIfEmpty { .. } => "fallbackIfEmpty",
        }
    }

    /// Whether the stage can consume an operand of this shape
    pub fn accepts(&self, kind: DataKind) -> bool {
        match self {
            Stage::FallbackIfEmpty { .. } => true,
            Stage::Range { .. } | Stage::Sum { .. } | Stage::Avg { .. } | Stage::SortBy { .. } => {
                matches!(kind, DataKind::Collection | DataKind::Partitions)
            }
            _ => kind == DataKind::Collection,
        }
    }

    /// The single worker request this stage maps to.
    ///
    /// `None` for stages that need more than one round trip (`or`, `and`)
    /// or none at all (`fallbackIfEmpty`).
    pub fn operation(&self) -> Option<Operation> {
        let operation = match self {
            Stage::Between { attr, low, high } => Operation::Between(BetweenParams {
                attr: attr.clone(),
                low: low.clone(),
                high: high.clone(),
            }),
            Stage::Equals {
                attr,
                value,
                ignore_case,
            } => Operation::Equals(EqualsParams {
                attr: attr.clone(),
                value: value.clone(),
                ignore_case: *ignore_case,
            }),
            Stage::Matching { attr, pattern } => Operation::Matching(MatchingParams {
                attr: attr.clone(),
                pattern: pattern.clone(),
            }),
            Stage::Range { low, high } => Operation::Range(RangeParams {
                low: *low,
                high: *high,
            }),
            Stage::WithKey { value, attr } => Operation::Key(KeyParams {
                key: value.clone(),
                attr: attr.clone(),
            }),
            Stage::Sum { attr } => Operation::Sum(AttrParams { attr: attr.clone() }),
            Stage::Avg { attr } => Operation::Avg(AttrParams { attr: attr.clone() }),
            Stage::All { sort_by } => Operation::All(SortParams {
                sort_by: sort_by.clone(),
            }),
            Stage::SortBy { attributes } => Operation::SortBy(SortParams {
                sort_by: attributes.clone(),
            }),
            Stage::Invert => Operation::Invert {},
            Stage::GroupBy { attr } => Operation::GroupBy(AttrParams { attr: attr.clone() }),
            Stage::Or { .. } | Stage::And { .. } | Stage::FallbackIfEmpty { .. } => return None,
        };
        Some(operation)
    }
}

fn join(parts: &[String]) -> String {
    parts.join(", ")
}

fn pipeline(stages: &[Stage]) -> String {
    let parts: Vec<String> = stages.iter().map(Stage::to_string).collect();
    format!("[{}]", parts.join(" -> "))
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Between { attr, low, high } => write!(f, "between({}, {}, {})", attr, low, high),
            Stage::Equals {
                attr,
                value,
                ignore_case,
            } => {
                if *ignore_case {
                    write!(f, "equals({}, {})", attr, value)
                } else {
                    write!(f, "equals({}, {}, case-sensitive)", attr, value)
                }
            }
            Stage::Matching { attr, pattern } => write!(f, "matching({}, /{}/)", attr, pattern),
            Stage::Range { low, high } => {
                let low = low.map(|n| n.to_string()).unwrap_or_default();
                let high = high.map(|n| n.to_string()).unwrap_or_default();
                write!(f, "range({}..{})", low, high)
            }
            Stage::WithKey { value, attr } => write!(f, "withKey({} = {})", attr, value),
            Stage::Sum { attr } => write!(f, "sum({})", attr),
            Stage::Avg { attr } => write!(f, "avg({})", attr),
            Stage::All { sort_by } => write!(f, "all({})", join(sort_by)),
            Stage::SortBy { attributes } => write!(f, "sortBy({})", join(attributes)),
            Stage::Or { query, attr } => write!(f, "or({} on {})", pipeline(query), attr),
            Stage::And { query } => write!(f, "and({} on id)", pipeline(query)),
            Stage::Invert => write!(f, "invert()"),
            Stage::GroupBy { attr } => write!(f, "groupBy({})", attr),
            Stage::FallbackIfEmpty { data } => write!(f, "fallbackIfEmpty({})", data.kind()),
        }
    }
}
