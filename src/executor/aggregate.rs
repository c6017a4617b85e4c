//! Numeric reductions

use crate::record::{Record, Value};

/// Sum of the numeric values of `attr`. Non-numeric and null values
/// contribute nothing; an empty input sums to 0.
pub fn sum(records: &[Record], attr: &str) -> Value {
    Value::Number(numbers(records, attr).sum())
}

/// Mean of the numeric values of `attr`, `Null` when there are none
pub fn average(records: &[Record], attr: &str) -> Value {
    let (total, count) = numbers(records, attr).fold((0.0, 0usize), |(t, c), n| (t + n, c + 1));
    if count == 0 {
        Value::Null
    } else {
        Value::Number(total / count as f64)
    }
}

fn numbers<'a>(records: &'a [Record], attr: &'a str) -> impl Iterator<Item = f64> + 'a {
    records.iter().filter_map(move |r| r.get(attr).as_f64())
}
