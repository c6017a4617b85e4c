//! Multi-key record ordering
//!
//! Keys are attribute names optionally prefixed with `+` (ascending, the
//! default) or `-` (descending). Keys are tried left to right; the first key
//! that tells two records apart decides.
//!
//! Per key:
//! 1. equal values: go to the next key
//! 2. both numbers, or both dates: numeric order, direction applied
//! 3. both truthy and at least one a string: string order of the
//!    stringified values, direction applied
//! 4. left falsy: left first; right falsy: right first. Direction is NOT
//!    applied here, so null sorts first in both ascending and descending order
//! 5. anything else: go to the next key
//!
//! Sorting always produces a new vector; the input order is never mutated
//! in place.

use std::cmp::Ordering;

use crate::record::{Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub attr: String,
    pub direction: SortDirection,
}

impl SortKey {
    /// Parses `+attr`, `-attr` or `attr`
    pub fn parse(text: &str) -> Self {
        if let Some(attr) = text.strip_prefix('-') {
            Self {
                attr: attr.to_string(),
                direction: SortDirection::Desc,
            }
        } else {
            Self {
                attr: text.strip_prefix('+').unwrap_or(text).to_string(),
                direction: SortDirection::Asc,
            }
        }
    }
}

/// Sorts records
pub struct ResultSorter;

impl ResultSorter {
    /// Returns the records ordered by `ordering`. Stable.
    pub fn sort(records: Vec<Record>, ordering: &[String]) -> Vec<Record> {
        let keys: Vec<SortKey> = ordering.iter().map(|s| SortKey::parse(s)).collect();
        if keys.is_empty() {
            return records;
        }
        merge_sort(records, &|a, b| Self::compare_records(a, b, &keys))
    }

    pub fn compare_records(a: &Record, b: &Record, keys: &[SortKey]) -> Ordering {
        for key in keys {
            let ordering = Self::compare_values(a.get(&key.attr), b.get(&key.attr), key.direction);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn compare_values(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }

        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                return direction.apply(x.partial_cmp(y).unwrap_or(Ordering::Equal));
            }
            (Value::Date(x), Value::Date(y)) => return direction.apply(x.cmp(y)),
            _ => {}
        }

        if a.is_truthy() && b.is_truthy() && (a.is_string() || b.is_string()) {
            return direction.apply(locale_compare(&a.to_string(), &b.to_string()));
        }

        if !a.is_truthy() {
            return Ordering::Less;
        }
        if !b.is_truthy() {
            return Ordering::Greater;
        }
        Ordering::Equal
    }
}

/// Case-insensitive comparison; on a tie lowercase sorts before uppercase.
fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// Stable merge sort that tolerates comparators which are not a total order.
fn merge_sort<T, F>(mut items: Vec<T>, compare: &F) -> Vec<T>
where
    F: Fn(&T, &T) -> Ordering,
{
    if items.len() <= 1 {
        return items;
    }

    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare);
    let right = merge_sort(right, compare);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => compare(l, r) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        merged.extend(if take_left { left.next() } else { right.next() });
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, x: impl Into<Value>) -> Record {
        Record::new().with("id", id).with("x", x)
    }

    fn ids(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.get("id").to_string()).collect()
    }

    fn order(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(SortKey::parse("-year").direction, SortDirection::Desc);
        assert_eq!(SortKey::parse("+year").attr, "year");
        assert_eq!(SortKey::parse("year").direction, SortDirection::Asc);
    }

    #[test]
    fn test_sort_ascending() {
        let docs = vec![doc("c", 30), doc("a", 20), doc("b", 25)];
        let sorted = ResultSorter::sort(docs, &order(&["x"]));
        assert_eq!(ids(&sorted), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_descending() {
        let docs = vec![doc("c", 30), doc("a", 20), doc("b", 25)];
        let sorted = ResultSorter::sort(docs, &order(&["-x"]));
        assert_eq!(ids(&sorted), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_sort_stable() {
        let docs = vec![doc("a", 25), doc("b", 25), doc("c", 25)];
        let sorted = ResultSorter::sort(docs, &order(&["-x"]));
        assert_eq!(ids(&sorted), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_null_first_regardless_of_direction() {
        let docs = vec![doc("two", 2), doc("null", Value::Null), doc("one", 1)];

        let desc = ResultSorter::sort(docs.clone(), &order(&["-x"]));
        assert_eq!(ids(&desc), vec!["null", "two", "one"]);

        let asc = ResultSorter::sort(docs, &order(&["x"]));
        assert_eq!(ids(&asc), vec!["null", "one", "two"]);
    }

    #[test]
    fn test_missing_attribute_sorts_like_null() {
        let docs = vec![doc("two", 2), Record::new().with("id", "none"), doc("one", 1)];
        let sorted = ResultSorter::sort(docs, &order(&["-x"]));
        assert_eq!(ids(&sorted), vec!["none", "two", "one"]);
    }

    #[test]
    fn test_multi_key_tie_break() {
        let docs = vec![
            Record::new().with("id", "a").with("genre", "Drama").with("year", 1990),
            Record::new().with("id", "b").with("genre", "Action").with("year", 1995),
            Record::new().with("id", "c").with("genre", "Drama").with("year", 1999),
            Record::new().with("id", "d").with("genre", "Action").with("year", 1980),
        ];
        let sorted = ResultSorter::sort(docs, &order(&["genre", "-year"]));
        assert_eq!(ids(&sorted), vec!["b", "d", "c", "a"]);
    }

    #[test]
    fn test_sort_strings_ignore_case() {
        let docs = vec![doc("1", "charlie"), doc("2", "Alice"), doc("3", "bob")];
        let sorted = ResultSorter::sort(docs, &order(&["x"]));
        assert_eq!(ids(&sorted), vec!["2", "3", "1"]);
    }

    #[test]
    fn test_sort_dates() {
        use crate::record::Timestamp;
        let day = |s| Value::Date(Timestamp::parse(s).unwrap());
        let docs = vec![doc("b", day("1995-01-01")), doc("a", day("1979-01-01"))];
        let sorted = ResultSorter::sort(docs, &order(&["x"]));
        assert_eq!(ids(&sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_mixed_types_do_not_panic() {
        let docs = vec![
            doc("1", 9),
            doc("2", "9"),
            doc("3", 10),
            doc("4", true),
            doc("5", "8"),
            doc("6", 7),
            doc("7", ""),
        ];
        let sorted = ResultSorter::sort(docs, &order(&["x"]));
        assert_eq!(sorted.len(), 7);
        assert_eq!(ids(&sorted)[0], "7");
    }

    #[test]
    fn test_empty_ordering_keeps_input() {
        let docs = vec![doc("b", 2), doc("a", 1)];
        let sorted = ResultSorter::sort(docs, &[]);
        assert_eq!(ids(&sorted), vec!["b", "a"]);
    }
}
