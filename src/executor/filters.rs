//! Record filtering
//!
//! Filters keep input order. Comparisons are typed: a value of a different
//! type than the bound never matches, and null never matches a range.

use std::cmp::Ordering;

use regex::Regex;

use crate::record::{Record, Value};

/// Evaluates filter predicates against records
pub struct PredicateFilter;

impl PredicateFilter {
    /// Keeps records with `low <= record[attr] <= high`
    pub fn between(records: Vec<Record>, attr: &str, low: &Value, high: &Value) -> Vec<Record> {
        records
            .into_iter()
            .filter(|r| Self::in_range(r.get(attr), low, high))
            .collect()
    }

    /// Keeps records with `record[attr] == value`.
    ///
    /// With `ignore_case`, two strings compare after lowercasing; every other
    /// pairing is exact.
    pub fn equals(records: Vec<Record>, attr: &str, value: &Value, ignore_case: bool) -> Vec<Record> {
        records
            .into_iter()
            .filter(|r| Self::eq_match(r.get(attr), value, ignore_case))
            .collect()
    }

    /// Keeps records whose stringified attribute matches `pattern`
    pub fn matching(records: Vec<Record>, attr: &str, pattern: &Regex) -> Vec<Record> {
        records
            .into_iter()
            .filter(|r| {
                let value = r.get(attr);
                !value.is_null() && pattern.is_match(&value.to_string())
            })
            .collect()
    }

    /// First record whose `attr` equals `key`
    pub fn find_by_key(records: Vec<Record>, attr: &str, key: &Value) -> Option<Record> {
        records.into_iter().find(|r| r.get(attr) == key)
    }

    fn in_range(actual: &Value, low: &Value, high: &Value) -> bool {
        matches!(
            actual.natural_cmp(low),
            Some(Ordering::Greater | Ordering::Equal)
        ) && matches!(
            actual.natural_cmp(high),
            Some(Ordering::Less | Ordering::Equal)
        )
    }

    fn eq_match(actual: &Value, expected: &Value, ignore_case: bool) -> bool {
        match (actual, expected) {
            (Value::String(a), Value::String(b)) if ignore_case => {
                a.to_lowercase() == b.to_lowercase()
            }
            _ => actual == expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Timestamp;

    fn movie(id: i64, title: &str, year: i64) -> Record {
        Record::new().with("id", id).with("title", title).with("year", year)
    }

    fn ids(records: &[Record]) -> Vec<f64> {
        records.iter().filter_map(|r| r.get("id").as_f64()).collect()
    }

    fn movies() -> Vec<Record> {
        vec![
            movie(1, "Alien", 1979),
            movie(2, "Aliens", 1986),
            movie(3, "Heat", 1995),
            movie(4, "Se7en", 1995),
        ]
    }

    #[test]
    fn test_between_inclusive() {
        let out = PredicateFilter::between(movies(), "year", &Value::from(1986), &Value::from(1995));
        assert_eq!(ids(&out), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_between_equal_bounds_matches_equals() {
        let bound = Value::from(1995);
        let between = PredicateFilter::between(movies(), "year", &bound, &bound);
        let equals = PredicateFilter::equals(movies(), "year", &bound, true);
        assert_eq!(between, equals);
    }

    #[test]
    fn test_between_skips_other_types() {
        let mut records = movies();
        records.push(Record::new().with("id", 5).with("year", "1990"));
        records.push(Record::new().with("id", 6));

        let out = PredicateFilter::between(records, "year", &Value::from(1900), &Value::from(2000));
        assert_eq!(ids(&out), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_between_dates_and_strings() {
        let day = |s| Value::Date(Timestamp::parse(s).unwrap());
        let records = vec![
            Record::new().with("id", 1).with("released", day("1979-05-25")),
            Record::new().with("id", 2).with("released", day("1995-12-15")),
        ];
        let out = PredicateFilter::between(records, "released", &day("1990-01-01"), &day("1999-12-31"));
        assert_eq!(ids(&out), vec![2.0]);

        let out = PredicateFilter::between(movies(), "title", &Value::from("B"), &Value::from("I"));
        assert_eq!(ids(&out), vec![3.0]);
    }

    #[test]
    fn test_equals_ignores_case_by_default() {
        let out = PredicateFilter::equals(movies(), "title", &Value::from("ALIEN"), true);
        assert_eq!(ids(&out), vec![1.0]);

        let out = PredicateFilter::equals(movies(), "title", &Value::from("ALIEN"), false);
        assert!(out.is_empty());
    }

    #[test]
    fn test_equals_no_type_coercion() {
        let out = PredicateFilter::equals(movies(), "year", &Value::from("1995"), true);
        assert!(out.is_empty());
    }

    #[test]
    fn test_matching_stringifies() {
        let pattern = Regex::new("^Alien").unwrap();
        let out = PredicateFilter::matching(movies(), "title", &pattern);
        assert_eq!(ids(&out), vec![1.0, 2.0]);

        let pattern = Regex::new("^199").unwrap();
        let out = PredicateFilter::matching(movies(), "year", &pattern);
        assert_eq!(ids(&out), vec![3.0, 4.0]);
    }

    #[test]
    fn test_matching_skips_missing() {
        let records = vec![Record::new().with("id", 1)];
        let pattern = Regex::new("null").unwrap();
        assert!(PredicateFilter::matching(records, "title", &pattern).is_empty());
    }

    #[test]
    fn test_find_by_key_first_match() {
        let mut records = movies();
        records.push(movie(3, "Heat (duplicate)", 1995));

        let found = PredicateFilter::find_by_key(records.clone(), "id", &Value::from(3)).unwrap();
        assert_eq!(found.get("title"), &Value::from("Heat"));

        assert!(PredicateFilter::find_by_key(records, "id", &Value::from(99)).is_none());
    }
}
