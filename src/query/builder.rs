//! Lazy query builder
//!
//! Building a query only records stages. `result()` replays them in order:
//! the first stage runs against the worker's held dataset, every later
//! stage receives the previous output as its operand. Nothing is cached,
//! so calling `result()` again re-runs the whole pipeline.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::observability::{log_event, Event};
use crate::protocol::{IntersectParams, Operation, SortParams, UnionParams};
use crate::record::{Data, Record, Value};

use super::collection::Session;
use super::errors::{QueryError, QueryResult};
use super::stage::Stage;

type StageFuture<'a> = Pin<Box<dyn Future<Output = QueryResult<Data>> + Send + 'a>>;

/// A deferred pipeline against one collection
#[derive(Clone)]
pub struct Query {
    session: Arc<Session>,
    stages: Vec<Stage>,
    /// Queries combined by `or`/`and`, by stage index. They keep their own
    /// collection; stages without an entry here (JSON pipelines) run their
    /// nested stages on this query's collection.
    nested: HashMap<usize, Query>,
}

impl Query {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self::with_stages(session, Vec::new())
    }

    pub(crate) fn with_stages(session: Arc<Session>, stages: Vec<Stage>) -> Self {
        Self {
            session,
            stages,
            nested: HashMap::new(),
        }
    }

    fn push(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Keeps records with `low <= record[attr] <= high`
    pub fn between(self, attr: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.push(Stage::Between {
            attr: attr.to_string(),
            low: low.into(),
            high: high.into(),
        })
    }

    /// Keeps records whose `attr` equals `value`; strings compare ignoring case
    pub fn equals(self, attr: &str, value: impl Into<Value>) -> Self {
        self.push(Stage::Equals {
            attr: attr.to_string(),
            value: value.into(),
            ignore_case: true,
        })
    }

    pub fn equals_case_sensitive(self, attr: &str, value: impl Into<Value>) -> Self {
        self.push(Stage::Equals {
            attr: attr.to_string(),
            value: value.into(),
            ignore_case: false,
        })
    }

    /// Keeps records whose stringified `attr` matches the regular expression
    pub fn matching(self, attr: &str, pattern: &str) -> Self {
        self.push(Stage::Matching {
            attr: attr.to_string(),
            pattern: pattern.to_string(),
        })
    }

    /// Index window `[low, high)`, per partition on a partition map
    pub fn range(self, low: usize, high: usize) -> Self {
        self.push(Stage::Range {
            low: Some(low),
            high: Some(high),
        })
    }

    /// The first record whose `id` equals `value`, or nothing
    pub fn with_key(self, value: impl Into<Value>) -> Self {
        self.with_key_attr(value, "id")
    }

    pub fn with_key_attr(self, value: impl Into<Value>, attr: &str) -> Self {
        self.push(Stage::WithKey {
            value: value.into(),
            attr: attr.to_string(),
        })
    }

    pub fn sum(self, attr: &str) -> Self {
        self.push(Stage::Sum {
            attr: attr.to_string(),
        })
    }

    pub fn avg(self, attr: &str) -> Self {
        self.push(Stage::Avg {
            attr: attr.to_string(),
        })
    }

    /// Same as [`Query::avg`]
    pub fn mean(self, attr: &str) -> Self {
        self.avg(attr)
    }

    /// Every record of the operand, ordered by `sort_by` (`+attr`/`-attr`)
    pub fn all<S: AsRef<str>>(self, sort_by: &[S]) -> Self {
        self.push(Stage::All {
            sort_by: sort_by.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    /// Like [`Query::all`], and also sorts each partition of a partition map
    pub fn sort_by<S: AsRef<str>>(self, attributes: &[S]) -> Self {
        self.push(Stage::SortBy {
            attributes: attributes.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    /// Union with the result of `other`, keyed on `id`
    pub fn or(self, other: Query) -> Self {
        self.or_on(other, "id")
    }

    /// Union with the result of `other`, keyed on `attr`.
    ///
    /// `other` runs against its own collection, which need not be this one.
    pub fn or_on(self, other: Query, attr: &str) -> Self {
        let stage = Stage::Or {
            query: other.stages.clone(),
            attr: attr.to_string(),
        };
        self.combine(stage, other)
    }

    /// Intersection with the result of `other`. Always keyed on `id`.
    pub fn and(self, other: Query) -> Self {
        let stage = Stage::And {
            query: other.stages.clone(),
        };
        self.combine(stage, other)
    }

    fn combine(mut self, stage: Stage, other: Query) -> Self {
        self.nested.insert(self.stages.len(), other);
        self.push(stage)
    }

    /// Records of the whole collection that are not in the current result
    pub fn invert(self) -> Self {
        self.push(Stage::Invert)
    }

    pub fn group_by(self, attr: &str) -> Self {
        self.push(Stage::GroupBy {
            attr: attr.to_string(),
        })
    }

    /// Replaces a null, missing or empty result with `data`
    pub fn fallback_if_empty(self, data: impl Into<Data>) -> Self {
        self.push(Stage::FallbackIfEmpty { data: data.into() })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The pipeline, one line per stage, without running it
    pub fn describe(&self) -> Vec<String> {
        describe_stages(&self.stages)
    }

    /// Runs the pipeline
    pub async fn result(&self) -> QueryResult<Data> {
        let stages = self.stages.len().to_string();
        log_event(Event::QueryBegin, &[("stages", &stages)]);

        let outcome = run_stages(&self.session, &self.stages, Some(&self.nested)).await;
        match &outcome {
            Ok(data) => log_event(
                Event::QueryComplete,
                &[("result", data.kind().as_str()), ("stages", &stages)],
            ),
            Err(e) => log_event(
                Event::QueryFailed,
                &[("code", e.code()), ("reason", &e.to_string()), ("stages", &stages)],
            ),
        }
        outcome
    }

    /// Runs the pipeline and requires a collection result
    pub async fn records(&self) -> QueryResult<Vec<Record>> {
        let data = self.result().await?;
        let kind = data.kind();
        data.into_collection()
            .ok_or_else(|| QueryError::invalid_operand("records", kind))
    }
}

pub fn describe_stages(stages: &[Stage]) -> Vec<String> {
    stages
        .iter()
        .enumerate()
        .map(|(i, stage)| format!("{}. {}", i + 1, stage))
        .collect()
}

/// Threads the output of each stage into the next. Boxed because `or` and
/// `and` run nested pipelines through it.
fn run_stages<'a>(
    session: &'a Session,
    stages: &'a [Stage],
    nested: Option<&'a HashMap<usize, Query>>,
) -> StageFuture<'a> {
    Box::pin(async move {
        let mut current: Option<Data> = None;
        for (index, stage) in stages.iter().enumerate() {
            let other = nested.and_then(|n| n.get(&index));
            current = Some(run_stage(session, stage, other, current).await?);
        }
        match current {
            Some(data) => Ok(data),
            None => session.send(Operation::All(SortParams::default()), None).await,
        }
    })
}

/// Runs one stage. `operand` is `None` for the first stage, meaning the
/// held dataset. `other` is the query combined by an `or`/`and` stage.
async fn run_stage(
    session: &Session,
    stage: &Stage,
    other: Option<&Query>,
    operand: Option<Data>,
) -> QueryResult<Data> {
    if let Some(data) = &operand {
        if !stage.accepts(data.kind()) {
            return Err(QueryError::invalid_operand(stage.name(), data.kind()));
        }
    }

    match stage {
        Stage::FallbackIfEmpty { data } => {
            let current = match operand {
                Some(current) => current,
                None => session.send(Operation::All(SortParams::default()), None).await?,
            };
            Ok(if current.is_empty_result() {
                data.clone()
            } else {
                current
            })
        }
        Stage::Or { query, attr } => {
            let union = nested_collection(session, query, other, "or").await?;
            let operation = Operation::Or(UnionParams {
                union,
                attr: attr.clone(),
            });
            session.send(operation, operand).await
        }
        Stage::And { query } => {
            let intersect = nested_collection(session, query, other, "and").await?;
            session
                .send(Operation::And(IntersectParams { intersect }), operand)
                .await
        }
        _ => match stage.operation() {
            Some(operation) => session.send(operation, operand).await,
            None => Err(QueryError::Protocol(format!(
                "stage '{}' has no worker operation",
                stage.name()
            ))),
        },
    }
}

async fn nested_collection(
    session: &Session,
    stages: &[Stage],
    other: Option<&Query>,
    operation: &str,
) -> QueryResult<Vec<Record>> {
    let data = match other {
        Some(query) => run_stages(&query.session, &query.stages, Some(&query.nested)).await?,
        None => run_stages(session, stages, None).await?,
    };
    let kind = data.kind();
    data.into_collection()
        .ok_or_else(|| QueryError::invalid_operand(operation, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use crate::loader::StaticLoader;
    use crate::query::DataCollection;

    fn movie(id: i64, title: &str, genre: &str, year: i64) -> Record {
        Record::new()
            .with("id", id)
            .with("title", title)
            .with("genre", genre)
            .with("year", year)
    }

    async fn open_records(records: Vec<Record>) -> DataCollection {
        DataCollection::open_with_loader(
            CollectionConfig::new("movies"),
            Arc::new(StaticLoader::new(records)),
        )
        .await
        .unwrap()
    }

    async fn open() -> DataCollection {
        let records = vec![
            movie(1, "Alien", "Horror", 1979),
            movie(2, "Heat", "Crime", 1995),
            movie(3, "Se7en", "Crime", 1995),
            movie(4, "Fargo", "Crime", 1996),
            movie(5, "Scream", "Horror", 1996),
        ];
        open_records(records).await
    }

    fn ids(data: Data) -> Vec<f64> {
        data.into_collection()
            .unwrap()
            .iter()
            .filter_map(|r| r.get("id").as_f64())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_query_returns_everything() {
        let movies = open().await;
        assert_eq!(movies.len(), 5);
        assert_eq!(ids(movies.query().result().await.unwrap()), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn test_result_is_replayed() {
        let movies = open().await;
        let query = movies.between("year", 1995, 1996).all(&["-year", "title"]);
        let first = query.result().await.unwrap();
        let second = query.result().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ids(first), vec![4.0, 5.0, 2.0, 3.0]);
        assert_eq!(movies.metrics().snapshot().requests_sent, 1 + 4);
    }

    #[tokio::test]
    async fn test_aggregate_mid_chain_is_rejected() {
        let movies = open().await;
        let err = movies.query().sum("year").equals("genre", "crime").result().await.unwrap_err();
        match err {
            QueryError::InvalidOperandKind { operation, found } => {
                assert_eq!(operation, "equals");
                assert_eq!(found, crate::record::DataKind::Scalar);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_grouped_pipeline() {
        let movies = open().await;
        let data = movies.group_by("genre").range(0, 1).sum("year").result().await.unwrap();
        let groups = data.as_partitions().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["Crime"], Data::Scalar(Value::Number(1995.0)));
        assert_eq!(groups["Horror"], Data::Scalar(Value::Number(1979.0)));
    }

    #[tokio::test]
    async fn test_or_and_invert() {
        let movies = open().await;

        let horror = movies.equals("genre", "HORROR");
        let union = movies.equals("genre", "crime").or(horror).result().await.unwrap();
        assert_eq!(ids(union), vec![2.0, 3.0, 4.0, 1.0, 5.0]);

        let both = movies
            .between("year", 1995, 1996)
            .and(movies.equals("genre", "horror"))
            .result()
            .await
            .unwrap();
        assert_eq!(ids(both), vec![5.0]);

        let rest = movies.equals("genre", "crime").invert().result().await.unwrap();
        assert_eq!(ids(rest), vec![1.0, 5.0]);
    }

    #[tokio::test]
    async fn test_or_and_across_collections() {
        let movies = open().await;
        let sequels = open_records(vec![
            movie(100, "Aliens", "Horror", 1986),
            movie(3, "Se7en", "Crime", 1995),
        ])
        .await;

        let union = movies.equals("genre", "horror").or(sequels.query()).result().await.unwrap();
        assert_eq!(ids(union), vec![1.0, 5.0, 100.0, 3.0]);

        let both = movies.query().and(sequels.query()).result().await.unwrap();
        assert_eq!(ids(both), vec![3.0]);

        // Nested combinations keep their own collection too
        let nested = movies
            .equals("id", 1)
            .or(sequels.equals("genre", "crime").or(sequels.equals("id", 100)))
            .result()
            .await
            .unwrap();
        assert_eq!(ids(nested), vec![1.0, 3.0, 100.0]);
    }

    #[tokio::test]
    async fn test_with_key_and_fallback() {
        let movies = open().await;
        let found = movies.with_key(3).result().await.unwrap();
        assert_eq!(found.as_record().unwrap().get("title"), &Value::from("Se7en"));

        let missing = movies.with_key(99).result().await.unwrap();
        assert_eq!(missing, Data::Record(None));

        let fallback = Data::Scalar(Value::from("none"));
        let data = movies
            .with_key(99)
            .fallback_if_empty(fallback.clone())
            .result()
            .await
            .unwrap();
        assert_eq!(data, fallback);

        let data = movies.with_key(1).fallback_if_empty(fallback).result().await.unwrap();
        assert!(data.as_record().is_some());
    }

    #[tokio::test]
    async fn test_mean_matches_avg() {
        let movies = open().await;
        let avg = movies.query().avg("year").result().await.unwrap();
        let mean = movies.query().mean("year").result().await.unwrap();
        assert_eq!(avg, mean);
        assert_eq!(avg, Data::Scalar(Value::Number(1992.2)));
    }

    #[tokio::test]
    async fn test_describe_does_not_send() {
        let movies = open().await;
        let lines = movies
            .between("year", 1990, 1999)
            .group_by("genre")
            .sum("year")
            .describe();
        assert_eq!(lines, vec!["1. between(year, 1990, 1999)", "2. groupBy(genre)", "3. sum(year)"]);
        assert_eq!(movies.metrics().snapshot().requests_sent, 1);
    }
}
