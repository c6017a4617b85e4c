//! Worker-side request executor
//!
//! Execution flow for one inbound frame (strict order):
//! 1. Parse the envelope (kind, id, optional operand, raw fields)
//! 2. `load`: acquire the dataset through the loader and hold it
//! 3. Otherwise look the kind up in the dispatch table
//! 4. Resolve the operand: the explicit one, else a copy of the held dataset
//! 5. Run the handler and reply with the same kind and id
//!
//! Frames are handled one at a time, in arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::mpsc;

use crate::loader::Loader;
use crate::observability::{log_event, Event, Logger};
use crate::protocol::{
    AttrParams, BetweenParams, Envelope, EqualsParams, IntersectParams, KeyParams, LoadParams,
    MatchingParams, RangeParams, Reply, SortParams, UnionParams,
};
use crate::record::{Data, Record, Value};

use super::aggregate;
use super::errors::{ExecutorError, ExecutorResult};
use super::filters::PredicateFilter;
use super::grouping::{collection, group_by, per_partition};
use super::sets;
use super::sorter::ResultSorter;

/// A dispatch table entry
type Handler = fn(&Executor, Data, &Map<String, JsonValue>) -> ExecutorResult<Data>;

const LOAD_KIND: &str = "load";

/// Owns the held dataset and answers requests against it
pub struct Executor {
    dataset: Option<Vec<Record>>,
    loader: Arc<dyn Loader>,
    handlers: HashMap<&'static str, Handler>,
}

impl Executor {
    /// Creates an executor with no dataset; the first `load` request seeds it
    pub fn new(loader: Arc<dyn Loader>) -> Self {
        let mut handlers: HashMap<&'static str, Handler> = HashMap::new();
        handlers.insert("all", Self::all);
        handlers.insert("sortBy", Self::sort_partitions);
        handlers.insert("between", Self::between);
        handlers.insert("equals", Self::equals);
        handlers.insert("matching", Self::matching);
        handlers.insert("range", Self::range);
        handlers.insert("key", Self::key);
        handlers.insert("sum", Self::sum);
        handlers.insert("avg", Self::avg);
        handlers.insert("mean", Self::avg);
        handlers.insert("groupBy", Self::group);
        handlers.insert("or", Self::union);
        handlers.insert("and", Self::intersect);
        handlers.insert("invert", Self::invert);

        Self {
            dataset: None,
            loader,
            handlers,
        }
    }

    /// Creates an executor that already holds `records`
    pub fn with_dataset(loader: Arc<dyn Loader>, records: Vec<Record>) -> Self {
        let mut executor = Self::new(loader);
        executor.dataset = Some(records);
        executor
    }

    /// Number of held records, `None` before the first successful load
    pub fn dataset_len(&self) -> Option<usize> {
        self.dataset.as_ref().map(|d| d.len())
    }

    /// Serves frames until the inbound channel closes or nobody listens
    /// for replies anymore.
    pub async fn serve(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<String>,
        outbound: mpsc::UnboundedSender<String>,
    ) {
        log_event(Event::WorkerStarted, &[]);

        while let Some(frame) = inbound.recv().await {
            let reply = self.handle_frame(&frame).await;
            let text = match reply.to_frame() {
                Ok(text) => text,
                Err(e) => {
                    Logger::error(
                        "REPLY_ENCODE_FAILED",
                        &[("mid", &reply.mid), ("reason", &e.to_string())],
                    );
                    continue;
                }
            };
            if outbound.send(text).is_err() {
                break;
            }
        }

        log_event(Event::WorkerStopped, &[]);
    }

    /// Turns one inbound frame into exactly one reply
    pub async fn handle_frame(&mut self, frame: &str) -> Reply {
        let envelope = match Envelope::parse(frame) {
            Ok(envelope) => envelope,
            Err(reason) => {
                let err = ExecutorError::MalformedMessage(reason);
                log_event(Event::MalformedMessage, &[("reason", &err.to_string())]);
                return Reply::failure(Envelope::peek_mid(frame), err.code(), err.to_string(), err.cause());
            }
        };

        let kind = envelope.kind.clone();
        let mid = envelope.mid.clone();
        match self.handle(envelope).await {
            Ok(data) => Reply::success(kind, mid, data),
            Err(err) => {
                log_event(
                    Event::RequestFailed,
                    &[("code", err.code()), ("mid", &mid), ("type", &kind)],
                );
                Reply::failure(mid, err.code(), err.to_string(), err.cause())
            }
        }
    }

    /// Runs one parsed request
    pub async fn handle(&mut self, envelope: Envelope) -> ExecutorResult<Data> {
        if envelope.kind == LOAD_KIND {
            return self.load(&envelope.params).await;
        }

        let handler = match self.handlers.get(envelope.kind.as_str()) {
            Some(handler) => *handler,
            None => {
                return Err(ExecutorError::UnknownOperation {
                    message: envelope.context(),
                    kind: envelope.kind,
                })
            }
        };

        let operand = match envelope.operand {
            Some(operand) => operand,
            None => Data::Collection(self.held()?.to_vec()),
        };
        handler(self, operand, &envelope.params)
    }

    async fn load(&mut self, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let params: LoadParams = parse_params(LOAD_KIND, params)?;
        log_event(Event::DatasetLoadBegin, &[("resource", &params.resource)]);

        let records = match self.loader.load(&params.resource).await {
            Ok(records) => records,
            Err(err) => {
                log_event(
                    Event::DatasetLoadFailed,
                    &[("reason", &err.to_string()), ("resource", &params.resource)],
                );
                return Err(err.into());
            }
        };

        let count = records.len();
        self.dataset = Some(records);
        log_event(
            Event::DatasetLoaded,
            &[("records", &count.to_string()), ("resource", &params.resource)],
        );
        Ok(Data::Scalar(Value::from(count as i64)))
    }

    fn held(&self) -> ExecutorResult<&[Record]> {
        self.dataset.as_deref().ok_or(ExecutorError::DatasetNotLoaded)
    }

    fn all(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: SortParams = parse_params("all", params)?;
        let records = collection("all", operand)?;
        Ok(Data::Collection(ResultSorter::sort(records, &p.sort_by)))
    }

    fn between(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: BetweenParams = parse_params("between", params)?;
        let records = collection("between", operand)?;
        Ok(Data::Collection(PredicateFilter::between(records, &p.attr, &p.low, &p.high)))
    }

    fn equals(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: EqualsParams = parse_params("equals", params)?;
        let records = collection("equals", operand)?;
        Ok(Data::Collection(PredicateFilter::equals(
            records,
            &p.attr,
            &p.value,
            p.ignore_case,
        )))
    }

    fn matching(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: MatchingParams = parse_params("matching", params)?;
        let pattern = Regex::new(&p.pattern)
            .map_err(|e| ExecutorError::invalid_params("matching", e.to_string()))?;
        let records = collection("matching", operand)?;
        Ok(Data::Collection(PredicateFilter::matching(records, &p.attr, &pattern)))
    }

    fn range(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: RangeParams = parse_params("range", params)?;
        per_partition("range", operand, &|records: Vec<Record>| {
            let high = p.high.unwrap_or(records.len()).min(records.len());
            let low = p.low.unwrap_or(0).min(high);
            Ok(Data::Collection(records[low..high].to_vec()))
        })
    }

    fn key(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: KeyParams = parse_params("key", params)?;
        let records = collection("key", operand)?;
        Ok(Data::Record(PredicateFilter::find_by_key(records, &p.attr, &p.key)))
    }

    fn sum(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: AttrParams = parse_params("sum", params)?;
        per_partition("sum", operand, &|records: Vec<Record>| {
            Ok(Data::Scalar(aggregate::sum(&records, &p.attr)))
        })
    }

    fn avg(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: AttrParams = parse_params("avg", params)?;
        per_partition("avg", operand, &|records: Vec<Record>| {
            Ok(Data::Scalar(aggregate::average(&records, &p.attr)))
        })
    }

    /// Like `all`, but a partition map gets every partition sorted
    fn sort_partitions(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: SortParams = parse_params("sortBy", params)?;
        per_partition("sortBy", operand, &|records: Vec<Record>| {
            Ok(Data::Collection(ResultSorter::sort(records, &p.sort_by)))
        })
    }

    fn group(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: AttrParams = parse_params("groupBy", params)?;
        let records = collection("groupBy", operand)?;
        Ok(Data::Partitions(group_by(records, &p.attr)))
    }

    fn union(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: UnionParams = parse_params("or", params)?;
        let records = collection("or", operand)?;
        Ok(Data::Collection(sets::union(records, p.union, &p.attr)))
    }

    fn intersect(&self, operand: Data, params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let p: IntersectParams = parse_params("and", params)?;
        let records = collection("and", operand)?;
        Ok(Data::Collection(sets::intersect(records, &p.intersect)))
    }

    fn invert(&self, operand: Data, _params: &Map<String, JsonValue>) -> ExecutorResult<Data> {
        let subset = collection("invert", operand)?;
        Ok(Data::Collection(sets::complement(self.held()?, &subset)))
    }
}

/// Deserializes a kind's parameter struct from the message's raw fields
fn parse_params<T: DeserializeOwned>(kind: &str, params: &Map<String, JsonValue>) -> ExecutorResult<T> {
    serde_json::from_value(JsonValue::Object(params.clone()))
        .map_err(|e| ExecutorError::invalid_params(kind, e.to_string()))
}
