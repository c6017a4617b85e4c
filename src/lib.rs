//! aeroquery - an asynchronous query engine over an in-memory record collection
//!
//! The dataset lives in a worker context that answers one JSON request per
//! frame. Queries are lazy pipelines of stages; each stage is one correlated
//! request/reply round trip.

pub mod cli;
pub mod config;
pub mod executor;
pub mod loader;
pub mod observability;
pub mod protocol;
pub mod query;
pub mod record;

pub use config::{CollectionConfig, WorkerLocation};
pub use query::{DataCollection, Query, QueryError, QueryResult, Stage};
pub use record::{Data, Record, Value};
