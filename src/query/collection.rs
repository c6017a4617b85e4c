//! Data collection session
//!
//! Opening a collection spawns its worker, loads the dataset into it, and
//! returns only once the dataset is held. Every query built from the
//! collection talks to that worker.

use std::sync::Arc;

use crate::config::CollectionConfig;
use crate::executor::{spawn_worker, Executor};
use crate::loader::{JsonFileLoader, Loader};
use crate::observability::{set_min_severity, ProtocolMetrics};
use crate::protocol::{Correlator, LoadParams, Operation};
use crate::record::{Data, Value};

use super::builder::Query;
use super::errors::{QueryError, QueryResult};
use super::stage::Stage;

/// State shared by all queries of one collection
pub(crate) struct Session {
    correlator: Correlator,
}

impl Session {
    pub(crate) async fn send(&self, operation: Operation, operand: Option<Data>) -> QueryResult<Data> {
        self.correlator.send(operation, operand).await
    }
}

/// A loaded dataset living in its own worker context
pub struct DataCollection {
    session: Arc<Session>,
    config: CollectionConfig,
    len: usize,
}

impl DataCollection {
    /// Opens the collection with the JSON file loader
    pub async fn open(config: CollectionConfig) -> QueryResult<Self> {
        let loader = JsonFileLoader::from_config(&config);
        Self::open_with_loader(config, Arc::new(loader)).await
    }

    /// Opens the collection with a custom loader.
    ///
    /// Fails with `LoaderFailure` if the dataset cannot be loaded; no
    /// collection exists in that case.
    pub async fn open_with_loader(config: CollectionConfig, loader: Arc<dyn Loader>) -> QueryResult<Self> {
        config.validate()?;
        set_min_severity(config.log_level);

        let channels = spawn_worker(config.worker_location, Executor::new(loader))
            .map_err(|e| QueryError::WorkerUnavailable(e.to_string()))?;
        let correlator = Correlator::new(channels.outbound, channels.inbound, config.timeout());

        let load = Operation::Load(LoadParams {
            resource: config.resource_location.clone(),
        });
        let loaded = correlator
            .send_with_timeout(load, None, config.load_timeout())
            .await?;
        let len = loaded
            .as_scalar()
            .and_then(Value::as_f64)
            .map(|n| n as usize)
            .ok_or_else(|| QueryError::Protocol("load reply is not a record count".to_string()))?;

        Ok(Self {
            session: Arc::new(Session { correlator }),
            config,
            len,
        })
    }

    /// Number of records loaded
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ProtocolMetrics> {
        self.session.correlator.metrics()
    }

    /// Requests still waiting for a reply
    pub fn pending_requests(&self) -> usize {
        self.session.correlator.pending_count()
    }

    /// An empty query; its result is every record
    pub fn query(&self) -> Query {
        Query::new(self.session.clone())
    }

    /// A query made of already-described stages
    pub fn pipeline(&self, stages: Vec<Stage>) -> Query {
        Query::with_stages(self.session.clone(), stages)
    }

    pub fn all<S: AsRef<str>>(&self, sort_by: &[S]) -> Query {
        self.query().all(sort_by)
    }

    pub fn with_key(&self, value: impl Into<Value>) -> Query {
        self.query().with_key(value)
    }

    pub fn equals(&self, attr: &str, value: impl Into<Value>) -> Query {
        self.query().equals(attr, value)
    }

    pub fn between(&self, attr: &str, low: impl Into<Value>, high: impl Into<Value>) -> Query {
        self.query().between(attr, low, high)
    }

    pub fn matching(&self, attr: &str, pattern: &str) -> Query {
        self.query().matching(attr, pattern)
    }

    pub fn sort_by<S: AsRef<str>>(&self, attributes: &[S]) -> Query {
        self.query().sort_by(attributes)
    }

    pub fn group_by(&self, attr: &str) -> Query {
        self.query().group_by(attr)
    }
}
