use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::config::CollectionConfig;
use crate::record::Record;

use super::errors::{LoaderError, LoaderResult};
use super::normalize::{DateFields, ListFields, Normalizer};

/// Acquires the dataset for a resource locator
pub trait Loader: Send + Sync {
    fn load<'a>(
        &'a self,
        resource: &'a str,
    ) -> Pin<Box<dyn Future<Output = LoaderResult<Vec<Record>>> + Send + 'a>>;
}

/// Reads a JSON file holding one array of objects.
///
/// Every record goes through the configured normalizers, in order.
#[derive(Default)]
pub struct JsonFileLoader {
    normalizers: Vec<Arc<dyn Normalizer>>,
}

impl JsonFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with the date and list normalizers named by the config
    pub fn from_config(config: &CollectionConfig) -> Self {
        let mut loader = Self::new();
        if !config.date_fields.is_empty() {
            loader = loader.with_normalizer(DateFields(config.date_fields.clone()));
        }
        if !config.list_fields.is_empty() {
            loader = loader.with_normalizer(ListFields(config.list_fields.clone()));
        }
        loader
    }

    pub fn with_normalizer(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.normalizers.push(Arc::new(normalizer));
        self
    }

    /// Parses and normalizes a document already in memory
    pub fn parse(&self, resource: &str, text: &str) -> LoaderResult<Vec<Record>> {
        let document: JsonValue = serde_json::from_str(text).map_err(|e| LoaderError::Parse {
            resource: resource.to_string(),
            reason: e.to_string(),
        })?;

        let JsonValue::Array(items) = document else {
            return Err(LoaderError::NotACollection {
                resource: resource.to_string(),
                reason: "top-level value is not an array".to_string(),
            });
        };

        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            if !item.is_object() {
                return Err(LoaderError::NotACollection {
                    resource: resource.to_string(),
                    reason: format!("element {} is not an object", index),
                });
            }
            let mut record: Record =
                serde_json::from_value(item).map_err(|e| LoaderError::NotACollection {
                    resource: resource.to_string(),
                    reason: format!("element {}: {}", index, e),
                })?;

            for normalizer in &self.normalizers {
                normalizer
                    .normalize(&mut record)
                    .map_err(|f| LoaderError::Normalize {
                        index,
                        attr: f.attr,
                        reason: f.reason,
                    })?;
            }
            records.push(record);
        }
        Ok(records)
    }
}

impl Loader for JsonFileLoader {
    fn load<'a>(
        &'a self,
        resource: &'a str,
    ) -> Pin<Box<dyn Future<Output = LoaderResult<Vec<Record>>> + Send + 'a>> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(resource)
                .await
                .map_err(|e| LoaderError::Io {
                    resource: resource.to_string(),
                    reason: e.to_string(),
                })?;
            self.parse(resource, &text)
        })
    }
}

/// Serves a fixed set of records for any resource
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    records: Vec<Record>,
}

impl StaticLoader {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl Loader for StaticLoader {
    fn load<'a>(
        &'a self,
        _resource: &'a str,
    ) -> Pin<Box<dyn Future<Output = LoaderResult<Vec<Record>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.records.clone()) })
    }
}
