//! Query errors
//!
//! Every failure is terminal for the `result()` call that hit it; nothing
//! is retried.

use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::config::ConfigError;
use crate::protocol::{codes, Reply};
use crate::record::DataKind;

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request {mid} timed out after {}ms", .after.as_millis())]
    Timeout { mid: String, after: Duration },

    #[error("cannot call '{operation}' on a {found}")]
    InvalidOperandKind { operation: String, found: DataKind },

    #[error("worker does not know operation '{kind}'")]
    UnknownOperation { kind: String, cause: JsonValue },

    #[error("dataset could not be loaded: {message}")]
    LoaderFailure { message: String, cause: JsonValue },

    #[error("{code}: {message}")]
    Remote {
        code: String,
        message: String,
        cause: JsonValue,
    },

    #[error("worker channel closed")]
    ChannelClosed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("worker could not be started: {0}")]
    WorkerUnavailable(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl QueryError {
    pub fn invalid_operand(operation: &str, found: DataKind) -> Self {
        QueryError::InvalidOperandKind {
            operation: operation.to_string(),
            found,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            QueryError::Timeout { .. } => "TIMEOUT",
            QueryError::InvalidOperandKind { .. } => codes::INVALID_OPERAND_KIND,
            QueryError::UnknownOperation { .. } => codes::UNKNOWN_OPERATION,
            QueryError::LoaderFailure { .. } => codes::LOADER_FAILURE,
            QueryError::Remote { code, .. } => code.as_str(),
            QueryError::ChannelClosed => "CHANNEL_CLOSED",
            QueryError::InvalidConfig(_) => "INVALID_CONFIG",
            QueryError::WorkerUnavailable(_) => "WORKER_UNAVAILABLE",
            QueryError::Protocol(_) => "PROTOCOL_ERROR",
        }
    }

    /// Rebuilds a typed error from a failure reply
    pub fn from_reply(reply: Reply) -> Self {
        let code = reply.code.unwrap_or_default();
        let message = reply.message.unwrap_or_default();
        let cause = reply.cause.unwrap_or(JsonValue::Null);

        match code.as_str() {
            codes::UNKNOWN_OPERATION => QueryError::UnknownOperation {
                kind: cause
                    .get("type")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string(),
                cause,
            },
            codes::INVALID_OPERAND_KIND => {
                let operation = cause.get("operation").and_then(JsonValue::as_str);
                let found = cause
                    .get("found")
                    .cloned()
                    .and_then(|f| serde_json::from_value::<DataKind>(f).ok());
                match (operation, found) {
                    (Some(operation), Some(found)) => QueryError::invalid_operand(operation, found),
                    _ => QueryError::Remote {
                        code,
                        message,
                        cause,
                    },
                }
            }
            codes::LOADER_FAILURE => QueryError::LoaderFailure { message, cause },
            _ => QueryError::Remote {
                code,
                message,
                cause,
            },
        }
    }
}
