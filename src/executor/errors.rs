//! Executor error types
//!
//! Every variant maps to a stable code carried in the failure reply, so the
//! coordinator can rebuild a typed error on its side.

use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use crate::loader::LoaderError;
use crate::protocol::codes;
use crate::record::DataKind;

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Executor errors
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("unknown type {kind}")]
    UnknownOperation {
        kind: String,
        /// The offending message, without its operand
        message: JsonValue,
    },

    #[error("cannot call '{operation}' on a {found}")]
    InvalidOperandKind { operation: String, found: DataKind },

    #[error("invalid parameters for '{kind}': {reason}")]
    InvalidParameters { kind: String, reason: String },

    #[error("no dataset loaded and no operand supplied")]
    DatasetNotLoaded,

    #[error("failed to load dataset: {0}")]
    LoaderFailure(#[from] LoaderError),

    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

impl ExecutorError {
    pub fn invalid_operand(operation: &str, found: DataKind) -> Self {
        ExecutorError::InvalidOperandKind {
            operation: operation.to_string(),
            found,
        }
    }

    pub fn invalid_params(kind: &str, reason: impl Into<String>) -> Self {
        ExecutorError::InvalidParameters {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }

    /// Wire code for failure replies
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorError::UnknownOperation { .. } => codes::UNKNOWN_OPERATION,
            ExecutorError::InvalidOperandKind { .. } => codes::INVALID_OPERAND_KIND,
            ExecutorError::InvalidParameters { .. } => codes::INVALID_PARAMETERS,
            ExecutorError::DatasetNotLoaded => codes::DATASET_NOT_LOADED,
            ExecutorError::LoaderFailure(_) => codes::LOADER_FAILURE,
            ExecutorError::MalformedMessage(_) => codes::MALFORMED_MESSAGE,
        }
    }

    /// Structured context for the reply's `cause` field
    pub fn cause(&self) -> JsonValue {
        match self {
            ExecutorError::UnknownOperation { message, .. } => message.clone(),
            ExecutorError::InvalidOperandKind { operation, found } => {
                json!({"operation": operation, "found": found})
            }
            ExecutorError::InvalidParameters { kind, reason } => {
                json!({"type": kind, "reason": reason})
            }
            ExecutorError::LoaderFailure(err) => json!({"loader": err.code()}),
            ExecutorError::DatasetNotLoaded | ExecutorError::MalformedMessage(_) => JsonValue::Null,
        }
    }
}
