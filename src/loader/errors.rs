//! Loader errors

use thiserror::Error;

pub type LoaderResult<T> = Result<T, LoaderError>;

#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    #[error("cannot read {resource}: {reason}")]
    Io { resource: String, reason: String },

    #[error("{resource} is not valid JSON: {reason}")]
    Parse { resource: String, reason: String },

    #[error("{resource} is not an array of objects: {reason}")]
    NotACollection { resource: String, reason: String },

    #[error("cannot normalize '{attr}' of record {index}: {reason}")]
    Normalize {
        index: usize,
        attr: String,
        reason: String,
    },
}

impl LoaderError {
    pub fn code(&self) -> &'static str {
        match self {
            LoaderError::Io { .. } => "LOADER_IO",
            LoaderError::Parse { .. } => "LOADER_PARSE",
            LoaderError::NotACollection { .. } => "LOADER_NOT_A_COLLECTION",
            LoaderError::Normalize { .. } => "LOADER_NORMALIZE",
        }
    }
}
