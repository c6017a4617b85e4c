//! Dataset loading
//!
//! The worker acquires its dataset through a [`Loader`]. The default loader
//! reads one JSON array of flat objects and applies per-dataset
//! [`Normalizer`] hooks to every record.

mod errors;
mod loader;
mod normalize;

pub use errors::{LoaderError, LoaderResult};
pub use loader::{JsonFileLoader, Loader, StaticLoader};
pub use normalize::{DateFields, ListFields, NormalizeFailure, NormalizeResult, Normalizer};
