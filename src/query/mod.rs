//! Query subsystem
//!
//! The coordinator side of a collection: [`DataCollection`] owns the session
//! with the worker, [`Query`] records a pipeline of [`Stage`]s and replays
//! it on `result()`.
//!
//! ```ignore
//! let movies = DataCollection::open(CollectionConfig::new("movies.json")).await?;
//! let per_genre = movies
//!     .between("year", 1990, 1999)
//!     .group_by("genre")
//!     .sum("revenue")
//!     .result()
//!     .await?;
//! ```

mod builder;
mod collection;
mod errors;
mod stage;

pub use builder::{describe_stages, Query};
pub use collection::DataCollection;
pub use errors::{QueryError, QueryResult};
pub use stage::Stage;
