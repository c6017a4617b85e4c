//! Executor subsystem
//!
//! The worker side of a session: holds the dataset, answers one request per
//! frame, and owns the operation set.
//!
//! # Execution flow (strict order)
//!
//! 1. Parse the frame into kind, id, operand and raw parameters
//! 2. Resolve the operand (explicit `use`, else the held dataset)
//! 3. Dispatch on the kind through the handler table
//! 4. Per-partition operations recurse into partition maps
//! 5. Reply with the same kind and id, or an error reply
//!
//! # Invariants
//!
//! - The held dataset is only replaced by `load`
//! - Operations work on copies; the held order never changes
//! - Exactly one reply per frame

mod aggregate;
mod errors;
mod executor;
mod filters;
mod grouping;
mod sets;
mod sorter;
mod worker;

pub use aggregate::{average, sum};
pub use errors::{ExecutorError, ExecutorResult};
pub use executor::Executor;
pub use filters::PredicateFilter;
pub use grouping::{group_by, per_partition};
pub use sets::{complement, intersect, union, IDENTITY_ATTR};
pub use sorter::{ResultSorter, SortDirection, SortKey};
pub use worker::{spawn_worker, WorkerChannels};
