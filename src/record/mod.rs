//! Record model for aeroquery
//!
//! - `Value`: typed attribute value (null, bool, number, string, date, list, object)
//! - `Record`: attribute name to value, attributes not declared up front
//! - `Data`: what a pipeline stage consumes and produces (collection,
//!   partition map, single record, or scalar)

mod data;
mod record;
mod value;

pub use data::{Data, DataKind};
pub use record::Record;
pub use value::{Timestamp, Value};
