//! Coordinator/worker protocol
//!
//! Requests and replies travel as JSON frames over a pair of channels.
//! [`Correlator`] pairs each reply with the request that carried the same
//! message id, or rejects the request when its timeout fires first.

mod correlator;
mod message;

pub use correlator::Correlator;
pub use message::{
    codes, AttrParams, BetweenParams, Envelope, EqualsParams, IntersectParams, KeyParams,
    LoadParams, MatchingParams, MessageId, Operation, RangeParams, Reply, Request, SortParams,
    UnionParams, ERROR_KIND,
};
