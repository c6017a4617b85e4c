//! Observable session events
//!
//! Events are explicit and typed. Each carries the severity it is logged at.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Worker lifecycle
    /// Worker context spawned by a session
    WorkerSpawned,
    /// Worker serve loop entered
    WorkerStarted,
    /// Worker serve loop exited
    WorkerStopped,

    // Dataset
    DatasetLoadBegin,
    DatasetLoaded,
    DatasetLoadFailed,

    // Configuration
    ConfigLoaded,

    // Protocol, coordinator side
    RequestSent,
    ReplyMatched,
    ReplyError,
    RequestTimeout,
    /// Caller dropped a request before it settled
    RequestAbandoned,
    /// Reply for an id that is no longer pending
    LateReply,
    /// Inbound channel closed while requests were pending
    ChannelClosed,

    // Protocol, worker side
    RequestFailed,
    MalformedMessage,

    // Pipeline
    QueryBegin,
    QueryComplete,
    QueryFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::WorkerSpawned => "WORKER_SPAWNED",
            Event::WorkerStarted => "WORKER_STARTED",
            Event::WorkerStopped => "WORKER_STOPPED",
            Event::DatasetLoadBegin => "DATASET_LOAD_BEGIN",
            Event::DatasetLoaded => "DATASET_LOADED",
            Event::DatasetLoadFailed => "DATASET_LOAD_FAILED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::RequestSent => "REQUEST_SENT",
            Event::ReplyMatched => "REPLY_MATCHED",
            Event::ReplyError => "REPLY_ERROR",
            Event::RequestTimeout => "REQUEST_TIMEOUT",
            Event::RequestAbandoned => "REQUEST_ABANDONED",
            Event::LateReply => "LATE_REPLY",
            Event::ChannelClosed => "CHANNEL_CLOSED",
            Event::RequestFailed => "REQUEST_FAILED",
            Event::MalformedMessage => "MALFORMED_MESSAGE",
            Event::QueryBegin => "QUERY_BEGIN",
            Event::QueryComplete => "QUERY_COMPLETE",
            Event::QueryFailed => "QUERY_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RequestSent
            | Event::ReplyMatched
            | Event::RequestAbandoned
            | Event::QueryBegin
            | Event::QueryComplete => Severity::Trace,
            Event::WorkerSpawned
            | Event::WorkerStarted
            | Event::WorkerStopped
            | Event::DatasetLoadBegin
            | Event::DatasetLoaded
            | Event::ConfigLoaded => Severity::Info,
            Event::ReplyError
            | Event::RequestTimeout
            | Event::LateReply
            | Event::ChannelClosed
            | Event::RequestFailed
            | Event::MalformedMessage
            | Event::QueryFailed => Severity::Warn,
            Event::DatasetLoadFailed => Severity::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
