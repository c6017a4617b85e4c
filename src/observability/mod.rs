//! Observability subsystem
//!
//! - Structured JSON logging with a process-wide severity threshold
//! - Typed session events
//! - Protocol counters
//!
//! Observability never changes execution: a failed write is dropped.
//!
//! ```ignore
//! use aeroquery::observability::{log_event, Event};
//!
//! log_event(Event::DatasetLoaded, &[("records", "42")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{enabled, min_severity, set_min_severity, Logger, Severity};
pub use metrics::{MetricsSnapshot, ProtocolMetrics};

/// Logs an event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_does_not_panic() {
        log_event(Event::WorkerStarted, &[]);
        log_event(Event::LateReply, &[("mid", "abc")]);
    }
}
