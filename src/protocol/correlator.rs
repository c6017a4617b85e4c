//! Request/reply correlation
//!
//! Turns one-way frame sends into awaitable calls. Each request registers a
//! one-shot waiter under its message id; a router task completes waiters as
//! replies arrive, in any order.
//!
//! # Invariants
//!
//! - A pending entry is retired exactly once, by whichever of the router,
//!   the timeout, or the dropped request future removes it from the map first
//! - A reply whose id is no longer pending is dropped and counted
//! - No retries

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::observability::{log_event, Event, Logger, ProtocolMetrics};
use crate::query::{QueryError, QueryResult};
use crate::record::Data;

use super::message::{Operation, Reply, Request};

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Reply>>>>;

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<String, oneshot::Sender<Reply>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coordinator side of the protocol for one worker
pub struct Correlator {
    outbound: mpsc::UnboundedSender<String>,
    pending: Pending,
    metrics: Arc<ProtocolMetrics>,
    timeout: Duration,
}

impl Correlator {
    /// Starts the reply router. Must be called from within a tokio runtime.
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
        timeout: Duration,
    ) -> Self {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let metrics = Arc::new(ProtocolMetrics::new());
        tokio::spawn(route(inbound, pending.clone(), metrics.clone()));

        Self {
            outbound,
            pending,
            metrics,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn metrics(&self) -> Arc<ProtocolMetrics> {
        self.metrics.clone()
    }

    /// Requests still waiting for a reply
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Sends with the default timeout
    pub async fn send(&self, operation: Operation, operand: Option<Data>) -> QueryResult<Data> {
        self.send_with_timeout(operation, operand, self.timeout).await
    }

    pub async fn send_with_timeout(
        &self,
        operation: Operation,
        operand: Option<Data>,
        timeout: Duration,
    ) -> QueryResult<Data> {
        let request = Request::new(operation, operand);
        let frame = request
            .to_frame()
            .map_err(|e| QueryError::Protocol(e.to_string()))?;
        let mid = request.mid.as_str().to_string();
        let kind = request.operation.kind();

        let (tx, mut rx) = oneshot::channel();
        lock(&self.pending).insert(mid.clone(), tx);

        if self.outbound.send(frame).is_err() {
            lock(&self.pending).remove(&mid);
            return Err(QueryError::ChannelClosed);
        }
        self.metrics.increment_requests_sent();
        log_event(Event::RequestSent, &[("mid", &mid), ("type", kind)]);

        // Retires the entry if this future is dropped before it settles
        let _retire = Retire {
            pending: &self.pending,
            metrics: &self.metrics,
            mid: mid.clone(),
        };

        let reply = match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(self.closed()),
            Err(_) => {
                let claimed = lock(&self.pending).remove(&mid).is_some();
                if claimed {
                    self.metrics.increment_timeouts();
                    log_event(
                        Event::RequestTimeout,
                        &[
                            ("after_ms", &timeout.as_millis().to_string()),
                            ("mid", &mid),
                            ("type", kind),
                        ],
                    );
                    return Err(QueryError::Timeout { mid, after: timeout });
                }
                // The router removed the entry first; its reply is on the oneshot.
                match rx.await {
                    Ok(reply) => reply,
                    Err(_) => return Err(self.closed()),
                }
            }
        };

        self.settle(reply)
    }

    fn closed(&self) -> QueryError {
        self.metrics.increment_channel_closed();
        QueryError::ChannelClosed
    }

    fn settle(&self, reply: Reply) -> QueryResult<Data> {
        if reply.is_error() {
            self.metrics.increment_error_replies();
            log_event(
                Event::ReplyError,
                &[
                    ("code", reply.code.as_deref().unwrap_or_default()),
                    ("mid", &reply.mid),
                ],
            );
            return Err(QueryError::from_reply(reply));
        }

        log_event(Event::ReplyMatched, &[("mid", &reply.mid), ("type", &reply.kind)]);
        reply
            .data
            .ok_or_else(|| QueryError::Protocol(format!("reply {} carries no data", reply.mid)))
    }
}

/// Removes a pending entry nobody will wait for anymore.
///
/// Every settled path has already removed its entry, so this only acts when
/// the caller dropped the request future mid-flight.
struct Retire<'a> {
    pending: &'a Pending,
    metrics: &'a ProtocolMetrics,
    mid: String,
}

impl Drop for Retire<'_> {
    fn drop(&mut self) {
        let abandoned = lock(self.pending).remove(&self.mid).is_some();
        if abandoned {
            self.metrics.increment_abandoned();
            log_event(Event::RequestAbandoned, &[("mid", &self.mid)]);
        }
    }
}

/// Completes waiters until the worker hangs up
async fn route(
    mut inbound: mpsc::UnboundedReceiver<String>,
    pending: Pending,
    metrics: Arc<ProtocolMetrics>,
) {
    while let Some(frame) = inbound.recv().await {
        let reply = match Reply::parse(&frame) {
            Ok(reply) => reply,
            Err(e) => {
                Logger::warn("UNPARSABLE_REPLY", &[("reason", &e.to_string())]);
                continue;
            }
        };

        let waiter = lock(&pending).remove(&reply.mid);
        match waiter {
            Some(tx) => {
                metrics.increment_replies_matched();
                let _ = tx.send(reply);
            }
            None => {
                metrics.increment_late_replies();
                log_event(Event::LateReply, &[("mid", &reply.mid), ("type", &reply.kind)]);
            }
        }
    }

    let abandoned = {
        let mut waiters = lock(&pending);
        let count = waiters.len();
        waiters.clear();
        count
    };
    if abandoned > 0 {
        log_event(Event::ChannelClosed, &[("pending", &abandoned.to_string())]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{codes, AttrParams, Envelope};
    use crate::record::Value;
    use serde_json::json;

    struct FakeWorker {
        requests: mpsc::UnboundedReceiver<String>,
        replies: mpsc::UnboundedSender<String>,
    }

    fn connect(timeout: Duration) -> (Correlator, FakeWorker) {
        let (to_worker, requests) = mpsc::unbounded_channel();
        let (replies, from_worker) = mpsc::unbounded_channel();
        let correlator = Correlator::new(to_worker, from_worker, timeout);
        (correlator, FakeWorker { requests, replies })
    }

    fn sum(attr: &str) -> Operation {
        Operation::Sum(AttrParams { attr: attr.to_string() })
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_reply_resolves_request() {
        let (correlator, mut worker) = connect(Duration::from_secs(5));

        let responder = tokio::spawn(async move {
            let frame = worker.requests.recv().await.unwrap();
            let envelope = Envelope::parse(&frame).unwrap();
            let reply = Reply::success(envelope.kind, envelope.mid, Data::Scalar(Value::from(42)));
            worker.replies.send(reply.to_frame().unwrap()).unwrap();
            worker
        });

        let data = correlator.send(sum("rating"), None).await.unwrap();
        assert_eq!(data, Data::Scalar(Value::Number(42.0)));
        assert_eq!(correlator.pending_count(), 0);
        let _worker = responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_replies_match_by_id() {
        let (correlator, mut worker) = connect(Duration::from_secs(5));

        let responder = tokio::spawn(async move {
            let first = Envelope::parse(&worker.requests.recv().await.unwrap()).unwrap();
            let second = Envelope::parse(&worker.requests.recv().await.unwrap()).unwrap();
            for envelope in [second, first] {
                let attr = envelope.params["attr"].as_str().unwrap().to_string();
                let reply = Reply::success(envelope.kind, envelope.mid, Data::Scalar(Value::from(attr)));
                worker.replies.send(reply.to_frame().unwrap()).unwrap();
            }
            worker
        });

        let (a, b) = tokio::join!(correlator.send(sum("a"), None), correlator.send(sum("b"), None));
        assert_eq!(a.unwrap(), Data::Scalar(Value::from("a")));
        assert_eq!(b.unwrap(), Data::Scalar(Value::from("b")));
        let _worker = responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_then_late_reply_is_ignored() {
        let (correlator, mut worker) = connect(Duration::from_millis(1));

        let err = correlator.send(sum("rating"), None).await.unwrap_err();
        let mid = match err {
            QueryError::Timeout { mid, after } => {
                assert_eq!(after, Duration::from_millis(1));
                mid
            }
            other => panic!("unexpected error: {}", other),
        };
        assert_eq!(correlator.pending_count(), 0);

        let frame = worker.requests.recv().await.unwrap();
        assert_eq!(Envelope::parse(&frame).unwrap().mid, mid);

        let late = Reply::success("sum", mid, Data::Scalar(Value::from(1)));
        worker.replies.send(late.to_frame().unwrap()).unwrap();

        let metrics = correlator.metrics();
        wait_for(|| metrics.late_replies() == 1).await;
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.timeouts, 1);
        assert_eq!(snapshot.replies_matched, 0);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_reply_rejects() {
        let (correlator, mut worker) = connect(Duration::from_secs(5));

        let responder = tokio::spawn(async move {
            let envelope = Envelope::parse(&worker.requests.recv().await.unwrap()).unwrap();
            let reply = Reply::failure(
                envelope.mid,
                codes::UNKNOWN_OPERATION,
                "unknown type sum",
                json!({"type": "sum"}),
            );
            worker.replies.send(reply.to_frame().unwrap()).unwrap();
            worker
        });

        let err = correlator.send(sum("rating"), None).await.unwrap_err();
        assert!(matches!(err, QueryError::UnknownOperation { .. }));
        assert_eq!(correlator.metrics().snapshot().error_replies, 1);
        let _worker = responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_gone_before_send() {
        let (correlator, worker) = connect(Duration::from_secs(5));
        drop(worker);

        let err = correlator.send(sum("rating"), None).await.unwrap_err();
        assert!(matches!(err, QueryError::ChannelClosed));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_worker_hangs_up_while_pending() {
        let (correlator, mut worker) = connect(Duration::from_secs(5));

        let responder = tokio::spawn(async move {
            let _frame = worker.requests.recv().await.unwrap();
            drop(worker.replies);
            worker.requests
        });

        let err = correlator.send(sum("rating"), None).await.unwrap_err();
        assert!(matches!(err, QueryError::ChannelClosed));
        let _requests = responder.await.unwrap();

        let snapshot = correlator.metrics().snapshot();
        assert_eq!(snapshot.channel_closed, 1);
        assert_eq!(snapshot.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_dropped_request_is_retired() {
        let (correlator, mut worker) = connect(Duration::from_secs(3600));

        for _ in 0..3 {
            let outer = tokio::time::timeout(Duration::from_millis(5), correlator.send(sum("rating"), None));
            assert!(outer.await.is_err());
        }
        assert_eq!(correlator.pending_count(), 0);

        let snapshot = correlator.metrics().snapshot();
        assert_eq!(snapshot.abandoned, 3);
        assert_eq!(snapshot.timeouts, 0);
        assert_eq!(snapshot.in_flight(), 0);

        // A reply that shows up afterwards is just late
        let envelope = Envelope::parse(&worker.requests.recv().await.unwrap()).unwrap();
        let late = Reply::success(envelope.kind, envelope.mid, Data::Scalar(Value::from(1)));
        worker.replies.send(late.to_frame().unwrap()).unwrap();
        let metrics = correlator.metrics();
        wait_for(|| metrics.late_replies() == 1).await;
    }
}
