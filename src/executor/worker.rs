//! Worker context
//!
//! The executor runs behind two unbounded channels of JSON frames. Nothing
//! else is shared with the coordinator.

use std::io;
use std::thread;

use tokio::runtime::{Builder, Handle};
use tokio::sync::mpsc;

use crate::config::WorkerLocation;
use crate::observability::{log_event, Event, Logger};

use super::executor::Executor;

/// Coordinator's ends of the worker channels
pub struct WorkerChannels {
    /// Frames to the worker
    pub outbound: mpsc::UnboundedSender<String>,
    /// Frames from the worker
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Starts `executor` in a new worker context.
///
/// The worker stops when `outbound` is dropped.
pub fn spawn_worker(location: WorkerLocation, executor: Executor) -> io::Result<WorkerChannels> {
    let (to_worker, worker_inbox) = mpsc::unbounded_channel();
    let (worker_outbox, from_worker) = mpsc::unbounded_channel();

    match location {
        WorkerLocation::Task => {
            let handle = Handle::try_current()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            handle.spawn(executor.serve(worker_inbox, worker_outbox));
        }
        WorkerLocation::Thread => {
            thread::Builder::new()
                .name("aeroquery-worker".to_string())
                .spawn(move || {
                    let runtime = match Builder::new_current_thread().enable_all().build() {
                        Ok(runtime) => runtime,
                        Err(e) => {
                            Logger::error("WORKER_RUNTIME_FAILED", &[("reason", &e.to_string())]);
                            return;
                        }
                    };
                    runtime.block_on(executor.serve(worker_inbox, worker_outbox));
                })?;
        }
    }

    log_event(Event::WorkerSpawned, &[("location", location.as_str())]);
    Ok(WorkerChannels {
        outbound: to_worker,
        inbound: from_worker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticLoader;
    use crate::protocol::{Operation, Reply, Request};
    use crate::record::{Data, Record, Value};
    use std::sync::Arc;

    fn executor() -> Executor {
        let records = vec![Record::new().with("id", 1), Record::new().with("id", 2)];
        Executor::with_dataset(Arc::new(StaticLoader::new(vec![])), records)
    }

    async fn roundtrip(location: WorkerLocation) -> Reply {
        let mut channels = spawn_worker(location, executor()).unwrap();
        let request = Request::new(
            Operation::Sum(crate::protocol::AttrParams { attr: "id".to_string() }),
            None,
        );
        channels.outbound.send(request.to_frame().unwrap()).unwrap();
        Reply::parse(&channels.inbound.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_task_worker_replies() {
        let reply = roundtrip(WorkerLocation::Task).await;
        assert_eq!(reply.data, Some(Data::Scalar(Value::Number(3.0))));
    }

    #[tokio::test]
    async fn test_thread_worker_replies() {
        let reply = roundtrip(WorkerLocation::Thread).await;
        assert_eq!(reply.data, Some(Data::Scalar(Value::Number(3.0))));
    }

    #[test]
    fn test_task_worker_needs_runtime() {
        assert!(spawn_worker(WorkerLocation::Task, executor()).is_err());
    }
}
