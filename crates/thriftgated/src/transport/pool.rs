//! Fixed pool of request workers fed from the listener's queue.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::debug;

use crate::connection::{ConnectionCache, Connector};

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, TransportError};

/// Streams queued per worker before the listener blocks.
const QUEUE_DEPTH_PER_WORKER: usize = 4;

/// Resources owned by one worker thread and lent to the handler for each
/// connection it serves.
pub(crate) struct WorkerContext {
    id: usize,
    connections: ConnectionCache,
}

impl WorkerContext {
    pub(crate) fn new(id: usize, connector: Arc<dyn Connector>) -> Self {
        Self {
            id,
            connections: ConnectionCache::new(connector),
        }
    }

    pub(crate) const fn id(&self) -> usize {
        self.id
    }

    pub(crate) const fn connections(&mut self) -> &mut ConnectionCache {
        &mut self.connections
    }
}

/// Running worker threads.
pub(crate) struct WorkerPool {
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` workers and returns the sender that feeds them. The
    /// workers exit once every sender is dropped and the queue is empty.
    pub(crate) fn start(
        count: usize,
        handler: Arc<dyn ConnectionHandler>,
        connector: Arc<dyn Connector>,
    ) -> Result<(Self, Sender<ConnectionStream>), TransportError> {
        let (sender, receiver) = bounded(count.saturating_mul(QUEUE_DEPTH_PER_WORKER));
        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let context = WorkerContext::new(id, Arc::clone(&connector));
            let queue = receiver.clone();
            let worker_handler = Arc::clone(&handler);
            let worker = thread::Builder::new()
                .name(format!("thriftgate-worker-{id}"))
                .spawn(move || run_worker(context, &queue, worker_handler.as_ref()))
                .map_err(|source| TransportError::Spawn {
                    role: "worker",
                    source,
                })?;
            workers.push(worker);
        }
        Ok((Self { workers }, sender))
    }

    /// Number of workers started.
    pub(crate) fn len(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every worker to finish its queue.
    pub(crate) fn join(self) -> Result<(), TransportError> {
        let count = self
            .workers
            .into_iter()
            .map(thread::JoinHandle::join)
            .filter(Result::is_err)
            .count();
        if count == 0 {
            Ok(())
        } else {
            Err(TransportError::WorkerPanic { count })
        }
    }
}

fn run_worker(
    mut context: WorkerContext,
    queue: &Receiver<ConnectionStream>,
    handler: &dyn ConnectionHandler,
) {
    debug!(target: LISTENER_TARGET, worker = context.id(), "worker started");
    for stream in queue {
        handler.handle(stream, &mut context);
    }
    let closed = context.connections().close_all();
    debug!(target: LISTENER_TARGET, worker = context.id(), closed, "worker stopped");
}
