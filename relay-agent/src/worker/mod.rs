use std::fmt;

use relay_queue::{QueueEvent, WorkQueue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::dispatcher::Dispatcher;
use crate::types::WorkerError;

/// Identity of a worker, unique for the lifetime of the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a worker, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Connecting,
    Subscribing,
    Ready,
    Terminating,
}

/// Queue settings a worker subscribes with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Name of the work queue
    pub queue_name: String,
    /// Maximum unacknowledged messages held by this worker
    pub prefetch: u16,
}

/// One consumer: a queue session feeding a dispatcher
///
/// A worker never reconnects. Any connection problem ends it with an error
/// and the supervisor starts a fresh one.
pub struct Worker<Q> {
    id: WorkerId,
    queue: Q,
    dispatcher: Dispatcher,
    config: WorkerConfig,
    state: WorkerState,
}

impl<Q: WorkQueue> Worker<Q> {
    #[must_use]
    pub fn new(id: WorkerId, queue: Q, dispatcher: Dispatcher, config: WorkerConfig) -> Self {
        Self {
            id,
            queue,
            dispatcher,
            config,
            state: WorkerState::Connecting,
        }
    }

    fn transition(&mut self, state: WorkerState) {
        debug!(worker_id = %self.id, from = ?self.state, to = ?state, "Worker state change");
        self.state = state;
    }

    /// Runs the worker until the broker disconnects or `shutdown` fires
    ///
    /// Shutdown is only observed between messages, a delivery being
    /// dispatched is always finished.
    ///
    /// # Errors
    ///
    /// Returns an error when connecting or subscribing fails, or when the
    /// broker connection drops.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        if let Err(e) = self.queue.connect().await {
            error!(worker_id = %self.id, "Error in worker {}: {}", self.id, e);
            return Err(WorkerError::Connect(e));
        }

        self.transition(WorkerState::Subscribing);
        if let Err(e) = self.subscribe().await {
            error!(worker_id = %self.id, "Error in worker {}: {}", self.id, e);
            return Err(e);
        }

        self.transition(WorkerState::Ready);
        info!(
            worker_id = %self.id,
            queue = %self.config.queue_name,
            "Worker {} awaiting requests",
            self.id
        );

        loop {
            let event = tokio::select! {
                () = shutdown.cancelled() => {
                    info!(worker_id = %self.id, "Worker {} received shutdown signal", self.id);
                    return Ok(());
                }
                event = self.queue.next_event() => event,
            };

            match event {
                QueueEvent::Message(delivery) => {
                    self.dispatcher.dispatch(&self.queue, &delivery).await;
                }
                QueueEvent::Disconnected(e) => {
                    self.transition(WorkerState::Terminating);
                    error!(
                        worker_id = %self.id,
                        "Worker {} lost connection to queue server: {}",
                        self.id,
                        e
                    );
                    return Err(WorkerError::Disconnected(e));
                }
            }
        }
    }

    async fn subscribe(&mut self) -> Result<(), WorkerError> {
        let queue_name = self.config.queue_name.clone();
        let subscribe_error = |source| WorkerError::Subscribe {
            queue: queue_name.clone(),
            source,
        };

        self.queue
            .create_queue(&self.config.queue_name, true)
            .await
            .map_err(subscribe_error)?;
        self.queue
            .register_consumer(&self.config.queue_name, self.config.prefetch)
            .await
            .map_err(subscribe_error)?;

        Ok(())
    }
}
