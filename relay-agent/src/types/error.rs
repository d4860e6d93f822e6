use relay_queue::QueueError;
use thiserror::Error;

/// Reasons a worker stops
///
/// Every variant ends the worker; recovery belongs to the supervisor.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The queue session could not be opened
    #[error("failed to connect to queue server: {0}")]
    Connect(#[source] QueueError),

    /// The work queue could not be declared or consumed
    #[error("failed to subscribe to queue {queue}: {source}")]
    Subscribe {
        /// Queue the worker tried to consume
        queue: String,
        /// Underlying broker error
        #[source]
        source: QueueError,
    },

    /// The broker connection dropped while ready
    #[error("lost connection to queue server: {0}")]
    Disconnected(#[source] QueueError),

    /// The worker task panicked
    #[error("worker panicked: {0}")]
    Panicked(String),
}
