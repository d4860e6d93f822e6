//! Turns one queued request into one daemon call and one terminal queue action

mod request;

use std::sync::Arc;

use relay_queue::{Delivery, WorkQueue};
use tracing::{error, info, warn};

pub use request::{RandomOutputsRequest, RelayRequest};

use crate::daemon::{DaemonError, DaemonRpc, RpcResult};
use crate::worker::WorkerId;

/// How a delivery was finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Replied to and acknowledged; `status_ok` is false for soft failures
    Acked { status_ok: bool },
    /// Returned to the queue for redelivery
    Nacked,
}

/// Relays classified requests to the daemon on behalf of one worker
pub struct Dispatcher {
    worker_id: WorkerId,
    daemon: Arc<dyn DaemonRpc>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(worker_id: WorkerId, daemon: Arc<dyn DaemonRpc>) -> Self {
        Self { worker_id, daemon }
    }

    /// Handles one delivery end to end
    ///
    /// Exactly one of reply+ack or nack is issued. Daemon soft failures are
    /// still replied and acknowledged; transport failures and unrecognized
    /// payloads are nacked. Queue errors are logged and never propagated,
    /// a broken connection surfaces on the worker's next receive.
    pub async fn dispatch<Q>(&self, queue: &Q, delivery: &Delivery) -> Disposition
    where
        Q: WorkQueue + ?Sized,
    {
        let request = RelayRequest::classify(&delivery.payload);

        let result = match &request {
            RelayRequest::RawTransaction {
                raw_transaction, ..
            } => self.daemon.send_raw_transaction(raw_transaction).await,
            RelayRequest::BlockBlob(block_blob) => self.daemon.submit_block(block_blob).await,
            RelayRequest::BlockTemplate {
                wallet_address,
                reserve_size,
            } => {
                self.daemon
                    .block_template(wallet_address, *reserve_size)
                    .await
            }
            RelayRequest::RandomOutputs(outputs) => {
                self.daemon
                    .random_outputs(&outputs.amounts, outputs.mixin)
                    .await
            }
            RelayRequest::Unrecognized => {
                warn!(
                    worker_id = %self.worker_id,
                    daemon = %self.daemon.endpoint(),
                    message_id = %delivery.message_id,
                    "Worker {} rejected unrecognized request",
                    self.worker_id
                );
                return self.nack(queue, delivery).await;
            }
        };

        match result {
            Ok(result) => self.reply_and_ack(queue, delivery, &request, &result).await,
            Err(e) => {
                self.log_daemon_failure(&request, &e);
                self.nack(queue, delivery).await
            }
        }
    }

    async fn reply_and_ack<Q>(
        &self,
        queue: &Q,
        delivery: &Delivery,
        request: &RelayRequest,
        result: &RpcResult,
    ) -> Disposition
    where
        Q: WorkQueue + ?Sized,
    {
        if let Err(e) = queue.reply(delivery, result.as_value()).await {
            error!(
                worker_id = %self.worker_id,
                daemon = %self.daemon.endpoint(),
                operation = request.operation(),
                subject = %request.subject(),
                error = %e,
                "Worker {} failed to reply, returning request to queue",
                self.worker_id
            );
            return self.nack(queue, delivery).await;
        }

        self.log_relayed(request, result);

        if let Err(e) = queue.ack(delivery).await {
            // The broker redelivers once the visibility timeout lapses
            error!(
                worker_id = %self.worker_id,
                daemon = %self.daemon.endpoint(),
                operation = request.operation(),
                subject = %request.subject(),
                message_id = %delivery.message_id,
                error = %e,
                "Worker {} failed to acknowledge message",
                self.worker_id
            );
        }

        Disposition::Acked {
            status_ok: result.is_ok(),
        }
    }

    async fn nack<Q>(&self, queue: &Q, delivery: &Delivery) -> Disposition
    where
        Q: WorkQueue + ?Sized,
    {
        if let Err(e) = queue.nack(delivery).await {
            error!(
                worker_id = %self.worker_id,
                daemon = %self.daemon.endpoint(),
                message_id = %delivery.message_id,
                error = %e,
                "Worker {} failed to return message to queue",
                self.worker_id
            );
        }

        Disposition::Nacked
    }

    fn log_relayed(&self, request: &RelayRequest, result: &RpcResult) {
        let daemon = self.daemon.endpoint();

        if result.is_ok() {
            info!(
                worker_id = %self.worker_id,
                daemon = %daemon,
                operation = request.operation(),
                subject = %request.subject(),
                status = result.status(),
                "Worker {} relayed {} via {}",
                self.worker_id,
                request.operation(),
                daemon
            );
        } else {
            warn!(
                worker_id = %self.worker_id,
                daemon = %daemon,
                operation = request.operation(),
                subject = %request.subject(),
                status = result.status(),
                error = %result.error().unwrap_or_default(),
                "Worker {} relayed {} via {} without success",
                self.worker_id,
                request.operation(),
                daemon
            );
        }
    }

    fn log_daemon_failure(&self, request: &RelayRequest, e: &DaemonError) {
        let daemon = self.daemon.endpoint();

        error!(
            worker_id = %self.worker_id,
            daemon = %daemon,
            operation = request.operation(),
            subject = %request.subject(),
            error = %e,
            "Worker {} failed to relay {} via {}",
            self.worker_id,
            request.operation(),
            daemon
        );
    }
}
