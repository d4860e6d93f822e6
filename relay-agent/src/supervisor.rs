//! Self-healing worker pool
//!
//! The supervisor keeps `pool_size` workers alive. Whenever one exits, for
//! whatever reason, it is logged and a fresh worker takes its place straight
//! away. There is no backoff and no restart limit.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::types::WorkerError;
use crate::worker::WorkerId;

/// Boxed future of a running worker
pub type WorkerFuture = Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send>>;

/// Builds and starts workers on behalf of the supervisor
///
/// Each call must produce a brand new worker; the supervisor never restarts
/// one in place. The token is cancelled when the supervisor shuts down.
pub trait WorkerLauncher: Send + Sync + 'static {
    fn launch(&self, id: WorkerId, shutdown: CancellationToken) -> WorkerFuture;
}

impl<F, Fut> WorkerLauncher for F
where
    F: Fn(WorkerId, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    fn launch(&self, id: WorkerId, shutdown: CancellationToken) -> WorkerFuture {
        Box::pin(self(id, shutdown))
    }
}

/// Counters reported when the supervisor stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Workers launched, initial ones included
    pub launched: usize,
    /// Workers launched to replace one that exited
    pub restarts: usize,
}

pub struct Supervisor<L> {
    launcher: L,
    pool_size: usize,
    shutdown: CancellationToken,
    workers: JoinSet<(WorkerId, Result<(), WorkerError>)>,
    next_id: usize,
    report: SupervisorReport,
}

impl<L: WorkerLauncher> Supervisor<L> {
    /// Creates a supervisor keeping `pool_size` workers alive, at least one
    #[must_use]
    pub fn new(launcher: L, pool_size: usize, shutdown: CancellationToken) -> Self {
        Self {
            launcher,
            pool_size: pool_size.max(1),
            shutdown,
            workers: JoinSet::new(),
            next_id: 1,
            report: SupervisorReport::default(),
        }
    }

    /// Launches one fresh worker
    fn spawn_worker(&mut self) {
        let id = WorkerId(self.next_id);
        self.next_id += 1;
        self.report.launched += 1;

        // Panics are turned into an exit like any other so the worker is replaced
        let worker = AssertUnwindSafe(self.launcher.launch(id, self.shutdown.child_token()))
            .catch_unwind()
            .map(move |outcome| {
                let result = outcome.unwrap_or_else(|panic| {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(ToString::to_string)
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    Err(WorkerError::Panicked(reason))
                });
                (id, result)
            });

        self.workers.spawn(worker);
    }

    /// Launches the initial pool
    pub fn start(&mut self) {
        info!("Starting relay agent with {} worker(s)", self.pool_size);
        for _ in 0..self.pool_size {
            self.spawn_worker();
        }
    }

    /// Supervises the pool until the shutdown token is cancelled
    ///
    /// Every worker exit is logged at error level and answered with exactly
    /// one replacement. Calls [`Self::start`] if it has not run yet.
    pub async fn run(mut self) -> SupervisorReport {
        if self.report.launched == 0 {
            self.start();
        }

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    info!("Supervisor shutting down, stopping workers");
                    self.workers.shutdown().await;
                    break;
                }
                Some(exit) = self.workers.join_next() => {
                    match exit {
                        Ok((id, Ok(()))) => {
                            error!(worker_id = %id, "Worker {} died", id);
                        }
                        Ok((id, Err(e))) => {
                            error!(worker_id = %id, error = %e, "Worker {} died", id);
                        }
                        Err(e) => {
                            error!(error = %e, "Worker task died");
                        }
                    }

                    if self.shutdown.is_cancelled() {
                        continue;
                    }

                    self.report.restarts += 1;
                    self.spawn_worker();
                }
            }
        }

        info!(
            launched = self.report.launched,
            restarts = self.report.restarts,
            "Supervisor stopped"
        );
        self.report
    }
}
