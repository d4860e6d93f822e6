use std::sync::Arc;

use relay_agent::daemon::{DaemonClient, DaemonEndpoint, DaemonRpc};
use relay_agent::dispatcher::Dispatcher;
use relay_agent::supervisor::Supervisor;
use relay_agent::types::Environment;
use relay_agent::worker::{Worker, WorkerConfig, WorkerId};
use relay_queue::SqsWorkQueue;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(env: Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if env.json_logs() {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env = Environment::from_env();
    init_tracing(env);

    if !env.is_production() {
        warn!(
            "Relay agent is running in {} mode. Consider running in production mode: export APP_ENV=production",
            env
        );
    }

    info!("Starting Blockchain Relay Agent in {} environment", env);

    // One daemon client shared by every worker
    let endpoint = DaemonEndpoint::new(env.daemon_host(), env.daemon_port());
    let daemon: Arc<dyn DaemonRpc> = Arc::new(DaemonClient::new(endpoint, env.daemon_timeout())?);
    info!("Relaying to daemon at {}", daemon.endpoint());

    let broker = env.broker_settings();
    let worker_config = WorkerConfig {
        queue_name: env.relay_queue_name(),
        prefetch: env.prefetch(),
    };

    let launcher = move |id: WorkerId, shutdown: CancellationToken| {
        let queue = SqsWorkQueue::new(broker.clone());
        let dispatcher = Dispatcher::new(id, Arc::clone(&daemon));
        Worker::new(id, queue, dispatcher, worker_config.clone()).run(shutdown)
    };

    let shutdown_token = CancellationToken::new();
    let signal_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                signal_shutdown.cancel();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });

    let report = Supervisor::new(launcher, env.num_workers(), shutdown_token)
        .run()
        .await;

    info!(
        "Blockchain Relay Agent stopped after {} worker launches",
        report.launched
    );
    Ok(())
}
