//! memconsumer: HTTP service that consumes memory on demand

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use memconsumer_core::{
    bind, drain, serve, App, AppConfig, ConnectionTracker, MemoryProbe, ServerConfig, SystemProbe,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Grace period for the runtime after draining; blocking work still running is abandoned
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format)?;

    let server_config = cli.server_config();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(server_config.workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(run(server_config, cli.app_config(), cli.max_memory));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    result
}

async fn run(server: ServerConfig, app: AppConfig, max_memory: Option<u64>) -> Result<()> {
    let probe = SystemProbe::detect(max_memory).context("failed to determine memory limit")?;
    info!(
        max_memory = probe.max_memory(),
        source = %probe.source(),
        cores = probe.available_cores(),
        "memory limit"
    );

    let app = Arc::new(App::new(app, Arc::new(probe)).context("invalid application configuration")?);
    let addr = server.socket_addr()?;
    let listener = bind(addr).with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, workers = server.workers, "listening");

    let tracker = Arc::new(ConnectionTracker::new());
    serve(listener, app, Arc::clone(&tracker), shutdown_signal()).await?;

    if drain(&tracker, server.shutdown_timeout).await {
        info!("connections drained");
    } else {
        warn!(active = tracker.count(), "shutdown timeout reached with open connections");
    }
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
