use std::path::Path;

use anyhow::Context;
use clap::Parser;
use s3vol::VolumeDriver;
use s3vol_plugin::{Cli, router};
use tokio::net::UnixListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = s3vol::util::init_logging(cli.debug, cli.log_dir.as_deref())
        .context("failed to initialize logging")?;

    if let Err(e) = run(cli).await {
        tracing::error!(error = %format!("{e:#}"), "Plugin exited with error");
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let driver = VolumeDriver::open(cli.driver_options()).context("failed to create the driver")?;
    let listener = bind(&cli.socket)?;

    tracing::info!(socket = %cli.socket.display(), "Serving s3fs volume plugin");
    axum::serve(listener, router(driver))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("plugin server failed")?;

    if let Err(e) = std::fs::remove_file(&cli.socket) {
        tracing::warn!(socket = %cli.socket.display(), error = %e, "Failed to remove socket");
    }
    tracing::info!("Plugin stopped");
    Ok(())
}

/// Bind the plugin socket, replacing a stale one left by a previous run.
fn bind(socket: &Path) -> anyhow::Result<UnixListener> {
    if let Some(parent) = socket.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create socket directory {}", parent.display()))?;
    }

    match std::fs::remove_file(socket) {
        Ok(()) => tracing::debug!(socket = %socket.display(), "Removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("failed to remove stale socket {}", socket.display()));
        }
    }

    UnixListener::bind(socket).with_context(|| format!("failed to bind {}", socket.display()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
