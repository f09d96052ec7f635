//! Process lifecycle: start the selected role and wait for a termination signal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::BuildInfo;
use crate::client::run_client;
use crate::config::{Config, Role};
use crate::error::{Error, Result};
use crate::server::run_server;

/// Runs the tunnel until SIGINT or SIGTERM.
///
/// In-flight connection pairs are not drained on shutdown.
pub async fn run(config: Config) -> Result<()> {
    tracing::info!(
        role = %config.role(),
        connect_timeout = %describe_timeout(config.connect_timeout),
        max_connections = ?config.max_connections,
        "Starting tunnel"
    );
    tracing::debug!("{}", BuildInfo::get().format());

    run_until(config, shutdown_signal()).await
}

/// Renders an optional timeout for log lines.
fn describe_timeout(timeout: Option<Duration>) -> String {
    match timeout {
        Some(limit) => humantime::format_duration(limit).to_string(),
        None => "none".to_string(),
    }
}

/// Runs the tunnel until `shutdown` resolves or the listener fails.
///
/// The role's listener loop runs as its own task. A bind failure ends that
/// task with an error, which is returned here.
pub async fn run_until<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let config = Arc::new(config);

    let mut listener_task = {
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            match config.role() {
                Role::Server => run_server(&config).await,
                Role::Client => run_client(&config).await,
            }
        })
    };

    tokio::select! {
        joined = &mut listener_task => match joined {
            Ok(result) => result,
            Err(e) => Err(Error::Io(e.into())),
        },
        _ = shutdown => {
            tracing::info!("Shutting down...");
            listener_task.abort();
            Ok(())
        }
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
