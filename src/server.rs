//! Server role: terminates tunnel connections and forwards them to the backend.

use std::sync::Arc;

use crate::config::Config;
use crate::dial::Dialer;
use crate::error::Result;
use crate::listener::{bind, connection_limiter, serve};

/// Runs the tunnel server until the process exits.
///
/// Returns only when the listening socket cannot be bound.
pub async fn run_server(config: &Config) -> Result<()> {
    let dialer = Arc::new(Dialer::new(&config.remote_addr, config.connect_timeout)?);
    let listen_addr = config.listen_address()?;

    let listener = bind(listen_addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!("Server started on {}", local_addr);
    tracing::info!(backend = %config.remote_addr, "forwarding tunnel connections");

    serve(listener, dialer, connection_limiter(config.max_connections)).await;

    Ok(())
}
