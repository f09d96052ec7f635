//! Client role: accepts local application connections and forwards them to the tunnel server.

use std::sync::Arc;

use crate::config::Config;
use crate::dial::Dialer;
use crate::error::Result;
use crate::listener::{bind, connection_limiter, serve};

/// Runs the tunnel client until the process exits.
///
/// `remote_addr` is only reported here; the client always dials `server_addr`.
pub async fn run_client(config: &Config) -> Result<()> {
    let dialer = Arc::new(
        Dialer::new(&config.server_addr, config.connect_timeout)?.with_description("tunnel server"),
    );
    let listen_addr = config.listen_address()?;

    let listener = bind(listen_addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!("Client started on {}", local_addr);
    tracing::info!(
        "Traffic to {} is being tunneled through server {}",
        config.remote_addr,
        config.server_addr
    );

    serve(listener, dialer, connection_limiter(config.max_connections)).await;

    Ok(())
}
