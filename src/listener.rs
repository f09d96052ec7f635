//! Accept loop shared by both roles.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::dial::Dialer;
use crate::error::{Error, Result};
use crate::relay::handle_connection;

/// Source of accepted TCP connections.
pub trait Acceptor: Send {
    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// Binds the role's listening socket. Failure here is fatal for the process.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ListenFailed(format!("{}: {}", addr, e)))
}

/// Builds the admission limiter for `--max-connections`.
pub fn connection_limiter(max_connections: Option<usize>) -> Option<Arc<Semaphore>> {
    max_connections.map(|n| Arc::new(Semaphore::new(n)))
}

/// Accepts connections forever, relaying each one to the dialer's target.
///
/// Accept errors are logged and the loop continues without backoff. With a
/// limiter, a permit is taken before each accept and held by the pair until
/// it closes.
pub async fn serve<A: Acceptor>(
    mut acceptor: A,
    dialer: Arc<Dialer>,
    limiter: Option<Arc<Semaphore>>,
) {
    loop {
        let permit = match &limiter {
            Some(semaphore) => match Arc::clone(semaphore).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!("connection limiter closed, stopping accept loop");
                    return;
                }
            },
            None => None,
        };

        let (stream, peer) = match acceptor.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!("Error accepting connection: {}", e);
                continue;
            }
        };

        tracing::info!("New connection from {}", peer);

        let dialer = Arc::clone(&dialer);
        tokio::spawn(async move {
            let _ = handle_connection(stream, peer, &dialer).await;
            drop(permit);
        });
    }
}
