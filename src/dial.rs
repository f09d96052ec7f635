//! Outbound connector used once per accepted connection.

use crate::common::{split_host_port, DnsResolver};
use crate::error::{Error, Result};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Dials a fixed `HOST:PORT` target.
///
/// The host is resolved on every dial so DNS changes are picked up without
/// a restart.
pub struct Dialer {
    target: String,
    host: String,
    port: u16,
    description: &'static str,
    connect_timeout: Option<Duration>,
    resolver: DnsResolver,
}

impl Dialer {
    pub fn new(target: &str, connect_timeout: Option<Duration>) -> Result<Self> {
        let (host, port) = split_host_port(target)?;
        Ok(Self {
            target: target.to_string(),
            host,
            port,
            description: "destination server",
            connect_timeout,
            resolver: DnsResolver::new(),
        })
    }

    /// Sets the name used for the target in log lines.
    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Opens one TCP connection to the target.
    ///
    /// Resolved addresses are tried in order; the timeout covers the whole attempt.
    pub async fn dial(&self) -> Result<TcpStream> {
        let addrs = self.resolver.resolve(&self.host, self.port).await?;

        let connect = connect_first(&addrs);
        let stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| Error::ConnectTimeout(self.target.clone()))?,
            None => connect.await,
        }
        .map_err(|e| Error::ConnectFailed(format!("{}: {}", self.target, e)))?;

        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Connects to the first address that accepts, returning the last error otherwise.
async fn connect_first(addrs: &[SocketAddr]) -> io::Result<TcpStream> {
    let mut last_err = None;

    for addr in addrs {
        match TcpStream::connect(*addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "no addresses to connect to")
    }))
}
