//! Address handling shared by the server and client roles.

use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Parses a listen address string into a SocketAddr.
///
/// `:PORT` is shorthand for `0.0.0.0:PORT`.
pub fn parse_listen_address(listen: &str) -> Result<SocketAddr> {
    let addr_str = if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_string()
    };

    addr_str
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address '{}': {}", listen, e)))
}

/// Splits a `HOST:PORT` string, unwrapping bracketed IPv6 hosts.
pub fn split_host_port(addr: &str) -> Result<(String, u16)> {
    let Some(colon_pos) = addr.rfind(':') else {
        return Err(Error::Config(format!(
            "address must include port: '{}'",
            addr
        )));
    };

    let host_part = &addr[..colon_pos];
    let port_part = &addr[colon_pos + 1..];

    let host = if host_part.starts_with('[') && host_part.ends_with(']') {
        &host_part[1..host_part.len() - 1]
    } else {
        host_part
    };

    if host.is_empty() {
        return Err(Error::Config(format!("missing host in address '{}'", addr)));
    }

    let port: u16 = port_part
        .parse()
        .map_err(|_| Error::Config(format!("invalid port in address '{}'", addr)))?;

    Ok((host.to_string(), port))
}

type TokioResolver =
    hickory_resolver::Resolver<hickory_resolver::name_server::TokioConnectionProvider>;

/// Shared DNS resolver, built on first use and reused for every dial.
pub struct DnsResolver {
    resolver: Mutex<Option<Arc<TokioResolver>>>,
}

impl DnsResolver {
    /// Creates a new DNS resolver.
    pub fn new() -> Self {
        Self {
            resolver: Mutex::new(None),
        }
    }

    /// Resolves a hostname to every address it has, in resolver order.
    pub async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }

        let lookup = {
            let mut guard = self.resolver.lock().await;
            let resolver = match guard.as_ref() {
                Some(resolver) => Arc::clone(resolver),
                None => {
                    let resolver = Arc::new(
                        hickory_resolver::Resolver::builder_tokio()
                            .map_err(|e| {
                                Error::Config(format!("failed to create DNS resolver: {}", e))
                            })?
                            .build(),
                    );
                    *guard = Some(Arc::clone(&resolver));
                    resolver
                }
            };
            drop(guard);
            resolver.lookup_ip(host).await
        };

        let response =
            lookup.map_err(|e| Error::Config(format!("failed to resolve '{}': {}", host, e)))?;

        let addrs: Vec<SocketAddr> = response.iter().map(|ip| SocketAddr::new(ip, port)).collect();
        if addrs.is_empty() {
            return Err(Error::Config(format!("no addresses found for '{}'", host)));
        }
        Ok(addrs)
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}
