//! Process-wide tunnel configuration.
//!
//! Built once from the command line before any socket is opened and never
//! mutated afterwards; tasks receive it behind an `Arc`.

use crate::cli::Cli;
use crate::common::{parse_listen_address, split_host_port};
use crate::error::Result;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Which end of the tunnel this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Terminates tunnel connections and forwards them to the backend.
    Server,
    /// Accepts local application connections and forwards them to the tunnel server.
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => f.write_str("server"),
            Role::Client => f.write_str("client"),
        }
    }
}

/// Immutable tunnel configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub local_addr: String,
    pub remote_addr: String,
    pub is_server: bool,
    pub server_addr: String,
    pub connect_timeout: Option<Duration>,
    pub max_connections: Option<usize>,
}

impl Config {
    /// Builds and validates the configuration from parsed CLI flags.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = Self {
            local_addr: cli.local.clone(),
            remote_addr: cli.remote.clone(),
            is_server: cli.server,
            server_addr: cli.server_addr.clone(),
            connect_timeout: cli.connect_timeout,
            max_connections: cli.max_connections.map(|n| n as usize),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the addresses the selected role will bind and dial.
    ///
    /// The remote address is only informational in the client role, so it is
    /// not validated there.
    pub fn validate(&self) -> Result<()> {
        self.listen_address()?;
        split_host_port(self.dial_address())?;
        Ok(())
    }

    pub fn role(&self) -> Role {
        if self.is_server {
            Role::Server
        } else {
            Role::Client
        }
    }

    /// Address the role's listener binds.
    pub fn listen_address(&self) -> Result<SocketAddr> {
        match self.role() {
            Role::Server => parse_listen_address(&self.server_addr),
            Role::Client => parse_listen_address(&self.local_addr),
        }
    }

    /// Address dialed for every accepted connection.
    pub fn dial_address(&self) -> &str {
        match self.role() {
            Role::Server => &self.remote_addr,
            Role::Client => &self.server_addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["rtunnel"];
        argv.extend_from_slice(args);
        Config::from_cli(&Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_default_config_is_client() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.role(), Role::Client);
        assert_eq!(config.listen_address().unwrap().port(), 8080);
        assert_eq!(config.dial_address(), "0.0.0.0:8443");
        assert!(config.max_connections.is_none());
    }

    #[test]
    fn test_server_role_pairs_server_addr_with_remote() {
        let config = parse(&[
            "--server",
            "--server-addr",
            "127.0.0.1:9443",
            "--remote",
            "127.0.0.1:7000",
        ])
        .unwrap();
        assert_eq!(config.role(), Role::Server);
        assert_eq!(
            config.listen_address().unwrap(),
            "127.0.0.1:9443".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.dial_address(), "127.0.0.1:7000");
    }

    #[test]
    fn test_client_role_dials_server_addr() {
        let config = parse(&["--local", ":8080", "--server-addr", "tunnel.example.com:9443"])
            .unwrap();
        assert_eq!(config.role(), Role::Client);
        assert_eq!(config.listen_address().unwrap().port(), 8080);
        assert_eq!(config.dial_address(), "tunnel.example.com:9443");
    }

    #[test]
    fn test_invalid_listen_address_is_config_error() {
        let err = parse(&["--local", "localhost"]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_dial_address_is_config_error() {
        let err = parse(&["--server", "--remote", "backend-without-port"]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_client_ignores_remote_for_validation() {
        assert!(parse(&["--remote", "not-dialed"]).is_ok());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Server.to_string(), "server");
        assert_eq!(Role::Client.to_string(), "client");
    }
}
