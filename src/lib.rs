//! rtunnel - Minimal TCP tunnel.
//!
//! A process runs one of two roles. The server role accepts tunnel
//! connections and relays each one to a fixed backend. The client role
//! accepts local application connections and relays each one to the tunnel
//! server. Every accepted connection gets exactly one outbound connection,
//! and bytes are copied both ways unmodified until either side closes.

pub mod cli;
pub mod client;
pub mod common;
pub mod config;
pub mod dial;
pub mod error;
pub mod listener;
pub mod relay;
pub mod server;
pub mod tunnel;

pub use cli::{BuildInfo, Cli};
pub use client::run_client;
pub use common::{parse_listen_address, split_host_port, DnsResolver};
pub use config::{Config, Role};
pub use dial::Dialer;
pub use error::{Error, ExitCode, Result};
pub use listener::{bind, connection_limiter, serve, Acceptor};
pub use relay::{handle_connection, relay, Direction, RelayOutcome, READ_BUFFER_SIZE};
pub use server::run_server;
pub use tunnel::{run, run_until, shutdown_signal};
