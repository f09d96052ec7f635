//! CLI definitions for rtunnel.

use clap::{builder::PossibleValuesParser, Parser};
use std::sync::OnceLock;
use std::time::Duration;

/// Default address the client role listens on.
pub const DEFAULT_LOCAL_ADDR: &str = "127.0.0.1:8080";

/// Default backend address the server role forwards to.
pub const DEFAULT_REMOTE_ADDR: &str = "127.0.0.1:9090";

/// Default tunnel server address.
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8443";

/// Parse a duration from a human-readable string.
fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

/// Version text shown by `--version`, including commit and build date.
fn long_version() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| BuildInfo::get().version_line())
}

/// Minimal TCP tunnel.
#[derive(Debug, Parser)]
#[command(name = "rtunnel")]
#[command(version = long_version(), about, long_about = None)]
pub struct Cli {
    /// Local address (IP:PORT)
    #[arg(long, default_value = DEFAULT_LOCAL_ADDR)]
    pub local: String,

    /// Remote address (HOST:PORT)
    #[arg(long, default_value = DEFAULT_REMOTE_ADDR)]
    pub remote: String,

    /// Run in server mode
    #[arg(long, default_value_t = false)]
    pub server: bool,

    /// Server listening address (IP:PORT)
    #[arg(long, default_value = DEFAULT_SERVER_ADDR)]
    pub server_addr: String,

    /// Log level (debug|info|warn|error)
    #[arg(long, default_value = "info", value_parser = PossibleValuesParser::new(["debug", "info", "warn", "error"]))]
    pub log_level: String,

    /// Dial timeout for outbound connections (e.g. 5s); no timeout when unset
    #[arg(long, value_parser = parse_duration)]
    pub connect_timeout: Option<Duration>,

    /// Maximum number of concurrent connection pairs; unbounded when unset
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_connections: Option<u32>,
}

/// Build information reported at startup.
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub built: &'static str,
}

impl BuildInfo {
    /// Returns build information from environment variables or defaults.
    pub fn get() -> Self {
        Self {
            version: option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
            commit: option_env!("RTUNNEL_COMMIT").unwrap_or("unknown"),
            built: option_env!("RTUNNEL_BUILD_DATE").unwrap_or("unknown"),
        }
    }

    /// Version, commit and build date on one line.
    pub fn version_line(&self) -> String {
        format!("{} (commit: {}, built: {})", self.version, self.commit, self.built)
    }

    /// Format version output.
    pub fn format(&self) -> String {
        format!("rtunnel version {}", self.version_line())
    }
}
