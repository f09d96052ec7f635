//! rtunnel - Minimal TCP tunnel.

use clap::Parser;
use rtunnel::{run, Cli, Config};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .init();

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(e.exit_code().into());
        }
    };

    tracing::debug!(?config, "configuration");

    let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    if let Err(e) = runtime.block_on(run(config)) {
        tracing::error!(error = %e, "tunnel error");
        std::process::exit(e.exit_code().into());
    }
}
