//! TokenTrust daemon: entry point for running the TokenTrust service.

use clap::Parser;
use std::path::PathBuf;
use tokentrust_service::{init_logging, ServiceConfig, TokenTrustService};

#[derive(Parser)]
#[command(name = "tokentrust-daemon", about = "TokenTrust token lifecycle service")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "TOKENTRUST_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP API port.
    #[arg(long, env = "TOKENTRUST_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Disable the HTTP API.
    #[arg(long, env = "TOKENTRUST_DISABLE_RPC")]
    no_rpc: bool,

    /// WebSocket feed port.
    #[arg(long, env = "TOKENTRUST_WS_PORT")]
    websocket_port: Option<u16>,

    /// Disable the WebSocket merchant feed.
    #[arg(long, env = "TOKENTRUST_DISABLE_WEBSOCKET")]
    no_websocket: bool,

    /// Disable the Prometheus `/metrics` endpoint.
    #[arg(long, env = "TOKENTRUST_DISABLE_METRICS")]
    no_metrics: bool,

    /// Seconds between background expiry sweeps.
    #[arg(long, env = "TOKENTRUST_SWEEP_INTERVAL")]
    sweep_interval: Option<u64>,

    /// Verification window length in seconds.
    #[arg(long, env = "TOKENTRUST_VERIFICATION_TIMEOUT")]
    verification_timeout: Option<u64>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TOKENTRUST_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TOKENTRUST_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the service (default).
    Run,
    /// Print the effective configuration as TOML and exit.
    Config,
}

impl Cli {
    /// Apply CLI flags and env vars on top of a base config.
    fn apply(&self, base: ServiceConfig) -> ServiceConfig {
        let mut config = base;
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(port) = self.websocket_port {
            config.websocket_port = port;
        }
        if self.no_rpc {
            config.enable_rpc = false;
        }
        if self.no_websocket {
            config.enable_websocket = false;
        }
        if self.no_metrics {
            config.enable_metrics = false;
        }
        if let Some(secs) = self.sweep_interval {
            config.sweep_interval_secs = secs;
        }
        if let Some(secs) = self.verification_timeout {
            config.lifecycle.verification_timeout_secs = secs;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => ServiceConfig::from_toml_file(path)?,
        None => ServiceConfig::default(),
    };
    let config = cli.apply(file_config);
    config.validate()?;

    if let Some(Command::Config) = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_logging(config.log_format()?, &config.log_level)?;
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    let mut service = TokenTrustService::new(config)?;
    service.run().await?;

    tracing::info!("TokenTrust daemon exited cleanly");
    Ok(())
}
