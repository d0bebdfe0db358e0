use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tendril_core::Supervisor;
use tendril_types::{ResolvedConfig, WorkerConfig};
use tracing_subscriber::EnvFilter;

/// How long `graceful_stop` waits for in-flight jobs to finish before
/// abandoning them on a second Ctrl-C or a stuck shutdown.
const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "tendril", about = "Distributed web crawler worker")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "worker.toml")]
    config: PathBuf,

    /// Override the configured `tracing` filter directive.
    #[arg(long, env = "TENDRIL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Increase verbosity; repeatable (`-v`, `-vv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity.
    #[arg(short, long)]
    quiet: bool,

    /// Run in stream mode against this path (`-` for stdin), overriding
    /// `stream_input` from the config file.
    #[arg(long)]
    stream: Option<String>,

    /// Treat stream-mode input lines as bare URLs instead of JSON objects.
    #[arg(long)]
    plain: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    if let Some(stream) = &args.stream {
        config.stream_input = Some(stream.clone());
        config.manager_url = None;
    }
    if args.plain {
        config.input_is_plain = true;
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = Some(log_level.clone());
    }

    let api_key_env = std::env::var("WORKER_API_KEY").ok();
    let resolved = ResolvedConfig::from_config(&config, api_key_env)
        .context("resolving configuration")?;

    init_logging(&config, args.verbose, args.quiet);

    let supervisor = Arc::new(Supervisor::new(resolved).context("initializing supervisor")?);
    supervisor.start().await;

    let supervisor_for_signal = supervisor.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, starting graceful shutdown");
            let _ = supervisor_for_signal.graceful_stop(GRACEFUL_STOP_TIMEOUT).await;
        }
    });

    supervisor.join().await.context("worker run loop failed")?;
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<WorkerConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

fn init_logging(config: &WorkerConfig, verbose: u8, quiet: bool) {
    let directive = if quiet {
        "warn".to_string()
    } else {
        match verbose {
            0 => config.log_level.clone().unwrap_or_else(|| "info".to_string()),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
