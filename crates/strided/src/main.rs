//! strided: the Stride backend daemon.
//!
//! Runs the health API the web client polls, and the client-side
//! connectivity monitor for operators and smoke tests.
//!
//! # Usage
//!
//! ```text
//! strided serve --port 8080
//! strided check --base-url http://127.0.0.1:8080
//! strided watch --base-url http://127.0.0.1:8080 --interval 30s
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use stride_core::StrideConfig;
use stride_core::config::{LogConfig, MonitorConfig};
use tracing_subscriber::EnvFilter;

mod serve;
mod watch;

#[derive(Parser)]
#[command(name = "strided", about = "Stride backend daemon", version)]
struct Cli {
    /// Path to stride.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format: text or json.
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the health API.
    Serve {
        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Version string reported by /api/health.
        #[arg(long = "service-version")]
        version: Option<String>,
    },
    /// Run a single health check and print the result as JSON.
    Check {
        #[command(flatten)]
        probe: ProbeArgs,
    },
    /// Poll the health endpoint until interrupted.
    Watch {
        #[command(flatten)]
        probe: ProbeArgs,

        /// Interval between checks (e.g. "30s").
        #[arg(long)]
        interval: Option<String>,

        /// Print each state update as a JSON line on stdout.
        #[arg(long)]
        json: bool,
    },
}

/// Probe settings that override the `[monitor]` table.
#[derive(Args)]
struct ProbeArgs {
    /// Origin that relative endpoints resolve against.
    #[arg(long)]
    base_url: Option<String>,

    /// Health endpoint path or absolute URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Per-attempt timeout (e.g. "5s").
    #[arg(long)]
    timeout: Option<String>,

    /// Retries after the first failed attempt.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Backoff base delay (e.g. "1s").
    #[arg(long)]
    base_delay: Option<String>,
}

impl ProbeArgs {
    fn apply(self, config: &mut MonitorConfig) {
        if self.base_url.is_some() {
            config.base_url = self.base_url;
        }
        if self.endpoint.is_some() {
            config.endpoint = self.endpoint;
        }
        if self.timeout.is_some() {
            config.timeout = self.timeout;
        }
        if self.max_retries.is_some() {
            config.max_retries = self.max_retries;
        }
        if self.base_delay.is_some() {
            config.base_delay = self.base_delay;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = StrideConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log(), cli.log_format.as_deref());

    match cli.command {
        Command::Serve { port, version } => {
            let server = config.server();
            let port = port.or(server.port).unwrap_or(8080);
            let version = version
                .or(server.version)
                .unwrap_or_else(|| stride_api::DEFAULT_VERSION.to_string());
            serve::run(port, version).await
        }
        Command::Check { probe } => {
            let mut monitor = config.monitor();
            probe.apply(&mut monitor);
            watch::check_once(&monitor).await
        }
        Command::Watch {
            probe,
            interval,
            json,
        } => {
            let mut monitor = config.monitor();
            probe.apply(&mut monitor);
            if interval.is_some() {
                monitor.interval = interval;
            }
            watch::run(&monitor, json).await
        }
    }
}

/// Filter comes from `RUST_LOG`, then `LOG_LEVEL`, then `[log].level`.
/// Logs go to stderr so `check` output on stdout stays clean.
fn init_tracing(log: &LogConfig, format_override: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL")
            .ok()
            .or_else(|| log.level.clone())
            .unwrap_or_else(|| "info".to_string());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    let format = format_override.or(log.format.as_deref()).unwrap_or("text");
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
}
