//! `strided check` and `strided watch`: the client side of the health API.

use stride_core::config::MonitorConfig;
use stride_health::transport::DEFAULT_ORIGIN;
use stride_health::{ConnectivityMonitor, Probe, ProbeConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run one probe; print the result on success, fail with the error kind.
pub async fn check_once(config: &MonitorConfig) -> anyhow::Result<()> {
    let origin = config
        .base_url
        .clone()
        .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
    let probe = Probe::http(ProbeConfig::from_config(config), origin.clone());

    info!(
        %origin,
        endpoint = %probe.config().endpoint,
        max_retries = probe.config().max_retries,
        "running health check"
    );

    // Ctrl-C aborts the check, including a pending retry.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let outcome = probe.run(Some(&cancel)).await;
    signal.abort();

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(err) => {
            error!(kind = err.kind(), error = %err, "health check failed");
            anyhow::bail!("health check failed ({}): {err}", err.kind())
        }
    }
}

/// Poll until Ctrl-C, reporting every state update.
pub async fn run(config: &MonitorConfig, json: bool) -> anyhow::Result<()> {
    let monitor = ConnectivityMonitor::from_config(config);

    let handle = monitor.start(move |state| {
        if json {
            match serde_json::to_string(&state) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to encode state"),
            }
        } else {
            info!(phase = %state.phase, last_checked = ?state.last_checked, "connectivity");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    handle.shutdown().await;
    Ok(())
}
