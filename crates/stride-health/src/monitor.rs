//! Connectivity monitor: background task that polls the health endpoint.
//!
//! [`ConnectivityMonitor::start`] spawns a ticker that runs one check cycle
//! immediately and then one per interval. A tick that fires while a cycle
//! is still running is dropped. Each cycle reports `checking` and then
//! `healthy` or `unhealthy` to the consumer callback.
//!
//! The returned [`StopHandle`] cancels the ticker and any in-flight probe.
//! Once `stop()` has returned the callback is never invoked again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use stride_core::config::MonitorConfig;
use stride_core::{ConnectivityState, Phase};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::checker::{HealthCheck, Probe, ProbeConfig, duration_or};
use crate::transport::DEFAULT_ORIGIN;

/// Interval between check cycles when none is configured.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(30_000);

/// Consumer callback receiving state snapshots.
pub type UpdateCallback = Box<dyn Fn(ConnectivityState) + Send + Sync>;

/// Polls a [`HealthCheck`] on a fixed interval.
pub struct ConnectivityMonitor {
    check: Arc<dyn HealthCheck>,
    interval: Duration,
}

impl ConnectivityMonitor {
    pub fn new(check: Arc<dyn HealthCheck>) -> Self {
        Self {
            check,
            interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Build an HTTP-probing monitor from the `[monitor]` table.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let origin = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let probe = Probe::http(ProbeConfig::from_config(config), origin);
        let interval = duration_or(config.interval.as_deref(), "interval", DEFAULT_CHECK_INTERVAL);
        Self::new(Arc::new(probe)).with_interval(interval)
    }

    /// Set the check interval. A zero interval keeps the current one.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            warn!(current = ?self.interval, "ignoring zero check interval");
        } else {
            self.interval = interval;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling. Must be called from within a Tokio runtime.
    ///
    /// `on_update` runs on a runtime worker and must not call `stop()` on
    /// the handle returned here.
    pub fn start<F>(&self, on_update: F) -> StopHandle
    where
        F: Fn(ConnectivityState) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            check: self.check.clone(),
            inner: Mutex::new(Inner::default()),
            on_update: Box::new(on_update),
            in_flight: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });

        let ticker = tokio::spawn(run_ticker(shared.clone(), self.interval));
        info!(interval = ?self.interval, "connectivity monitor started");

        StopHandle {
            shared,
            ticker: Some(ticker),
        }
    }
}

#[derive(Default)]
struct Inner {
    state: ConnectivityState,
    /// Outcome of the previous completed cycle, for transition logging.
    settled: Option<Phase>,
}

/// State owned by one running monitor.
struct Shared {
    check: Arc<dyn HealthCheck>,
    inner: Mutex<Inner>,
    on_update: UpdateCallback,
    in_flight: AtomicBool,
    shutdown: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a mutation and notify the consumer, unless stopped.
    ///
    /// Runs entirely under the lock, so notifications are serialized and
    /// cannot race with `stop()`.
    fn publish(&self, apply: impl FnOnce(&mut Inner)) -> bool {
        let mut inner = self.lock();
        if self.shutdown.is_cancelled() {
            return false;
        }
        apply(&mut inner);
        (self.on_update)(inner.state.clone());
        true
    }
}

/// Clears the in-flight flag when a cycle ends, even if it is aborted.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn run_ticker(shared: Arc<Shared>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycle: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if shared
                    .in_flight
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    debug!("previous health check still running, skipping tick");
                    continue;
                }
                cycle = Some(tokio::spawn(run_cycle(shared.clone())));
            }
        }
    }

    if let Some(cycle) = cycle.take() {
        cycle.abort();
    }
    debug!("connectivity monitor ticker exited");
}

async fn run_cycle(shared: Arc<Shared>) {
    let _in_flight = InFlight(&shared.in_flight);
    let cancel = shared.shutdown.child_token();

    shared.publish(|inner| inner.state.phase = Phase::Checking);

    let phase = match shared.check.check(&cancel).await {
        Ok(result) => {
            debug!(status = ?result.status, version = ?result.version, "health check succeeded");
            Phase::Healthy
        }
        Err(err) => {
            debug!(kind = err.kind(), error = %err, "health check failed");
            Phase::Unhealthy
        }
    };

    let published = shared.publish(|inner| {
        match (inner.settled, phase) {
            (Some(prev), next) if prev == next => {}
            (_, Phase::Unhealthy) => warn!(phase = %phase, "backend unreachable"),
            (_, next) => info!(phase = %next, "backend reachable"),
        }
        inner.settled = Some(phase);
        inner.state.phase = phase;
        inner.state.last_checked = Some(Utc::now());
    });

    if !published {
        debug!("monitor stopped, discarding health check result");
    }
}

/// Handle to a running monitor. Dropping it stops the monitor.
pub struct StopHandle {
    shared: Arc<Shared>,
    ticker: Option<JoinHandle<()>>,
}

impl StopHandle {
    /// Stop polling and cancel any in-flight check. Idempotent.
    pub fn stop(&self) {
        if self.shared.shutdown.is_cancelled() {
            return;
        }
        self.shared.shutdown.cancel();
        // Wait out a notification that is already being delivered.
        drop(self.shared.lock());
        info!("connectivity monitor stopped");
    }

    /// Stop and wait for the ticker task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.await;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Latest published state.
    pub fn state(&self) -> ConnectivityState {
        self.shared.lock().state.clone()
    }
}

impl Drop for StopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
