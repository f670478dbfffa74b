//! stride-health: backend connectivity monitoring for Stride.
//!
//! Provides a retrying, cancellable HTTP health probe and a polling
//! monitor that reports a coarse connectivity phase to a consumer.
//!
//! # Architecture
//!
//! ```text
//! ConnectivityMonitor
//!   ├── Ticker task (immediate check, then one per interval)
//!   │   └── Check cycle (at most one in flight)
//!   │       ├── Probe::check() → CheckResult | ProbeError
//!   │       │   ├── Transport::get() bounded by timeout + cancellation
//!   │       │   └── Exponential backoff between attempts
//!   │       └── Publish ConnectivityState to on_update
//!   └── StopHandle (cancels ticker and in-flight probe)
//! ```
//!
//! # Failure handling
//!
//! Every probe failure kind except `Aborted` is retried, with delays of
//! `base_delay * 2^attempt`. When attempts run out the last attempt's
//! error is returned. The monitor folds all failures into `unhealthy` and
//! keeps polling at its fixed interval.

pub mod checker;
pub mod error;
pub mod monitor;
pub mod transport;

pub use checker::{HealthCheck, Probe, ProbeConfig};
pub use error::{ProbeError, ProbeResult, TransportError};
pub use monitor::{ConnectivityMonitor, StopHandle};
pub use transport::{HyperTransport, Transport, TransportResponse};
