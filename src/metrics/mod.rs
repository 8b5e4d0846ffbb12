//! Built-in metrics for poll loops and event dispatch.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Refresh success/failures and duration
//! - Poll rounds that ended in backoff
//! - Delivered events and listener faults
//! - Active listeners per namespace
//!
//! # Examples
//!
//! ```rust,no_run
//! use remote_config_watch::prelude::*;
//! use remote_config_watch::sources::HttpGateway;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let gateway = HttpGateway::builder()
//!     .with_address("http://config.example.com:8080")
//!     .build()?;
//!
//! let client = ConfigClient::builder()
//!     .with_gateway(gateway)
//!     .with_metrics(global::meter("my-app"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod config_metrics;

pub use config_metrics::ConfigMetrics;
