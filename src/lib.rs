//! # remote-config-watch
//!
//! Keep local configuration in sync with a remote config service and get
//! notified, key by key, when it changes.
//!
//! ## Overview
//!
//! `remote-config-watch` provides a client that combines:
//! - A per-namespace snapshot cache with atomic replacement (`arc-swap`)
//! - One long-poll loop per watched namespace, with bounded exponential backoff
//! - Key-level diffing of every refresh into ADD / UPDATE / DELETE events
//! - A listener registry that tolerates add/remove during dispatch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use remote_config_watch::prelude::*;
//! use remote_config_watch::sources::HttpGateway;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let client = ConfigClient::builder()
//!     .with_gateway(
//!         HttpGateway::builder()
//!             .with_address("http://config.example.com:8080")
//!             .with_app_id("orders")
//!             .build()?,
//!     )
//!     .build()?;
//!
//! let listener: Arc<dyn ConfigurationListener> = Arc::new(|event: &ConfigChangeEvent| {
//!     println!("{} {} -> {:?}", event.kind, event.key, event.new_value);
//! });
//! client.add_listener("application", listener)?;
//!
//! // Reads are served from cache once a namespace has been fetched
//! let port = client.get_internal_property("server.port").await?;
//! println!("Port: {port}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `remote` (default): Apollo-style HTTP gateway built on `reqwest`
//! - `yaml` (default): `YamlParser` for YAML namespaces
//! - `metrics`: OpenTelemetry metrics for refreshes and dispatch

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        ChangeKind, ClientSettings, ConfigChangeEvent, ConfigClient, ConfigClientBuilder,
    };
    pub use crate::error::{ConfigError, Result};
    pub use crate::notify::{BackoffConfig, ConfigurationListener};
    pub use crate::sources::{ConfigGateway, ConfigurationParser, RemoteConfig};
}
