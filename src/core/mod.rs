//! Core client types: snapshots, diffs, settings and the client handle.

mod builder;
pub(crate) mod client;
mod diff;
mod settings;
mod snapshot;

pub use builder::ConfigClientBuilder;
pub use client::ConfigClient;
pub(crate) use client::ClientShared;
pub use diff::{ChangeKind, ConfigChangeEvent, diff_snapshots};
pub use settings::{ClientSettings, RemoteSettings};
pub use snapshot::{ChangeToken, ConfigSnapshot, SnapshotCache};
