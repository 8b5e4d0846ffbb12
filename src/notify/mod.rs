//! Configuration change notification system.
//!
//! Listeners register per namespace; the first listener for a namespace
//! starts a long-poll loop that refreshes the namespace on every remote
//! change and fans out one event per changed key.

mod backoff;
mod dispatch;
mod listener;
pub(crate) mod poller;

pub use backoff::BackoffConfig;
pub use listener::ConfigurationListener;
pub(crate) use listener::ListenerRegistry;
