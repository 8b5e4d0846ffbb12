//! Watch a namespace on an Apollo-style config service and print every change.
//!
//! This demo shows how to:
//! - Load client settings from a file and `WATCH_*` environment variables
//! - Register a listener for per-key change events
//! - Shut down the poll loops on Ctrl-C
//!
//! Run with:
//!
//! ```text
//! WATCH_REMOTE__ADDRESS=http://localhost:8080 WATCH_REMOTE__APP_ID=demo \
//!     cargo run --example listener_demo -- application
//! ```

use remote_config_watch::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,remote_config_watch=debug")),
        )
        .init();

    let namespace = std::env::args().nth(1).unwrap_or_else(|| "application".to_string());
    let settings_path = std::env::var("WATCH_SETTINGS").ok().map(PathBuf::from);

    let settings = ClientSettings::load(settings_path.as_deref(), "WATCH")?;
    let client = ConfigClient::builder().with_settings(settings).build()?;

    match client.get_properties(&namespace).await {
        Ok(raw) => println!("--- {namespace} ---\n{raw}\n"),
        Err(e) => println!("Could not read {namespace} yet: {e}"),
    }

    let changes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&changes);
    let listener: Arc<dyn ConfigurationListener> = Arc::new(move |event: &ConfigChangeEvent| {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[change #{count}] {event}");
    });
    client.add_listener(&namespace, Arc::clone(&listener))?;

    println!("Watching {namespace}; press Ctrl-C to stop\n");
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to listen for Ctrl-C: {e}");
    }

    client.remove_listener(&namespace, &listener)?;
    client.shutdown().await;
    println!("Received {} change(s)", changes.load(Ordering::SeqCst));
    Ok(())
}
