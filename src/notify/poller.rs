//! Per-namespace long-poll loop.
//!
//! Each namespace with listeners owns exactly one loop task:
//!
//! ```text
//!   IDLE ──first listener──▶ POLLING ──new token──▶ REFRESHING ──▶ POLLING
//!                              │  ▲                     │
//!                        error │  └──── BACKOFF ◀───────┘ error
//!                              ▼          ▲
//!                           BACKOFF ──────┘
//! ```
//!
//! Teardown is cooperative: removing the last listener is observed at the
//! next loop boundary, after any in-flight gateway call has completed.

use super::backoff::BackoffState;
use super::dispatch::dispatch;
use super::listener::NamespaceSlot;
use crate::core::{ChangeToken, ClientShared, ConfigSnapshot, diff_snapshots};
use crate::error::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Drive polling for one namespace until its listeners are gone.
pub(crate) async fn run_poll_loop(shared: Arc<ClientShared>, slot: Arc<NamespaceSlot>) {
    let namespace = slot.namespace().to_string();
    let mut backoff = BackoffState::new(shared.backoff);
    info!(namespace = %namespace, gateway = %shared.gateway.name(), "poll loop started");

    while slot.keep_polling() {
        let err = match poll_round(&shared, &slot).await {
            Ok(()) => {
                backoff.register_success();
                continue;
            }
            Err(err) => err,
        };

        let delay = backoff.register_error();
        shared.record_poll_error(&namespace);
        if err.is_retryable() {
            warn!(
                namespace = %namespace,
                retry_in_ms = delay.as_millis() as u64,
                "poll round failed: {err}"
            );
        } else {
            error!(
                namespace = %namespace,
                retry_in_ms = delay.as_millis() as u64,
                "unexpected poll failure: {err}"
            );
        }

        let woken = slot.woken();
        tokio::pin!(woken);
        woken.as_mut().enable();
        if !slot.keep_polling() {
            break;
        }

        tokio::select! {
            _ = sleep(delay) => {}
            _ = &mut woken => {
                debug!(namespace = %namespace, "backoff interrupted");
            }
        }
    }

    info!(namespace = %namespace, "poll loop stopped");
}

/// One POLLING step, followed by REFRESHING when the token moved.
async fn poll_round(shared: &ClientShared, slot: &NamespaceSlot) -> Result<()> {
    let namespace = slot.namespace();
    let current = match shared.cache.get(namespace) {
        Some(snapshot) => snapshot,
        None => {
            let baseline = shared.fetch_snapshot(namespace, None).await?;
            let baseline = shared.cache.put_if_absent(baseline);
            debug!(
                namespace = %namespace,
                token = %baseline.change_token(),
                keys = baseline.content().len(),
                "baseline snapshot cached"
            );
            baseline
        }
    };

    let since = current.change_token();
    let token = shared
        .gateway
        .await_change(namespace, since, shared.poll_timeout)
        .await?;
    if &token == since {
        debug!(namespace = %namespace, token = %token, "long poll returned unchanged");
        return Ok(());
    }

    refresh(shared, slot, &current, token).await
}

/// Fetch, diff against `current`, publish, and dispatch.
async fn refresh(
    shared: &ClientShared,
    slot: &NamespaceSlot,
    current: &ConfigSnapshot,
    token: ChangeToken,
) -> Result<()> {
    let namespace = slot.namespace();
    let started = Instant::now();

    let fetched = match shared.fetch_snapshot(namespace, Some(token)).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            shared.record_refresh(namespace, started, false);
            return Err(err);
        }
    };
    let fresh = shared.cache.put(fetched);
    shared.record_refresh(namespace, started, true);

    let events = diff_snapshots(namespace, current.content(), fresh.content());
    if events.is_empty() {
        debug!(namespace = %namespace, token = %fresh.change_token(), "refresh produced no changes");
        return Ok(());
    }

    let registrations = slot.registrations();
    let report = dispatch(&events, &registrations);
    shared.record_dispatch(namespace, report.delivered, report.faults.len());
    info!(
        namespace = %namespace,
        token = %fresh.change_token(),
        events = events.len(),
        listeners = registrations.len(),
        delivered = report.delivered,
        skipped = report.skipped,
        faults = report.faults.len(),
        "configuration changed"
    );

    Ok(())
}
