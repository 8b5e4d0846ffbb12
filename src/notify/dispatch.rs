//! Fan-out of change events to registered listeners.

use super::listener::Registration;
use crate::core::ConfigChangeEvent;
use crate::error::ConfigError;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::error;

/// Outcome of one dispatch pass.
#[derive(Debug, Default)]
pub(crate) struct DispatchReport {
    pub(crate) delivered: usize,
    pub(crate) skipped: usize,
    pub(crate) faults: Vec<ConfigError>,
}

/// Deliver every event to every still-active registration.
///
/// Events are the outer loop, so all listeners observe the same event order.
/// A listener that panics is reported and skipped for that event only.
pub(crate) fn dispatch(
    events: &[ConfigChangeEvent],
    registrations: &[Arc<Registration>],
) -> DispatchReport {
    let mut report = DispatchReport::default();

    for event in events {
        for registration in registrations {
            if !registration.is_active() {
                report.skipped += 1;
                continue;
            }

            let listener = registration.listener();
            match catch_unwind(AssertUnwindSafe(|| listener.process(event))) {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    let fault = ConfigError::ListenerFault {
                        namespace: event.namespace.clone(),
                        key: event.key.clone(),
                        message: panic_message(payload.as_ref()),
                    };
                    error!(
                        namespace = %event.namespace,
                        key = %event.key,
                        "{fault}"
                    );
                    report.faults.push(fault);
                }
            }
        }
    }

    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "listener panicked".to_string()
    }
}
