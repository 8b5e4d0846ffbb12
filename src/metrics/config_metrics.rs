//! Refresh and dispatch metrics using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::time::Duration;

/// Metrics collector for poll loops and event dispatch.
///
/// Every measurement carries a `namespace` attribute.
///
/// # Examples
///
/// ```rust,no_run
/// use remote_config_watch::metrics::ConfigMetrics;
/// use opentelemetry::global;
/// use std::time::Duration;
///
/// let meter = global::meter("remote-config-watch");
/// let metrics = ConfigMetrics::new(meter);
///
/// metrics.record_refresh("application", Duration::from_millis(12), true);
/// ```
#[derive(Clone)]
pub struct ConfigMetrics {
    refresh_success: Counter<u64>,
    refresh_failures: Counter<u64>,
    refresh_duration: Histogram<f64>,
    poll_errors: Counter<u64>,
    events_delivered: Counter<u64>,
    listener_faults: Counter<u64>,
    active_listeners: Gauge<i64>,
}

impl ConfigMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let refresh_success = meter
            .u64_counter("remote_config.refresh.success")
            .with_description("Number of successful namespace refreshes")
            .build();

        let refresh_failures = meter
            .u64_counter("remote_config.refresh.failures")
            .with_description("Number of failed namespace refreshes")
            .build();

        let refresh_duration = meter
            .f64_histogram("remote_config.refresh.duration")
            .with_description("Duration of fetch-and-parse during a refresh in seconds")
            .with_unit("s")
            .build();

        let poll_errors = meter
            .u64_counter("remote_config.poll.errors")
            .with_description("Number of poll rounds that ended in backoff")
            .build();

        let events_delivered = meter
            .u64_counter("remote_config.events.delivered")
            .with_description("Number of change events delivered to listeners")
            .build();

        let listener_faults = meter
            .u64_counter("remote_config.listener.faults")
            .with_description("Number of listener calls that panicked")
            .build();

        let active_listeners = meter
            .i64_gauge("remote_config.listeners.active")
            .with_description("Number of listeners registered per namespace")
            .build();

        Self {
            refresh_success,
            refresh_failures,
            refresh_duration,
            poll_errors,
            events_delivered,
            listener_faults,
            active_listeners,
        }
    }

    /// Record the outcome of one refresh.
    pub fn record_refresh(&self, namespace: &str, elapsed: Duration, success: bool) {
        let attributes = namespace_attr(namespace);
        if success {
            self.refresh_success.add(1, &attributes);
        } else {
            self.refresh_failures.add(1, &attributes);
        }
        self.refresh_duration
            .record(elapsed.as_secs_f64(), &attributes);
    }

    /// Record a poll round that failed and entered backoff.
    pub fn record_poll_error(&self, namespace: &str) {
        self.poll_errors.add(1, &namespace_attr(namespace));
    }

    /// Record the result of one dispatch pass.
    pub fn record_dispatch(&self, namespace: &str, delivered: u64, faults: u64) {
        let attributes = namespace_attr(namespace);
        self.events_delivered.add(delivered, &attributes);
        if faults > 0 {
            self.listener_faults.add(faults, &attributes);
        }
    }

    /// Update the number of listeners registered for `namespace`.
    pub fn update_listener_count(&self, namespace: &str, count: i64) {
        self.active_listeners.record(count, &namespace_attr(namespace));
    }
}

fn namespace_attr(namespace: &str) -> [KeyValue; 1] {
    [KeyValue::new("namespace", namespace.to_string())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::global;

    #[test]
    fn test_metrics_creation() {
        let meter = global::meter("test");
        let metrics = ConfigMetrics::new(meter);

        // Test basic operations don't panic
        metrics.record_refresh("application", Duration::from_millis(5), true);
        metrics.record_refresh("application", Duration::from_millis(5), false);
        metrics.record_poll_error("application");
        metrics.record_dispatch("application", 3, 1);
        metrics.update_listener_count("application", 2);
    }

    #[test]
    fn test_metrics_clone() {
        let meter = global::meter("test");
        let metrics = ConfigMetrics::new(meter);
        let metrics2 = metrics.clone();

        metrics.record_dispatch("a", 1, 0);
        metrics2.record_dispatch("b", 1, 0);
    }
}
