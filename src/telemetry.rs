//! Telemetry and observability utilities

use std::sync::atomic::{AtomicI64, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Arc;

#[cfg(feature = "metrics")]
use opentelemetry::{
    metrics::{Counter, Histogram, UpDownCounter},
    KeyValue,
};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Whether telemetry is enabled
    pub enabled: bool,
    /// Service name for metrics
    pub service_name: String,
    /// Service version for metrics
    pub service_version: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "kv-storage-sdk".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// SDK metrics collector
pub struct Metrics {
    /// Requests currently awaiting a response, tracked with or without an exporter
    in_flight_now: AtomicI64,

    #[cfg(feature = "metrics")]
    pub(crate) requests_total: Counter<u64>,

    #[cfg(feature = "metrics")]
    pub(crate) request_duration: Histogram<f64>,

    #[cfg(feature = "metrics")]
    pub(crate) errors_total: Counter<u64>,

    #[cfg(feature = "metrics")]
    pub(crate) in_flight: UpDownCounter<i64>,
}

impl Metrics {
    /// Create new metrics instance
    #[cfg(feature = "metrics")]
    pub fn new(config: &TelemetryConfig) -> Self {
        use opentelemetry::global;

        let meter = global::meter(config.service_name.clone());

        let requests_total = meter
            .u64_counter("kv_storage_sdk.requests_total")
            .with_description("Total number of requests made")
            .init();

        let request_duration = meter
            .f64_histogram("kv_storage_sdk.request_duration_seconds")
            .with_description("Request duration in seconds")
            .init();

        let errors_total = meter
            .u64_counter("kv_storage_sdk.errors_total")
            .with_description("Total number of non-success responses and transport failures")
            .init();

        let in_flight = meter
            .i64_up_down_counter("kv_storage_sdk.requests_in_flight")
            .with_description("Number of requests awaiting a response")
            .init();

        Self {
            in_flight_now: AtomicI64::new(0),
            requests_total,
            request_duration,
            errors_total,
            in_flight,
        }
    }

    /// Create a no-op metrics instance when feature is disabled
    #[cfg(not(feature = "metrics"))]
    pub fn new(_config: &TelemetryConfig) -> Self {
        Self {
            in_flight_now: AtomicI64::new(0),
        }
    }

    /// Record a completed request
    #[cfg(feature = "metrics")]
    pub fn record_request(&self, operation: &'static str, status: u16, duration_secs: f64) {
        let labels = &[
            KeyValue::new("operation", operation),
            KeyValue::new("status", status.to_string()),
        ];

        self.requests_total.add(1, labels);
        self.request_duration.record(duration_secs, labels);

        if status >= 400 {
            self.errors_total.add(
                1,
                &[
                    KeyValue::new("type", if status >= 500 { "server" } else { "client" }),
                    KeyValue::new("operation", operation),
                ],
            );
        }
    }

    /// Record a completed request (no-op when metrics disabled)
    #[cfg(not(feature = "metrics"))]
    pub fn record_request(&self, _operation: &'static str, _status: u16, _duration_secs: f64) {}

    /// Record a request that failed in the transport
    #[cfg(feature = "metrics")]
    pub fn record_transport_error(&self, operation: &'static str) {
        self.errors_total.add(
            1,
            &[
                KeyValue::new("type", "transport"),
                KeyValue::new("operation", operation),
            ],
        );
    }

    /// Record a transport failure (no-op)
    #[cfg(not(feature = "metrics"))]
    pub fn record_transport_error(&self, _operation: &'static str) {}

    /// Increment in-flight requests
    pub fn inc_in_flight(&self) {
        let _ = self.in_flight_now.fetch_add(1, Ordering::SeqCst);
        #[cfg(feature = "metrics")]
        self.in_flight.add(1, &[]);
    }

    /// Decrement in-flight requests
    pub fn dec_in_flight(&self) {
        let _ = self.in_flight_now.fetch_sub(1, Ordering::SeqCst);
        #[cfg(feature = "metrics")]
        self.in_flight.add(-1, &[]);
    }

    /// Requests currently awaiting a response
    pub fn in_flight(&self) -> i64 {
        self.in_flight_now.load(Ordering::SeqCst)
    }
}

/// Counts one request as in flight until dropped
///
/// Dropping the request future mid-await still releases the count.
pub(crate) struct InFlightGuard<'a> {
    metrics: &'a Metrics,
}

impl<'a> InFlightGuard<'a> {
    pub(crate) fn enter(metrics: &'a Metrics) -> Self {
        metrics.inc_in_flight();
        Self { metrics }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.metrics.dec_in_flight();
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("enabled", &cfg!(feature = "metrics"))
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Global telemetry instance holder
#[cfg(feature = "metrics")]
static TELEMETRY: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Initialize global telemetry
#[cfg(feature = "metrics")]
pub fn init_telemetry(config: TelemetryConfig) -> Arc<Metrics> {
    let metrics = Arc::new(Metrics::new(&config));
    TELEMETRY.get_or_init(|| metrics.clone()).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.service_name, "kv-storage-sdk");
    }

    #[test]
    fn test_metrics_record_without_exporter() {
        let config = TelemetryConfig {
            enabled: true,
            ..Default::default()
        };

        let metrics = Metrics::new(&config);
        metrics.inc_in_flight();
        metrics.record_request("get", 200, 0.01);
        metrics.record_request("put", 503, 0.02);
        metrics.record_transport_error("delete");
        metrics.dec_in_flight();
        assert_eq!(metrics.in_flight(), 0);
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let metrics = Metrics::new(&TelemetryConfig::default());
        {
            let _first = InFlightGuard::enter(&metrics);
            let _second = InFlightGuard::enter(&metrics);
            assert_eq!(metrics.in_flight(), 2);
        }
        assert_eq!(metrics.in_flight(), 0);
    }
}
