// Prometheus metrics definitions for the rawmap backend.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Total raw-data requests served, by outcome (ok, bad_request,
    /// forbidden, upstream_error).
    pub static ref RAW_DATA_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rawmap_raw_data_requests_total", "Total raw-data requests"),
        &["outcome"],
    )
    .unwrap();

    /// Rows fetched from the store, by entity kind.
    pub static ref ROWS_FETCHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rawmap_rows_fetched_total", "Rows fetched from the store"),
        &["kind"],
    )
    .unwrap();

    /// Weather cache refreshes completed.
    pub static ref WEATHER_REFRESHES_TOTAL: IntCounter = IntCounter::new(
        "rawmap_weather_refreshes_total",
        "Weather cache refreshes completed",
    )
    .unwrap();
}

/// Register all metrics with the shared registry. Call once at boot.
pub fn register_metrics() {
    REGISTRY
        .register(Box::new(RAW_DATA_REQUESTS_TOTAL.clone()))
        .ok();
    REGISTRY.register(Box::new(ROWS_FETCHED_TOTAL.clone())).ok();
    REGISTRY
        .register(Box::new(WEATHER_REFRESHES_TOTAL.clone()))
        .ok();
}

/// Encode the registry in the Prometheus text exposition format.
pub fn gather() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_includes_registered_counters() {
        register_metrics();
        RAW_DATA_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
        let text = gather();
        assert!(text.contains("rawmap_raw_data_requests_total"));
    }
}
