//! Histogram helpers

use super::labels;

/// Record dial latency for `service`
pub fn dial_duration(service: &str, duration_ms: u64) {
    metrics::histogram!(labels::DIAL_DURATION_MS, "service" => service.to_string())
        .record(duration_ms as f64);
}

/// Record write latency, from enqueue to transport completion
pub fn write_duration(duration_ms: u64) {
    metrics::histogram!(labels::WRITE_DURATION_MS).record(duration_ms as f64);
}
