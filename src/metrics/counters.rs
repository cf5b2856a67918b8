//! Counter helpers

use super::labels;

/// Record a dial attempt for `service`
pub fn dial_attempted(service: &str) {
    metrics::counter!(labels::DIAL_ATTEMPTS, "service" => service.to_string()).increment(1);
}

/// Record a dial outcome for `service`
pub fn dial_completed(service: &str, result: &'static str) {
    metrics::counter!(
        labels::DIAL_RESULTS,
        "service" => service.to_string(),
        "result" => result
    )
    .increment(1);
}

/// Record a write outcome
pub fn write_completed(result: &'static str) {
    metrics::counter!(labels::WRITE_RESULTS, "result" => result).increment(1);
}

/// Record bytes forwarded to the transport
pub fn bytes_written(count: usize) {
    metrics::counter!(labels::BYTES_WRITTEN).increment(count as u64);
}

/// Record bytes delivered by the transport
pub fn bytes_received(count: usize) {
    metrics::counter!(labels::BYTES_RECEIVED).increment(count as u64);
}

/// Record a flow-control pause/resume signal
pub fn flow_signalled(direction: &'static str) {
    metrics::counter!(labels::FLOW_EVENTS, "direction" => direction).increment(1);
}

/// Record a bootstrap outcome
pub fn init_completed(result: &'static str) {
    metrics::counter!(labels::INIT_RESULTS, "result" => result).increment(1);
}
