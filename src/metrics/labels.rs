//! Metric names and label values

/// Dial attempts issued to the transport
pub const DIAL_ATTEMPTS: &str = "ziti_wire_dial_attempts_total";
/// Dial outcomes by `result`
pub const DIAL_RESULTS: &str = "ziti_wire_dial_results_total";
/// Dial latency in milliseconds
pub const DIAL_DURATION_MS: &str = "ziti_wire_dial_duration_ms";
/// Write outcomes by `result`
pub const WRITE_RESULTS: &str = "ziti_wire_write_results_total";
/// Write latency (queue + transport) in milliseconds
pub const WRITE_DURATION_MS: &str = "ziti_wire_write_duration_ms";
/// Bytes handed to the transport
pub const BYTES_WRITTEN: &str = "ziti_wire_bytes_written_total";
/// Bytes received from the transport
pub const BYTES_RECEIVED: &str = "ziti_wire_bytes_received_total";
/// Flow-control transitions by `direction`
pub const FLOW_EVENTS: &str = "ziti_wire_flow_events_total";
/// Bootstrap outcomes by `result`
pub const INIT_RESULTS: &str = "ziti_wire_init_results_total";

/// Operation succeeded
pub const RESULT_OK: &str = "ok";
/// Operation failed
pub const RESULT_ERROR: &str = "error";
/// Operation timed out
pub const RESULT_TIMEOUT: &str = "timeout";
/// Operation was cancelled by the caller
pub const RESULT_CANCELLED: &str = "cancelled";
/// Intermediate init event that was ignored
pub const RESULT_IGNORED: &str = "ignored";

/// Inbound queue crossed the high watermark
pub const FLOW_PAUSE: &str = "pause";
/// Inbound queue drained below the low watermark
pub const FLOW_RESUME: &str = "resume";
