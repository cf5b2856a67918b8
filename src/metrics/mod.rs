//! Metrics for dial, write, inbound and bootstrap activity
//!
//! Recorded through the `metrics` facade; nothing is exported unless the host
//! installs a recorder.

pub mod counters;
pub mod histograms;
pub mod labels;
