//! Metric helpers for `wirestream`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking registered sessions.
pub const SESSIONS_ACTIVE: &str = "wirestream_sessions_active";
/// Name of the counter tracking accepted segments.
pub const SEGMENTS_ACCEPTED: &str = "wirestream_segments_accepted_total";
/// Name of the counter tracking fully reassembled streams.
pub const STREAMS_FINALIZED: &str = "wirestream_streams_finalized_total";
/// Name of the counter tracking sessions evicted for inactivity.
pub const SESSIONS_EVICTED: &str = "wirestream_sessions_evicted_total";
/// Name of the counter tracking sender retry attempts.
pub const SEGMENT_RETRIES: &str = "wirestream_segment_retries_total";

/// Increment the active sessions gauge.
pub fn inc_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Decrement the active sessions gauge.
pub fn dec_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Record an accepted segment.
pub fn inc_segments() {
    #[cfg(feature = "metrics")]
    counter!(SEGMENTS_ACCEPTED).increment(1);
}

/// Record a finalized stream.
pub fn inc_finalized() {
    #[cfg(feature = "metrics")]
    counter!(STREAMS_FINALIZED).increment(1);
}

/// Record an evicted session.
pub fn inc_evictions() {
    #[cfg(feature = "metrics")]
    counter!(SESSIONS_EVICTED).increment(1);
}

/// Record a retried segment transmission.
pub fn inc_retries() {
    #[cfg(feature = "metrics")]
    counter!(SEGMENT_RETRIES).increment(1);
}
