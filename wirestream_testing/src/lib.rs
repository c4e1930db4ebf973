//! Test utilities for `wirestream`.
//!
//! [`ScriptedTransport`] replays queued responses and failures to a
//! [`StreamingClient`](wirestream::StreamingClient) while recording every
//! request, so tests can assert on retry schedules without a receiver. The
//! fixtures build handlers, byte sources and fast back-off policies.
//!
//! ```rust
//! use wirestream::StreamingClient;
//! use wirestream_testing::{ScriptedTransport, fast_backoff};
//!
//! # async fn example() {
//! let transport = ScriptedTransport::new();
//! transport.push_status(503);
//! let client = StreamingClient::new(transport).with_backoff(fast_backoff(3));
//! # }
//! ```

pub mod fixtures;
pub mod logging;
pub mod metrics;
pub mod transport;

pub use fixtures::{chunks, failing_after, fast_backoff, handler, memory_handler};
pub use logging::{LoggerHandle, logger};
pub use metrics::MetricsCapture;
pub use transport::{RecordedRequest, ScriptedTransport};
