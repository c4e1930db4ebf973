#![doc(html_root_url = "https://docs.rs/wirestream/latest")]
//! Public API for the `wirestream` library.
//!
//! This crate moves a byte stream of unknown length across a
//! request/response transport as a sequence of independently retried,
//! indexed segments, and reassembles it in order on the receiving side.
//!
//! The sending half lives in [`client`]; the receiving half is the
//! [`handler`], backed by a [`registry`] of per-stream [`storage`] sessions.

pub mod client;
pub mod handler;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod storage;
pub mod transport;

pub use client::{BackoffConfig, SendError, SendOutcome, StreamingClient};
pub use handler::{HandleError, HandlerConfig, Received, StreamingHandler};
pub use metrics::{
    SEGMENT_RETRIES,
    SEGMENTS_ACCEPTED,
    SESSIONS_ACTIVE,
    SESSIONS_EVICTED,
    STREAMS_FINALIZED,
};
pub use protocol::{SegmentHeader, SegmentIndex, StreamId, StreamRequest, StreamResponse};
pub use registry::SessionRegistry;
pub use storage::{SegmentStore, StorageBackend, StoreError, StoreFactory};
pub use transport::{LoopbackTransport, Transport, TransportError};
