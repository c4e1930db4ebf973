//! Error types for stream senders.

use std::io;

use thiserror::Error;

use crate::{
    protocol::{SegmentIndex, StreamResponse},
    transport::TransportError,
};

/// Errors emitted by [`crate::client::StreamingClient`].
#[derive(Debug, Error)]
pub enum SendError {
    /// No response was obtained; retryable.
    #[error("connectivity failure: {0}")]
    Connectivity(#[from] TransportError),
    /// The server answered with a non-client-error failure; retryable.
    #[error("server error {status}: {body}")]
    ServerTransient {
        /// Response status.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },
    /// The server rejected the request with a `4xx`; never retried.
    #[error("request rejected with status {status}: {body}")]
    ServerPermanent {
        /// Response status.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },
    /// A segment ran out of attempts.
    #[error("segment {index} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        /// Segment that could not be delivered.
        index: SegmentIndex,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: Box<SendError>,
    },
    /// The server's reply violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The byte source failed before the stream was complete.
    #[error("byte source failed: {0}")]
    Source(#[source] io::Error),
}

impl SendError {
    /// Classify an unsuccessful response.
    #[must_use]
    pub fn from_response(response: &StreamResponse) -> Self {
        let status = response.status();
        let body = String::from_utf8_lossy(response.body()).into_owned();
        if response.is_client_error() {
            Self::ServerPermanent { status, body }
        } else {
            Self::ServerTransient { status, body }
        }
    }

    /// Whether another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::ServerTransient { .. })
    }

    /// Status code of the response behind this error, if there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerTransient { status, .. } | Self::ServerPermanent { status, .. } => {
                Some(*status)
            }
            Self::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Whether the server no longer knows the stream (unknown, evicted or
    /// already finalized).
    #[must_use]
    pub fn is_session_not_found(&self) -> bool { self.status() == Some(404) }
}
