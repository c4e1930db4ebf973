//! Errors raised while handling stream requests.

use thiserror::Error;

use crate::{
    protocol::{StreamId, StreamResponse},
    storage::StoreError,
};

/// Reasons a start or segment request is rejected.
#[derive(Debug, Error)]
pub enum HandleError {
    /// One or more `X-Stream-*` headers are absent.
    #[error("missing stream headers")]
    MissingHeaders,
    /// The stream id header is empty.
    #[error("invalid stream id")]
    InvalidStreamId,
    /// The segment header is not a decimal index.
    #[error("invalid stream segment {value:?}")]
    InvalidSegment {
        /// Raw header value.
        value: String,
    },
    /// The id is unknown, evicted or already finalized.
    #[error("stream {id} not found")]
    SessionNotFound {
        /// Id named by the request.
        id: StreamId,
    },
    /// A start request named an id that is already live.
    #[error("stream {id} already exists")]
    DuplicateSession {
        /// Id named by the request.
        id: StreamId,
    },
    /// The session's storage failed.
    #[error("segment storage failed: {0}")]
    Storage(#[from] StoreError),
    /// A response body could not be encoded.
    #[error("failed to encode response body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl HandleError {
    /// Status code reported to the sender.
    ///
    /// A session cleared underneath a waiting request reports `404`, the same
    /// as any other lookup of an evicted stream.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::MissingHeaders | Self::InvalidStreamId | Self::InvalidSegment { .. } => 400,
            Self::SessionNotFound { .. } | Self::Storage(StoreError::Cleared { .. }) => 404,
            Self::DuplicateSession { .. } => 409,
            Self::Storage(_) | Self::Encode(_) => 500,
        }
    }

    /// Render the error as a plain-text response.
    #[must_use]
    pub fn into_response(self) -> StreamResponse { StreamResponse::new(self.status(), self.to_string()) }
}
