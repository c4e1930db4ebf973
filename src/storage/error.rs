//! Errors raised by segment stores.

use std::io;

use thiserror::Error;

use crate::protocol::SegmentIndex;

/// Failures reported by a [`SegmentStore`](super::SegmentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The index was never recorded.
    #[error("segment {index} not found")]
    NotFound {
        /// Index that was requested.
        index: SegmentIndex,
    },
    /// `get_final` was called before a terminal segment was recorded.
    #[error("stream not finalized")]
    NotFinalized,
    /// The store was cleared while a caller was waiting on `index`.
    #[error("segment {index} released by store clear")]
    Cleared {
        /// Index the caller was waiting on.
        index: SegmentIndex,
    },
    /// Reading or writing persistent storage failed.
    #[error("segment storage I/O failed: {0}")]
    Io(#[from] io::Error),
}
