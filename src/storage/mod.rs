//! Per-session segment storage and reassembly.
//!
//! [`SegmentStore`] is the capability every session is built on: record
//! segments in any order, read them back once the stream is contiguous up to
//! them, and concatenate the whole stream once the terminal segment is known.
//! Two implementations are provided. [`MemoryStore`] keeps payloads in
//! process memory; [`FilesystemStore`] writes each segment to its own file
//! and reads it back when resolved. The registry only sees the trait and
//! builds stores through a caller-supplied [`StoreFactory`].

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

mod continuity;
pub mod error;
pub mod filesystem;
pub mod memory;

pub use error::StoreError;
pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

use crate::protocol::{SegmentIndex, StreamId};

/// Storage and reassembly state for one stream.
///
/// Callers must `set` an index before they `get` it; asking for an index
/// that was never recorded fails immediately rather than waiting.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Record the payload of `index`, replacing any earlier payload.
    ///
    /// Marks `index` as the terminal segment when `done` is set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the backing storage cannot be written.
    async fn set(&self, index: SegmentIndex, data: Bytes, done: bool) -> Result<(), StoreError>;

    /// Wait until every index up to `index` is recorded, then return it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `index` was never recorded,
    /// [`StoreError::Cleared`] if the store is cleared while waiting, or
    /// [`StoreError::Io`] if the payload cannot be read back.
    async fn get(&self, index: SegmentIndex) -> Result<Bytes, StoreError>;

    /// Index of the terminal segment, once one has been recorded.
    fn terminal_index(&self) -> Option<SegmentIndex>;

    /// Highest index such that every index up to it has been recorded.
    fn continuity(&self) -> Option<SegmentIndex>;

    /// Release everything the store retains. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if persistent segments cannot be removed.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Whether a terminal segment has been recorded.
    fn is_done(&self) -> bool { self.terminal_index().is_some() }

    /// Concatenate every segment from zero through the terminal index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFinalized`] when no terminal segment is
    /// known, and [`StoreError::NotFound`] if an index below it was never
    /// recorded.
    async fn get_final(&self) -> Result<Bytes, StoreError> {
        let terminal = self.terminal_index().ok_or(StoreError::NotFinalized)?;
        let mut parts = Vec::new();
        let mut total = 0_usize;
        for index in 0..=terminal.get() {
            let part = self.get(SegmentIndex::new(index)).await?;
            total = total.saturating_add(part.len());
            parts.push(part);
        }
        let mut all = BytesMut::with_capacity(total);
        for part in parts {
            all.extend_from_slice(&part);
        }
        Ok(all.freeze())
    }
}

/// Builds a fresh store for each new session.
pub trait StoreFactory: Send + Sync {
    /// Create the store backing stream `id`.
    fn create(&self, id: &StreamId) -> Arc<dyn SegmentStore>;
}

impl<F> StoreFactory for F
where
    F: Fn(&StreamId) -> Arc<dyn SegmentStore> + Send + Sync,
{
    fn create(&self, id: &StreamId) -> Arc<dyn SegmentStore> { self(id) }
}

/// Default base directory for [`StorageBackend::Filesystem`].
pub const DEFAULT_STORAGE_DIR: &str = ".wirestream";

/// Built-in storage backends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StorageBackend {
    /// Keep segments in process memory.
    #[default]
    Memory,
    /// Write segments below `base`, one directory per stream.
    Filesystem {
        /// Root under which stream directories are created.
        base: PathBuf,
    },
}

impl StorageBackend {
    /// Filesystem backend rooted at `base`.
    #[must_use]
    pub fn filesystem(base: impl AsRef<Path>) -> Self {
        Self::Filesystem {
            base: base.as_ref().to_path_buf(),
        }
    }
}

impl StoreFactory for StorageBackend {
    fn create(&self, id: &StreamId) -> Arc<dyn SegmentStore> {
        match self {
            Self::Memory => Arc::new(MemoryStore::default()),
            Self::Filesystem { base } => Arc::new(FilesystemStore::new(base, id)),
        }
    }
}
