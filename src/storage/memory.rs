//! Volatile segment store.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{SegmentStore, StoreError, continuity::SharedContinuity};
use crate::protocol::SegmentIndex;

/// Segment store that keeps every payload in process memory.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use wirestream::{
///     protocol::SegmentIndex,
///     storage::{MemoryStore, SegmentStore},
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), wirestream::storage::StoreError> {
/// let store = MemoryStore::default();
/// store.set(SegmentIndex::new(1), Bytes::from_static(b"CD"), false).await?;
/// store.set(SegmentIndex::new(0), Bytes::from_static(b"AB"), false).await?;
/// store.set(SegmentIndex::new(2), Bytes::new(), true).await?;
/// assert_eq!(store.get_final().await?.as_ref(), b"ABCD");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: SharedContinuity<Bytes>,
}

#[async_trait]
impl SegmentStore for MemoryStore {
    async fn set(&self, index: SegmentIndex, data: Bytes, done: bool) -> Result<(), StoreError> {
        let len = data.len();
        let cursor = self.slots.with(|slots| slots.record(index, data, done));
        debug!(segment = %index, len, done, cursor = ?cursor, "segment recorded in memory");
        Ok(())
    }

    async fn get(&self, index: SegmentIndex) -> Result<Bytes, StoreError> {
        self.slots.resolve(index).await
    }

    fn terminal_index(&self) -> Option<SegmentIndex> { self.slots.with(|slots| slots.terminal()) }

    fn continuity(&self) -> Option<SegmentIndex> { self.slots.with(|slots| slots.cursor()) }

    async fn clear(&self) -> Result<(), StoreError> {
        let released = self.slots.with(|slots| slots.clear()).len();
        debug!(released, "memory store cleared");
        Ok(())
    }
}
