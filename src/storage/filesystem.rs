//! Persistent segment store writing one file per segment.
//!
//! Segments of stream `id` live in `<base>/<id>/segment-<index>.bin`. The
//! stream directory is created on the first write. Resolved reads go back to
//! the file rather than trusting the bytes that were written, so a broken
//! storage round trip surfaces as an error instead of silently succeeding.

use std::{
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use super::{SegmentStore, StoreError, continuity::SharedContinuity};
use crate::protocol::{SegmentIndex, StreamId};

/// Segment store backed by the local filesystem.
#[derive(Debug)]
pub struct FilesystemStore {
    dir: PathBuf,
    slots: SharedContinuity<PathBuf>,
    cleared: AtomicBool,
}

impl FilesystemStore {
    /// Create a store for stream `id` below `base`.
    ///
    /// Nothing touches the disk until the first segment is written.
    #[must_use]
    pub fn new(base: impl AsRef<Path>, id: &StreamId) -> Self {
        Self {
            dir: base.as_ref().join(directory_name(id)),
            slots: SharedContinuity::default(),
            cleared: AtomicBool::new(false),
        }
    }

    /// Directory holding this stream's segment files.
    #[must_use]
    pub fn dir(&self) -> &Path { &self.dir }

    fn segment_path(&self, index: SegmentIndex) -> PathBuf {
        self.dir.join(format!("segment-{index}.bin"))
    }
}

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Map a stream id onto a single safe path component.
///
/// Ids made only of ASCII alphanumerics, `-` and `_` are used verbatim;
/// anything else is hex encoded so it cannot escape the base directory.
fn directory_name(id: &StreamId) -> String {
    let raw = id.as_str();
    if !raw.starts_with("x-")
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return raw.to_owned();
    }
    let mut encoded = String::with_capacity(raw.len() * 2 + 2);
    encoded.push_str("x-");
    for byte in raw.bytes() {
        encoded.push(char::from(HEX[usize::from(byte >> 4)]));
        encoded.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    encoded
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[async_trait]
impl SegmentStore for FilesystemStore {
    async fn set(&self, index: SegmentIndex, data: Bytes, done: bool) -> Result<(), StoreError> {
        if self.cleared.load(Ordering::SeqCst) {
            return Err(StoreError::Cleared { index });
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.segment_path(index);
        tokio::fs::write(&path, &data).await?;
        // `clear` raises the flag before draining the slots, so a path is
        // either recorded here and removed by `clear`, or rejected below.
        let cursor = self.slots.with(|slots| {
            (!self.cleared.load(Ordering::SeqCst)).then(|| slots.record(index, path.clone(), done))
        });
        let Some(cursor) = cursor else {
            ignore_missing(tokio::fs::remove_file(&path).await)?;
            if let Err(err) = tokio::fs::remove_dir(&self.dir).await {
                debug!(error = %err, dir = %self.dir.display(), "stream directory kept after late write");
            }
            warn!(segment = %index, dir = %self.dir.display(), "segment arrived after clear");
            return Err(StoreError::Cleared { index });
        };
        debug!(
            segment = %index,
            len = data.len(),
            done,
            cursor = ?cursor,
            dir = %self.dir.display(),
            "segment written to disk"
        );
        Ok(())
    }

    async fn get(&self, index: SegmentIndex) -> Result<Bytes, StoreError> {
        let path = self.slots.resolve(index).await?;
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    fn terminal_index(&self) -> Option<SegmentIndex> { self.slots.with(|slots| slots.terminal()) }

    fn continuity(&self) -> Option<SegmentIndex> { self.slots.with(|slots| slots.cursor()) }

    async fn clear(&self) -> Result<(), StoreError> {
        self.cleared.store(true, Ordering::SeqCst);
        let segments = self.slots.with(|slots| slots.clear());
        for (_, path) in &segments {
            ignore_missing(tokio::fs::remove_file(path).await)?;
        }
        match tokio::fs::remove_dir(&self.dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) if err.kind() == io::ErrorKind::DirectoryNotEmpty => {
                warn!(dir = %self.dir.display(), "stream directory not empty after clear");
            }
            Err(err) => return Err(err.into()),
        }
        debug!(removed = segments.len(), dir = %self.dir.display(), "filesystem store cleared");
        Ok(())
    }
}
