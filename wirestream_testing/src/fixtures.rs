//! Shared fixtures for handler and client tests.

use std::{io, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::{Stream, stream};
use rstest::fixture;
use wirestream::{
    BackoffConfig,
    SessionRegistry,
    StorageBackend,
    StreamingHandler,
    registry::DEFAULT_SESSION_TIMEOUT,
};

/// Handler over `backend` without a background sweeper.
///
/// Eviction only happens when a test calls
/// [`SessionRegistry::purge_expired`] itself, which keeps timing explicit.
#[must_use]
pub fn handler(backend: StorageBackend) -> StreamingHandler {
    StreamingHandler::from_registry(Arc::new(SessionRegistry::new(
        backend,
        DEFAULT_SESSION_TIMEOUT,
    )))
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn memory_handler() -> StreamingHandler { handler(StorageBackend::Memory) }

/// Back-off starting at 10ms, doubling, capped at 80ms.
#[must_use]
pub fn fast_backoff(max_attempts: u32) -> BackoffConfig {
    BackoffConfig {
        initial_delay: Duration::from_millis(10),
        factor: 2.0,
        max_delay: Duration::from_millis(80),
        max_attempts,
    }
}

/// Byte source yielding each of `parts` as one chunk.
pub fn chunks(parts: &[&[u8]]) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let parts: Vec<io::Result<Bytes>> = parts
        .iter()
        .map(|part| Ok(Bytes::copy_from_slice(part)))
        .collect();
    stream::iter(parts)
}

/// Byte source yielding `parts` and then failing with `kind`.
pub fn failing_after(
    parts: &[&[u8]],
    kind: io::ErrorKind,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let mut items: Vec<io::Result<Bytes>> = parts
        .iter()
        .map(|part| Ok(Bytes::copy_from_slice(part)))
        .collect();
    items.push(Err(io::Error::new(kind, "source failed")));
    stream::iter(items)
}
