//! Configuration for [`StreamingHandler`](super::StreamingHandler).

use std::time::Duration;

use crate::{registry::DEFAULT_SESSION_TIMEOUT, storage::StorageBackend};

/// Receiver-side settings.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use wirestream::{handler::HandlerConfig, storage::StorageBackend};
///
/// let config = HandlerConfig::default()
///     .with_timeout(Duration::from_secs(30))
///     .with_backend(StorageBackend::filesystem("/tmp/streams"));
/// assert_eq!(config.timeout(), Duration::from_secs(30));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerConfig {
    timeout: Duration,
    backend: StorageBackend,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SESSION_TIMEOUT,
            backend: StorageBackend::Memory,
        }
    }
}

impl HandlerConfig {
    /// Set the inactivity window after which idle sessions are evicted.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Select the storage backend for new sessions.
    #[must_use]
    pub fn with_backend(mut self, backend: StorageBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Configured inactivity window.
    #[must_use]
    pub const fn timeout(&self) -> Duration { self.timeout }

    /// Configured storage backend.
    #[must_use]
    pub const fn backend(&self) -> &StorageBackend { &self.backend }
}
