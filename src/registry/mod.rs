//! Registry of live stream sessions.
//!
//! `SessionRegistry` maps stream ids to their [`SegmentStore`] and evicts
//! sessions that stay idle for longer than the configured inactivity window.
//! Instead of one timer per session, all deadlines live in a single ordered
//! queue swept by one background task; resetting a session's timeout removes
//! its deadline and inserts a new one. Eviction is silent: the sender only
//! learns about it when its next submission is rejected as unknown.

use std::{
    sync::{Arc, Mutex, PoisonError, Weak},
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::{
    select,
    sync::Notify,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod deadline;

use deadline::DeadlineQueue;

use crate::{
    metrics,
    protocol::StreamId,
    storage::{SegmentStore, StoreError, StoreFactory},
};

/// Default inactivity window after which an idle session is evicted.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Concurrent registry of stream sessions keyed by [`StreamId`].
pub struct SessionRegistry {
    sessions: DashMap<StreamId, Arc<dyn SegmentStore>>,
    deadlines: Mutex<DeadlineQueue>,
    factory: Box<dyn StoreFactory>,
    timeout: Duration,
    rearmed: Arc<Notify>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Create a registry without a background sweeper.
    ///
    /// Expired sessions are only removed when
    /// [`purge_expired`](Self::purge_expired) or
    /// [`purge_expired_at`](Self::purge_expired_at) is called. Use
    /// [`spawn`](Self::spawn) to have eviction happen automatically.
    #[must_use]
    pub fn new(factory: impl StoreFactory + 'static, timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            deadlines: Mutex::new(DeadlineQueue::default()),
            factory: Box::new(factory),
            timeout,
            rearmed: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a registry and spawn its eviction sweeper on the current runtime.
    ///
    /// The sweeper stops when [`shutdown`](Self::shutdown) is called or the
    /// registry is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(factory: impl StoreFactory + 'static, timeout: Duration) -> Arc<Self> {
        let registry = Arc::new(Self::new(factory, timeout));
        tokio::spawn(sweep(
            Arc::downgrade(&registry),
            registry.rearmed.clone(),
            registry.shutdown.clone(),
        ));
        registry
    }

    /// Inactivity window applied to every session.
    #[must_use]
    pub const fn timeout(&self) -> Duration { self.timeout }

    /// Register a new session for `id`.
    ///
    /// Returns `false`, leaving the existing session untouched, if `id` is
    /// already registered.
    pub fn add(&self, id: StreamId) -> bool {
        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => {
                debug!(stream = %id, "session already exists");
                return false;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(self.factory.create(&id));
            }
        }
        self.arm(id.clone());
        metrics::inc_sessions();
        info!(stream = %id, "session registered");
        true
    }

    /// Look up the store of session `id`.
    #[must_use]
    pub fn get(&self, id: &StreamId) -> Option<Arc<dyn SegmentStore>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Remove session `id`, disarm its deadline and clear its storage.
    ///
    /// Returns `Ok(false)` when no such session exists, so repeated calls are
    /// harmless.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the session's storage cannot be cleared. The
    /// session is unregistered regardless.
    pub async fn delete(&self, id: &StreamId) -> Result<bool, StoreError> {
        let Some((_, store)) = self.sessions.remove(id) else {
            return Ok(false);
        };
        self.with_deadlines(|deadlines| deadlines.disarm(id));
        metrics::dec_sessions();
        debug!(stream = %id, "session removed");
        store.clear().await?;
        Ok(true)
    }

    /// Push the inactivity deadline of `id` a full window into the future.
    ///
    /// Returns `false` when `id` is not registered.
    pub fn reset_timeout(&self, id: &StreamId) -> bool {
        if !self.sessions.contains_key(id) {
            return false;
        }
        self.arm(id.clone());
        true
    }

    /// Evict every session whose deadline has passed.
    pub async fn purge_expired(&self) -> Vec<StreamId> { self.purge_expired_at(Instant::now()).await }

    /// Evict every session whose deadline is at or before `now`.
    ///
    /// Returns the ids that were evicted. A session re-armed by
    /// [`reset_timeout`](Self::reset_timeout) after its deadline was popped
    /// survives. Storage failures while clearing an evicted session are
    /// logged; the session is gone either way.
    pub async fn purge_expired_at(&self, now: Instant) -> Vec<StreamId> {
        let expired = self.with_deadlines(|deadlines| deadlines.pop_expired(now));
        let mut evicted = Vec::with_capacity(expired.len());
        for id in expired {
            // Checked under the shard lock, so a concurrent reset either lands
            // before removal and keeps the session, or finds it gone.
            let removed = self
                .sessions
                .remove_if(&id, |id, _| !self.with_deadlines(|deadlines| deadlines.is_armed(id)));
            let Some((_, store)) = removed else {
                debug!(stream = %id, "expired session was reset or removed");
                continue;
            };
            metrics::dec_sessions();
            if let Err(err) = store.clear().await {
                warn!(stream = %id, error = %err, "failed to clear evicted session");
            }
            info!(stream = %id, "session evicted after inactivity");
            metrics::inc_evictions();
            evicted.push(id);
        }
        evicted
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize { self.sessions.len() }

    /// Whether no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }

    /// Stop the background sweeper, if one was spawned.
    pub fn shutdown(&self) { self.shutdown.cancel(); }

    fn arm(&self, id: StreamId) {
        let deadline = Instant::now() + self.timeout;
        if self.with_deadlines(|deadlines| deadlines.arm(id, deadline)) {
            self.rearmed.notify_one();
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.with_deadlines(|deadlines| deadlines.next_deadline())
    }

    fn with_deadlines<R>(&self, f: impl FnOnce(&mut DeadlineQueue) -> R) -> R {
        let mut guard = self
            .deadlines
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) { self.shutdown.cancel(); }
}

/// Background task evicting sessions as their deadlines pass.
///
/// Holds only a weak reference between sweeps so it never keeps the registry
/// alive on its own.
async fn sweep(registry: Weak<SessionRegistry>, rearmed: Arc<Notify>, shutdown: CancellationToken) {
    loop {
        let next = match registry.upgrade() {
            Some(registry) => registry.next_deadline(),
            None => return,
        };
        select! {
            biased;

            () = shutdown.cancelled() => return,
            () = rearmed.notified() => continue,
            () = wait_until(next) => {}
        }
        let Some(registry) = registry.upgrade() else {
            return;
        };
        let evicted = registry.purge_expired().await;
        if !evicted.is_empty() {
            debug!(count = evicted.len(), remaining = registry.len(), "eviction sweep finished");
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
