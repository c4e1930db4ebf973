//! Slot arena tracking how far a stream is contiguous from index zero.
//!
//! Every recorded segment owns a slot holding its payload and a single-fire
//! release flag. Slots are released strictly in index order as the
//! continuity cursor advances, so a reader waiting on index `n` wakes only
//! once `0..=n` have all been recorded, whatever order they arrived in.
//! Dropping a slot (on [`Continuity::clear`]) closes its flag and wakes any
//! waiter with an error instead of leaving it parked forever.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Mutex, PoisonError},
};

use tokio::sync::watch;

use super::StoreError;
use crate::protocol::SegmentIndex;

#[derive(Debug)]
struct Slot<P> {
    payload: P,
    released: watch::Sender<bool>,
}

/// Continuity state for a single stream.
#[derive(Debug)]
pub(crate) struct Continuity<P> {
    slots: HashMap<SegmentIndex, Slot<P>>,
    cursor: Option<SegmentIndex>,
    terminal: Option<SegmentIndex>,
}

impl<P> Default for Continuity<P> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            cursor: None,
            terminal: None,
        }
    }
}

impl<P: Clone> Continuity<P> {
    /// Record `payload` at `index` and release every slot the cursor now covers.
    ///
    /// Re-recording an index replaces its payload but keeps its release flag,
    /// so waiters registered against the old payload are never orphaned.
    /// Returns the cursor after the update.
    pub(crate) fn record(
        &mut self,
        index: SegmentIndex,
        payload: P,
        done: bool,
    ) -> Option<SegmentIndex> {
        match self.slots.entry(index) {
            Entry::Occupied(mut occupied) => occupied.get_mut().payload = payload,
            Entry::Vacant(vacant) => {
                let (released, _) = watch::channel(false);
                vacant.insert(Slot { payload, released });
            }
        }
        if done {
            self.terminal = Some(index);
        }
        self.advance();
        self.cursor
    }

    fn advance(&mut self) {
        loop {
            let next = match self.cursor {
                None => SegmentIndex::zero(),
                Some(cursor) => match cursor.checked_next() {
                    Some(next) => next,
                    None => return,
                },
            };
            let Some(slot) = self.slots.get(&next) else {
                return;
            };
            slot.released.send_replace(true);
            self.cursor = Some(next);
        }
    }

    /// Subscribe to the release flag of `index`, if it was recorded.
    pub(crate) fn subscribe(&self, index: SegmentIndex) -> Option<watch::Receiver<bool>> {
        self.slots.get(&index).map(|slot| slot.released.subscribe())
    }

    /// Current payload of `index`, if it was recorded.
    pub(crate) fn payload(&self, index: SegmentIndex) -> Option<P> {
        self.slots.get(&index).map(|slot| slot.payload.clone())
    }

    /// Highest index such that every index up to it has been recorded.
    pub(crate) const fn cursor(&self) -> Option<SegmentIndex> { self.cursor }

    /// Index of the most recent segment flagged `done`.
    pub(crate) const fn terminal(&self) -> Option<SegmentIndex> { self.terminal }

    /// Drop every slot, returning the payloads that were held.
    pub(crate) fn clear(&mut self) -> Vec<(SegmentIndex, P)> {
        self.cursor = None;
        self.terminal = None;
        self.slots
            .drain()
            .map(|(index, slot)| (index, slot.payload))
            .collect()
    }
}

/// [`Continuity`] behind a lock, shared by the concrete stores.
///
/// The lock is only held for the synchronous bookkeeping; waiting on a slot
/// happens on the watch channel after the guard is released.
#[derive(Debug)]
pub(crate) struct SharedContinuity<P>(Mutex<Continuity<P>>);

impl<P> Default for SharedContinuity<P> {
    fn default() -> Self { Self(Mutex::new(Continuity::default())) }
}

impl<P: Clone> SharedContinuity<P> {
    /// Run `f` with exclusive access to the arena.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Continuity<P>) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Wait for `index` to be released and return its newest payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `index` was never recorded and
    /// [`StoreError::Cleared`] if the arena was cleared while waiting.
    pub(crate) async fn resolve(&self, index: SegmentIndex) -> Result<P, StoreError> {
        let mut released = self
            .with(|continuity| continuity.subscribe(index))
            .ok_or(StoreError::NotFound { index })?;
        if released.wait_for(|flag| *flag).await.is_err() {
            return Err(StoreError::Cleared { index });
        }
        self.with(|continuity| continuity.payload(index))
            .ok_or(StoreError::Cleared { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(value: u64) -> SegmentIndex { SegmentIndex::new(value) }

    #[test]
    fn cursor_starts_empty_and_advances_in_order() {
        let mut continuity = Continuity::default();
        assert_eq!(continuity.cursor(), None);
        assert_eq!(continuity.record(idx(0), 'a', false), Some(idx(0)));
        assert_eq!(continuity.record(idx(1), 'b', false), Some(idx(1)));
    }

    #[test]
    fn gap_holds_cursor_until_filled() {
        let mut continuity = Continuity::default();
        assert_eq!(continuity.record(idx(2), 'c', true), None);
        let waiter = continuity.subscribe(idx(2)).expect("slot recorded");
        assert!(!*waiter.borrow());

        assert_eq!(continuity.record(idx(0), 'a', false), Some(idx(0)));
        assert!(!*waiter.borrow());

        assert_eq!(continuity.record(idx(1), 'b', false), Some(idx(2)));
        assert!(*waiter.borrow());
        assert_eq!(continuity.terminal(), Some(idx(2)));
    }

    #[test]
    fn overwrite_after_release_keeps_slot_released() {
        let mut continuity = Continuity::default();
        continuity.record(idx(0), 'a', false);
        continuity.record(idx(0), 'z', false);

        let waiter = continuity.subscribe(idx(0)).expect("slot recorded");
        assert!(*waiter.borrow());
        assert_eq!(continuity.payload(idx(0)), Some('z'));
        assert_eq!(continuity.cursor(), Some(idx(0)));
    }

    #[test]
    fn clear_resets_state_and_returns_payloads() {
        let mut continuity = Continuity::default();
        continuity.record(idx(0), 'a', false);
        continuity.record(idx(1), 'b', true);

        let mut drained = continuity.clear();
        drained.sort_by_key(|(index, _)| *index);
        assert_eq!(drained, vec![(idx(0), 'a'), (idx(1), 'b')]);
        assert_eq!(continuity.cursor(), None);
        assert_eq!(continuity.terminal(), None);
        assert!(continuity.clear().is_empty());
    }

    #[tokio::test]
    async fn resolve_wakes_once_gap_fills() {
        let shared = std::sync::Arc::new(SharedContinuity::default());
        shared.with(|c| c.record(idx(1), "one", false));

        let waiter = tokio::spawn({
            let shared = shared.clone();
            async move { shared.resolve(idx(1)).await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        shared.with(|c| c.record(idx(0), "zero", false));
        let resolved = waiter.await.expect("join waiter").expect("resolved");
        assert_eq!(resolved, "one");
    }

    #[tokio::test]
    async fn resolve_reports_clear_to_waiters() {
        let shared = std::sync::Arc::new(SharedContinuity::default());
        shared.with(|c| c.record(idx(3), 3_u8, false));

        let waiter = tokio::spawn({
            let shared = shared.clone();
            async move { shared.resolve(idx(3)).await }
        });
        tokio::task::yield_now().await;
        shared.with(Continuity::clear);

        let err = waiter.await.expect("join waiter").expect_err("cleared");
        assert!(matches!(err, StoreError::Cleared { index } if index == idx(3)));
    }

    #[tokio::test]
    async fn resolve_unknown_index_is_not_found() {
        let shared: SharedContinuity<u8> = SharedContinuity::default();
        let err = shared.resolve(idx(0)).await.expect_err("never recorded");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
