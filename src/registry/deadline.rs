//! Deadline-ordered queue of session inactivity timers.

use std::collections::{BTreeMap, HashMap};

use tokio::time::Instant;

use crate::protocol::StreamId;

/// One queue of inactivity deadlines shared by every session.
///
/// Entries are ordered by deadline, ties broken by arming order. Re-arming an
/// id removes its previous entry first, so each id appears at most once.
#[derive(Debug, Default)]
pub(crate) struct DeadlineQueue {
    by_deadline: BTreeMap<(Instant, u64), StreamId>,
    by_id: HashMap<StreamId, (Instant, u64)>,
    next_seq: u64,
}

impl DeadlineQueue {
    /// Arm (or re-arm) `id` to expire at `deadline`.
    ///
    /// Returns `true` when `deadline` became the earliest in the queue, which
    /// means a sleeping sweeper should recompute its wake-up time.
    pub(crate) fn arm(&mut self, id: StreamId, deadline: Instant) -> bool {
        self.disarm(&id);
        let key = (deadline, self.next_seq);
        self.next_seq = self.next_seq.wrapping_add(1);
        self.by_id.insert(id.clone(), key);
        self.by_deadline.insert(key, id);
        self.by_deadline
            .first_key_value()
            .is_some_and(|(first, _)| *first == key)
    }

    /// Remove the deadline of `id`. Returns whether one was armed.
    pub(crate) fn disarm(&mut self, id: &StreamId) -> bool {
        match self.by_id.remove(id) {
            Some(key) => {
                self.by_deadline.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Whether `id` currently has a deadline.
    pub(crate) fn is_armed(&self, id: &StreamId) -> bool { self.by_id.contains_key(id) }

    /// Earliest armed deadline.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline
            .first_key_value()
            .map(|((deadline, _), _)| *deadline)
    }

    /// Remove and return every id whose deadline is at or before `now`.
    pub(crate) fn pop_expired(&mut self, now: Instant) -> Vec<StreamId> {
        let mut expired = Vec::new();
        while let Some(entry) = self.by_deadline.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let id = entry.remove();
            self.by_id.remove(&id);
            expired.push(id);
        }
        expired
    }

    /// Number of armed deadlines.
    pub(crate) fn len(&self) -> usize { self.by_id.len() }
}
