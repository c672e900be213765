//! Deadline-ordered parking area for time-triggered tasks.

use std::collections::BTreeMap;
use std::time::Instant;

/// Entries ordered by deadline, ties broken by insertion order.
#[derive(Debug)]
pub(crate) struct TimerQueue<T> {
    entries: BTreeMap<(Instant, u64), T>,
    seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn push(&mut self, at: Instant, item: T) {
        self.entries.insert((at, self.seq), item);
        self.seq += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|&(at, _)| at)
    }

    /// Removes every entry due at `now`, earliest first.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            due.push(entry.remove());
        }
        due
    }

    /// Removes every entry matching `pred`, earliest first.
    pub fn extract_if(&mut self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        let keys: Vec<(Instant, u64)> = self
            .entries
            .iter()
            .filter(|(_, item)| pred(item))
            .map(|(key, _)| *key)
            .collect();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect()
    }

    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries).into_values().collect()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
