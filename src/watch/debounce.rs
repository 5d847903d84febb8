// src/watch/debounce.rs

//! Per-key debouncing of bursty events.
//!
//! [`DebounceTable`] is a plain data structure: it knows nothing about timers
//! or tasks. Callers feed it events with the current [`Instant`], sleep until
//! [`DebounceTable::next_deadline`], then collect whatever is due. A new
//! event for a key that is still pending replaces the old one and restarts
//! its quiet window, so a burst collapses to its last event.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct Pending<V> {
    value: V,
    due: Instant,
}

#[derive(Debug)]
pub struct DebounceTable<K, V> {
    quiet: Duration,
    pending: HashMap<K, Pending<V>>,
}

impl<K: Eq + Hash + Clone, V> DebounceTable<K, V> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: HashMap::new(),
        }
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet
    }

    /// Record an event for `key`, replacing any pending one.
    ///
    /// Returns the value that was displaced, if any.
    pub fn schedule(&mut self, key: K, value: V, now: Instant) -> Option<V> {
        let due = now + self.quiet;
        self.pending
            .insert(key, Pending { value, due })
            .map(|old| old.value)
    }

    /// Earliest deadline among pending entries.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.due).min()
    }

    /// Remove and return every entry whose quiet window has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, V)> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(k, _)| k.clone())
            .collect();
        due.into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (k, p.value)))
            .collect()
    }

    /// Remove and return everything, due or not.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        self.pending.drain().map(|(k, p)| (k, p.value)).collect()
    }

    /// Drop everything still pending; returns how many entries were dropped.
    pub fn discard(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
