//! Per-entity change detection.
//!
//! Both detectors are owned by a single poller task and need no locking.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveTransition {
    WentLive,
    WentOffline,
}

/// Last known live flag per entity. An unseen entity counts as offline, so
/// the first observation only transitions when the entity is already live.
#[derive(Debug)]
pub struct LiveStateTracker<K> {
    states: HashMap<K, bool>,
}

impl<K: Eq + Hash + Clone> Default for LiveStateTracker<K> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> LiveStateTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while the entity has never been observed.
    pub fn state(&self, key: &K) -> Option<bool> {
        self.states.get(key).copied()
    }

    /// Record a successful observation and report the transition it causes.
    pub fn observe(&mut self, key: &K, live: bool) -> Option<LiveTransition> {
        let previous = self.states.insert(key.clone(), live).unwrap_or(false);
        match (previous, live) {
            (false, true) => Some(LiveTransition::WentLive),
            (true, false) => Some(LiveTransition::WentOffline),
            _ => None,
        }
    }
}

/// Latest delivered publish time (unix seconds) per entity.
#[derive(Debug)]
pub struct HighWaterMarks<K> {
    marks: HashMap<K, i64>,
}

impl<K: Eq + Hash + Clone> Default for HighWaterMarks<K> {
    fn default() -> Self {
        Self {
            marks: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> HighWaterMarks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, key: &K) -> Option<i64> {
        self.marks.get(key).copied()
    }

    /// Keep the items strictly newer than the entity's mark, in input order,
    /// then raise the mark to the newest timestamp seen. `seed` becomes the
    /// mark when the entity has none yet.
    pub fn admit<T, F>(&mut self, key: &K, seed: i64, items: Vec<T>, timestamp: F) -> Vec<T>
    where
        F: Fn(&T) -> i64,
    {
        let mark = *self.marks.entry(key.clone()).or_insert(seed);
        let newest = items.iter().map(&timestamp).max().unwrap_or(mark);
        let fresh = items.into_iter().filter(|i| timestamp(i) > mark).collect();
        self.marks.insert(key.clone(), mark.max(newest));
        fresh
    }
}
