use crate::store::Entry;
use std::collections::HashMap;

/// The key → entry mapping.
///
/// Provides no locking of its own: the storage engine wraps it in the single
/// keyspace mutex, and no entry handle ever escapes that critical section.
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: HashMap<String, Entry>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: String, entry: Entry) -> Option<Entry> {
        self.entries.insert(key, entry)
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.entries.iter()
    }

    /// Removes `key` if its expiry is strictly past.
    ///
    /// Returns whether a purge happened: DELETE reports 1 for an entry that
    /// existed but was found expired, so callers need the distinction from
    /// "was never there".
    pub fn purge_expired(&mut self, key: &str, now: f64) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Removes every expired entry; returns how many were dropped.
    pub fn sweep(&mut self, now: f64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    /// Replaces the whole keyspace, e.g. after loading a snapshot.
    pub fn replace_all(&mut self, entries: HashMap<String, Entry>) {
        self.entries = entries;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
