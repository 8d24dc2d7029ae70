//! Registry of locks currently held by this process.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Set of lock names held by this process, used for shutdown cleanup.
///
/// Entries are keyed strictly by lock name. Every `add` hands out a
/// registration id, and `remove` only drops the entry carrying that id. A
/// guard that outlived a [`drain`](Self::drain) therefore cannot deregister a
/// newer holder of the same name.
#[derive(Debug, Default)]
pub struct ActiveLocks {
    held: Mutex<Held>,
}

#[derive(Debug, Default)]
struct Held {
    next_id: u64,
    entries: HashMap<String, Vec<u64>>,
}

impl ActiveLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `key` was acquired and returns its registration id.
    pub fn add(&self, key: &str) -> u64 {
        let mut held = self.held.lock();
        held.next_id += 1;
        let id = held.next_id;
        held.entries.entry(key.to_string()).or_default().push(id);
        id
    }

    /// Records that registration `id` of `key` was released.
    ///
    /// Returns `false` if that registration is not held, for example because
    /// the registry was drained in between.
    pub fn remove(&self, key: &str, id: u64) -> bool {
        let mut held = self.held.lock();
        let Some(ids) = held.entries.get_mut(key) else {
            return false;
        };
        let Some(pos) = ids.iter().position(|held_id| *held_id == id) else {
            return false;
        };
        ids.swap_remove(pos);
        if ids.is_empty() {
            held.entries.remove(key);
        }
        true
    }

    /// Returns the distinct names currently held.
    pub fn snapshot(&self) -> Vec<String> {
        self.held.lock().entries.keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.held.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.held.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.lock().entries.is_empty()
    }

    /// Forgets every entry, returning the names that were held.
    pub fn drain(&self) -> Vec<String> {
        self.held.lock().entries.drain().map(|(key, _)| key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_by_name() {
        let locks = ActiveLocks::new();
        let a = locks.add("a");
        locks.add("b");
        assert!(locks.contains("a"));
        assert_eq!(locks.len(), 2);

        assert!(locks.remove("a", a));
        assert!(!locks.contains("a"));
        assert!(!locks.remove("a", a));
        assert_eq!(locks.snapshot(), vec!["b".to_string()]);
    }

    #[test]
    fn repeated_adds_need_matching_removes() {
        let locks = ActiveLocks::new();
        let first = locks.add("jobs");
        let second = locks.add("jobs");
        assert_ne!(first, second);
        assert_eq!(locks.len(), 1);

        assert!(locks.remove("jobs", first));
        assert!(locks.contains("jobs"));
        assert!(locks.remove("jobs", second));
        assert!(locks.is_empty());
    }

    #[test]
    fn stale_registration_cannot_remove_newer_holder() {
        let locks = ActiveLocks::new();
        let stale = locks.add("jobs");
        locks.drain();
        let current = locks.add("jobs");

        assert!(!locks.remove("jobs", stale));
        assert!(locks.contains("jobs"));
        assert!(locks.remove("jobs", current));
        assert!(locks.is_empty());
    }

    #[test]
    fn drain_empties_the_registry() {
        let locks = ActiveLocks::new();
        locks.add("x");
        locks.add("y");
        let mut drained = locks.drain();
        drained.sort();
        assert_eq!(drained, vec!["x".to_string(), "y".to_string()]);
        assert!(locks.is_empty());
    }
}
