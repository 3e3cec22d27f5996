//! Per-key observer bookkeeping shared by store implementations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::Key;

/// Callback invoked after the value behind a key changes.
///
/// The callback only receives the key; observers read the new value back from
/// the store themselves.
pub type Observer = Arc<dyn Fn(&Key) + Send + Sync>;

/// Handle identifying one observer registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Observer registrations grouped by key.
///
/// Stores keep this behind their own lock and take a [`snapshot`] of the
/// affected observers while locked, then call [`dispatch`] after releasing the
/// lock. Observers are therefore free to read from the store they observe.
///
/// [`snapshot`]: ObserverTable::snapshot
#[derive(Default)]
pub struct ObserverTable {
    next_id: u64,
    by_key: HashMap<Key, Vec<(ObserverId, Observer)>>,
}

impl ObserverTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` for `key`.
    pub fn insert(&mut self, key: &Key, observer: Observer) -> ObserverId {
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        self.by_key
            .entry(key.clone())
            .or_default()
            .push((id, observer));
        id
    }

    /// Remove a registration. Returns `false` if it did not exist.
    pub fn remove(&mut self, key: &Key, id: ObserverId) -> bool {
        let Some(entries) = self.by_key.get_mut(key) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.by_key.remove(key);
        }
        removed
    }

    /// Observers currently registered for `key`, in registration order.
    pub fn snapshot(&self, key: &Key) -> Vec<Observer> {
        self.by_key
            .get(key)
            .map(|entries| entries.iter().map(|(_, o)| Arc::clone(o)).collect())
            .unwrap_or_default()
    }

    /// Number of registrations for `key`.
    pub fn count(&self, key: &Key) -> usize {
        self.by_key.get(key).map_or(0, Vec::len)
    }

    /// Total number of registrations across all keys.
    pub fn len(&self) -> usize {
        self.by_key.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl fmt::Debug for ObserverTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .by_key
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("ObserverTable")
            .field("next_id", &self.next_id)
            .field("observers", &counts)
            .finish()
    }
}

/// Call each observer in order with `key`.
///
/// Must be called without holding the lock that guards the table.
pub fn dispatch(observers: Vec<Observer>, key: &Key) {
    for observer in observers {
        observer(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<AtomicUsize>, Observer) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let observer: Observer = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (hits, observer)
    }

    #[test]
    fn ids_are_unique_per_table() {
        let mut table = ObserverTable::new();
        let key = Key::from_static("a");
        let (_, o) = counting();

        let first = table.insert(&key, Arc::clone(&o));
        let second = table.insert(&key, o);

        assert_ne!(first, second);
        assert_eq!(table.count(&key), 2);
    }

    #[test]
    fn remove_only_drops_matching_registration() {
        let mut table = ObserverTable::new();
        let key = Key::from_static("a");
        let (hits, o) = counting();

        let first = table.insert(&key, Arc::clone(&o));
        let _second = table.insert(&key, o);

        assert!(table.remove(&key, first));
        assert!(!table.remove(&key, first));

        dispatch(table.snapshot(&key), &key);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removing_last_observer_forgets_key() {
        let mut table = ObserverTable::new();
        let key = Key::from_static("a");
        let (_, o) = counting();

        let id = table.insert(&key, o);
        assert!(table.remove(&key, id));

        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn snapshot_of_unknown_key_is_empty() {
        let table = ObserverTable::new();
        assert!(table.snapshot(&Key::from_static("nope")).is_empty());
    }
}
