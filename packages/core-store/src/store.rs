//! The Store trait.

use std::sync::Arc;

use crate::{Key, Observer, ObserverId, Result, Value};

/// A mutable key-value preference store.
///
/// A store holds two layers per key:
///
/// - the **explicit** value, set with [`set`](Store::set) and cleared with
///   [`remove`](Store::remove);
/// - the **registered default**, set with
///   [`register_default`](Store::register_default). It is only visible through
///   [`get`](Store::get) while no explicit value exists, and it never makes
///   [`has`](Store::has) return `true`.
///
/// Clearing an explicit value therefore falls back to the registered default
/// rather than to "absent".
///
/// # Observation
///
/// Observers registered with [`observe`](Store::observe) are called after the
/// explicit value of their key changes (`set`, or `remove` of an existing
/// value). Implementations call observers after releasing internal locks and
/// on the mutating thread, in mutation order. Registering a default is not a
/// change.
///
/// # Object Safety
///
/// This trait is object-safe; stores are usually shared as `Arc<dyn Store>`.
pub trait Store: Send + Sync {
    /// Read the value for `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - The explicit value, or else the registered default.
    /// * `Ok(None)` - Neither exists.
    /// * `Err(Error)` - The store failed.
    fn get(&self, key: &Key) -> Result<Option<Value>>;

    /// Set the explicit value for `key`.
    fn set(&self, key: &Key, value: Value) -> Result<()>;

    /// Remove the explicit value for `key`. Removing a missing value is not an error.
    fn remove(&self, key: &Key) -> Result<()>;

    /// Whether an explicit value exists for `key`.
    fn has(&self, key: &Key) -> Result<bool>;

    /// Set the registered default for `key`, replacing any previous one.
    fn register_default(&self, key: &Key, value: Value) -> Result<()>;

    /// Register an observer for changes to `key`.
    fn observe(&self, key: &Key, observer: Observer) -> Result<ObserverId>;

    /// Remove an observer registration. Returns `false` if it did not exist.
    fn unobserve(&self, key: &Key, id: ObserverId) -> Result<bool>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        self.as_ref().get(key)
    }

    fn set(&self, key: &Key, value: Value) -> Result<()> {
        self.as_ref().set(key, value)
    }

    fn remove(&self, key: &Key) -> Result<()> {
        self.as_ref().remove(key)
    }

    fn has(&self, key: &Key) -> Result<bool> {
        self.as_ref().has(key)
    }

    fn register_default(&self, key: &Key, value: Value) -> Result<()> {
        self.as_ref().register_default(key, value)
    }

    fn observe(&self, key: &Key, observer: Observer) -> Result<ObserverId> {
        self.as_ref().observe(key, observer)
    }

    fn unobserve(&self, key: &Key, id: ObserverId) -> Result<bool> {
        self.as_ref().unobserve(key, id)
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        self.as_ref().get(key)
    }

    fn set(&self, key: &Key, value: Value) -> Result<()> {
        self.as_ref().set(key, value)
    }

    fn remove(&self, key: &Key) -> Result<()> {
        self.as_ref().remove(key)
    }

    fn has(&self, key: &Key) -> Result<bool> {
        self.as_ref().has(key)
    }

    fn register_default(&self, key: &Key, value: Value) -> Result<()> {
        self.as_ref().register_default(key, value)
    }

    fn observe(&self, key: &Key, observer: Observer) -> Result<ObserverId> {
        self.as_ref().observe(key, observer)
    }

    fn unobserve(&self, key: &Key, id: ObserverId) -> Result<bool> {
        self.as_ref().unobserve(key, id)
    }
}

/// Behavioural checks every [`Store`] implementation must pass.
///
/// Each function takes a factory so it can start from an empty store.
#[cfg(any(test, feature = "test-utils"))]
pub mod conformance {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    pub fn set_then_get<S: Store>(new_store: impl Fn() -> S) {
        let store = new_store();
        let key = Key::from_static("volume");

        assert_eq!(store.get(&key).unwrap(), None);
        assert!(!store.has(&key).unwrap());

        store.set(&key, Value::Float(17.5)).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(Value::Float(17.5)));
        assert!(store.has(&key).unwrap());

        store.set(&key, Value::Float(3.0)).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(Value::Float(3.0)));
    }

    pub fn remove_clears_explicit_value<S: Store>(new_store: impl Fn() -> S) {
        let store = new_store();
        let key = Key::from_static("name");

        store.set(&key, Value::from("Alice")).unwrap();
        store.remove(&key).unwrap();

        assert_eq!(store.get(&key).unwrap(), None);
        assert!(!store.has(&key).unwrap());

        // Removing again is fine.
        store.remove(&key).unwrap();
    }

    pub fn registered_default_is_a_fallback<S: Store>(new_store: impl Fn() -> S) {
        let store = new_store();
        let key = Key::from_static("dir");

        store.register_default(&key, Value::Integer(0)).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(Value::Integer(0)));
        assert!(!store.has(&key).unwrap());

        store.set(&key, Value::Integer(2)).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(Value::Integer(2)));

        store.remove(&key).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(Value::Integer(0)));
        assert!(!store.has(&key).unwrap());
    }

    pub fn observers_see_changes<S: Store>(new_store: impl Fn() -> S) {
        let store = new_store();
        let key = Key::from_static("watched");
        let other = Key::from_static("unwatched");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = store
            .observe(
                &key,
                Arc::new(move |k: &Key| sink.lock().unwrap().push(k.clone())),
            )
            .unwrap();

        store.set(&key, Value::Integer(1)).unwrap();
        store.set(&other, Value::Integer(1)).unwrap();
        store.register_default(&key, Value::Integer(5)).unwrap();
        store.remove(&key).unwrap();
        // Nothing left to remove: no change.
        store.remove(&key).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![key.clone(), key.clone()]);

        assert!(store.unobserve(&key, id).unwrap());
        assert!(!store.unobserve(&key, id).unwrap());

        store.set(&key, Value::Integer(2)).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    pub fn observers_may_read_the_store<S: Store + 'static>(new_store: impl Fn() -> S) {
        let store = Arc::new(new_store());
        let key = Key::from_static("reentrant");

        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let weak = Arc::downgrade(&store);
        store
            .observe(
                &key,
                Arc::new(move |k: &Key| {
                    if let Some(store) = weak.upgrade() {
                        assert!(store.get(k).unwrap().is_some());
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .unwrap();

        store.set(&key, Value::Bool(true)).unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }
}
