//! In-memory store with a registration domain.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use crate::observers::{dispatch, ObserverTable};
use crate::{Error, Key, Observer, ObserverId, Result, Store, Value};

/// The two value layers of a store: explicit values and registered defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Domains {
    pub values: BTreeMap<Key, Value>,
    pub registered: BTreeMap<Key, Value>,
}

impl Domains {
    /// Explicit value, else registered default.
    pub fn resolve(&self, key: &Key) -> Option<&Value> {
        self.values.get(key).or_else(|| self.registered.get(key))
    }
}

/// A process-local [`Store`] keeping everything in memory.
///
/// # Example
///
/// ```rust
/// use prefstore_core::{Key, MemoryStore, Store, Value};
///
/// let store = MemoryStore::new();
/// let key = Key::from_static("volume");
///
/// store.register_default(&key, Value::Float(42.0)).unwrap();
/// assert_eq!(store.get(&key).unwrap(), Some(Value::Float(42.0)));
///
/// store.set(&key, Value::Float(17.5)).unwrap();
/// store.remove(&key).unwrap();
///
/// // Back to the registered default.
/// assert_eq!(store.get(&key).unwrap(), Some(Value::Float(42.0)));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    domains: RwLock<Domains>,
    observers: Mutex<ObserverTable>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with initial explicit values.
    pub fn with_values(values: BTreeMap<Key, Value>) -> Self {
        Self {
            domains: RwLock::new(Domains {
                values,
                registered: BTreeMap::new(),
            }),
            observers: Mutex::new(ObserverTable::new()),
        }
    }

    /// The registered default for `key`, ignoring any explicit value.
    pub fn registered_default(&self, key: &Key) -> Result<Option<Value>> {
        let domains = self
            .domains
            .read()
            .map_err(|_| Error::poisoned("memory store"))?;
        Ok(domains.registered.get(key).cloned())
    }

    /// Copy of both value layers.
    pub fn snapshot(&self) -> Result<Domains> {
        let domains = self
            .domains
            .read()
            .map_err(|_| Error::poisoned("memory store"))?;
        Ok(domains.clone())
    }

    /// Drop every explicit value, notifying observers of each removed key.
    ///
    /// Registered defaults survive, so every key reads back as its factory
    /// default afterwards.
    pub fn reset(&self) -> Result<()> {
        let removed: Vec<Key> = {
            let mut domains = self
                .domains
                .write()
                .map_err(|_| Error::poisoned("memory store"))?;
            std::mem::take(&mut domains.values).into_keys().collect()
        };
        for key in &removed {
            self.notify(key)?;
        }
        Ok(())
    }

    /// Number of observers registered for `key`.
    pub fn observer_count(&self, key: &Key) -> usize {
        self.observers
            .lock()
            .map(|table| table.count(key))
            .unwrap_or_default()
    }

    fn notify(&self, key: &Key) -> Result<()> {
        let observers = self
            .observers
            .lock()
            .map_err(|_| Error::poisoned("observer table"))?
            .snapshot(key);
        dispatch(observers, key);
        Ok(())
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        let domains = self
            .domains
            .read()
            .map_err(|_| Error::poisoned("memory store"))?;
        Ok(domains.resolve(key).cloned())
    }

    fn set(&self, key: &Key, value: Value) -> Result<()> {
        {
            let mut domains = self
                .domains
                .write()
                .map_err(|_| Error::poisoned("memory store"))?;
            domains.values.insert(key.clone(), value);
        }
        self.notify(key)
    }

    fn remove(&self, key: &Key) -> Result<()> {
        let existed = {
            let mut domains = self
                .domains
                .write()
                .map_err(|_| Error::poisoned("memory store"))?;
            domains.values.remove(key).is_some()
        };
        if existed {
            self.notify(key)?;
        }
        Ok(())
    }

    fn has(&self, key: &Key) -> Result<bool> {
        let domains = self
            .domains
            .read()
            .map_err(|_| Error::poisoned("memory store"))?;
        Ok(domains.values.contains_key(key))
    }

    fn register_default(&self, key: &Key, value: Value) -> Result<()> {
        let mut domains = self
            .domains
            .write()
            .map_err(|_| Error::poisoned("memory store"))?;
        domains.registered.insert(key.clone(), value);
        Ok(())
    }

    fn observe(&self, key: &Key, observer: Observer) -> Result<ObserverId> {
        let mut table = self
            .observers
            .lock()
            .map_err(|_| Error::poisoned("observer table"))?;
        Ok(table.insert(key, observer))
    }

    fn unobserve(&self, key: &Key, id: ObserverId) -> Result<bool> {
        let mut table = self
            .observers
            .lock()
            .map_err(|_| Error::poisoned("observer table"))?;
        Ok(table.remove(key, id))
    }
}
