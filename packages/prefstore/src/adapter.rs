//! Typed handles bound to one key of a store.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use prefstore_codec::{Codec, Entry, Storable};
use prefstore_core::{Key, Observer, Result, Store};

use crate::relay::{ChangeRelay, ChangeStream, Subscription};

type DefaultFn<T> = Box<dyn Fn() -> T + Send + Sync>;
type ChangeFn<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Behaviour switches for a [`StoreAdapter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Register the default into the store's registration domain at
    /// construction, and again after an optional value is cleared.
    pub register_default: bool,
    /// Follow changes made to the key by anyone else. Without this the cache
    /// only changes through [`StoreAdapter::set`] and [`StoreAdapter::refresh`].
    pub observe: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        AdapterOptions {
            register_default: true,
            observe: true,
        }
    }
}

/// A typed, cached view of one key in one store.
///
/// Reads come from a cache and never touch the store. Writes go through the
/// codec into the store and update the cache immediately. While observing,
/// changes made to the key by anyone else are decoded and pushed into the
/// cache and on to subscribers.
///
/// A value that is missing or fails to decode reads as the default
/// expression. The default is evaluated each time it is needed, not once,
/// but at most once per operation: when the adapter registers a default, the
/// registered value and the cached value come from the same evaluation.
///
/// Cloning the handle shares the same cache and subscribers. The store
/// observer is removed when the last clone is dropped.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use prefstore::{Key, MemoryStore, Store, StoreAdapter, Value};
///
/// let store = Arc::new(MemoryStore::new());
/// let volume: StoreAdapter<f64> = StoreAdapter::builder("volume", store.clone())
///     .default(42.0)
///     .build();
///
/// assert_eq!(volume.get(), 42.0);
///
/// volume.set(17.5).unwrap();
/// assert_eq!(store.get(&Key::from_static("volume")).unwrap(), Some(Value::Float(17.5)));
///
/// // Someone else clears the explicit value: back to the default.
/// store.remove(&Key::from_static("volume")).unwrap();
/// assert_eq!(volume.get(), 42.0);
/// ```
pub struct StoreAdapter<T: Storable, C: Codec<T> = <T as Storable>::Codec> {
    inner: Arc<AdapterInner<T, C>>,
}

struct AdapterInner<T, C> {
    key: Key,
    store: Arc<dyn Store>,
    codec: C,
    default: DefaultFn<T>,
    options: AdapterOptions,
    cached: RwLock<T>,
    relay: Arc<ChangeRelay<T>>,
    _on_change: Vec<Subscription>,
}

impl<T: Storable> StoreAdapter<T> {
    /// Start building an adapter for `key` using `T`'s default codec.
    pub fn builder(
        key: impl Into<Key>,
        store: Arc<dyn Store>,
    ) -> AdapterBuilder<T, T::Codec, NoDefault> {
        AdapterBuilder {
            key: key.into(),
            store,
            codec: T::Codec::default(),
            default: NoDefault,
            options: AdapterOptions::default(),
            on_change: Vec::new(),
            _value: PhantomData,
        }
    }
}

impl<T: Storable, C: Codec<T>> StoreAdapter<T, C> {
    /// The cached value.
    pub fn get(&self) -> T {
        self.inner.cache().clone()
    }

    /// Write `value` to the store.
    ///
    /// Subscribers are called once with the new value. Writing a value whose
    /// codec yields no entry, such as `None` for an optional, removes the key
    /// and the handle then reads as the default.
    ///
    /// On an encode error the store and the cache are left untouched.
    pub fn set(&self, value: T) -> Result<()> {
        self.inner.write(value)
    }

    /// Register the default unless the store holds an explicit value.
    pub fn register_default_if_absent(&self) -> Result<()> {
        self.inner.register_default_if_absent()
    }

    /// Re-read the store into the cache and return the new value.
    ///
    /// Subscribers are not called.
    pub fn refresh(&self) -> T {
        let value = self.inner.load();
        *self.inner.cache_mut() = value.clone();
        value
    }

    /// Call `callback` with the new value after every change.
    pub fn subscribe(
        &self,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.inner.relay.subscribe(callback)
    }

    /// Call `callback` after every change, without the value.
    pub fn subscribe_invalidation(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.inner.relay.subscribe_invalidation(callback)
    }

    /// New values as a channel.
    pub fn changes(&self) -> Result<ChangeStream<T>> {
        self.inner.relay.changes()
    }

    pub fn key(&self) -> &Key {
        &self.inner.key
    }

    pub fn options(&self) -> AdapterOptions {
        self.inner.options
    }

    pub fn relay(&self) -> &ChangeRelay<T> {
        &self.inner.relay
    }
}

impl<T: Storable, C: Codec<T>> AdapterInner<T, C> {
    fn cache(&self) -> RwLockReadGuard<'_, T> {
        self.cached.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.cached.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> T {
        load(&*self.store, &self.key, &self.codec, || (self.default)())
    }

    fn load_or(&self, fallback: T) -> T {
        load(&*self.store, &self.key, &self.codec, || fallback)
    }

    /// Replace the cache with the store's current value.
    ///
    /// The cache stays locked while reading, so a concurrent observer
    /// callback can only overwrite the result with a newer read.
    fn sync_cache(&self, fallback: T) {
        let mut cached = self.cache_mut();
        *cached = self.load_or(fallback);
    }

    fn write(&self, value: T) -> Result<()> {
        let entry = self.codec.encode(&value)?;

        let observing = self.relay.is_observing();
        if observing {
            self.relay.arm_echo_suppression();
        }
        let (written, fallback) = match entry {
            Entry::Present(stored) => (self.store.set(&self.key, stored), None),
            Entry::Absent => {
                let fallback = (self.default)();
                (self.clear(&fallback), Some(fallback))
            }
        };
        // No echo arrives when nothing changed in the store.
        if observing {
            self.relay.disarm_echo_suppression();
        }
        written?;

        let value = match fallback {
            // Whatever now resolves for the key: the default registered above,
            // or one registered by another handle.
            Some(fallback) => self.load_or(fallback),
            None => value,
        };
        *self.cache_mut() = value.clone();
        self.relay.publish(&value);
        Ok(())
    }

    fn clear(&self, fallback: &T) -> Result<()> {
        self.store.remove(&self.key)?;
        if self.options.register_default {
            self.register_default(fallback)?;
        }
        Ok(())
    }

    fn register_default_if_absent(&self) -> Result<()> {
        self.register_if_absent(&(self.default)())
    }

    fn register_if_absent(&self, fallback: &T) -> Result<()> {
        if self.store.has(&self.key)? {
            return Ok(());
        }
        self.register_default(fallback)
    }

    fn register_default(&self, fallback: &T) -> Result<()> {
        match self.codec.encode(fallback)? {
            Entry::Present(stored) => self.store.register_default(&self.key, stored),
            Entry::Absent => Ok(()),
        }
    }

    fn on_store_change(&self) {
        if self.relay.consume_echo() {
            return;
        }
        let value = self.load();
        *self.cache_mut() = value.clone();
        self.relay.publish(&value);
    }
}

fn load<T, C: Codec<T>>(store: &dyn Store, key: &Key, codec: &C, default: impl FnOnce() -> T) -> T {
    match store.get(key) {
        Ok(Some(stored)) => {
            let kind = stored.kind();
            codec.decode(stored).unwrap_or_else(|| {
                log::debug!("{}: stored {} does not decode, using default", key, kind);
                default()
            })
        }
        Ok(None) => default(),
        Err(error) => {
            log::warn!("{}: read failed, using default: {}", key, error);
            default()
        }
    }
}

impl<T: Storable, C: Codec<T>> Clone for StoreAdapter<T, C> {
    fn clone(&self) -> Self {
        StoreAdapter {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Storable + PartialEq, C: Codec<T>> PartialEq<T> for StoreAdapter<T, C> {
    fn eq(&self, other: &T) -> bool {
        *self.inner.cache() == *other
    }
}

impl<T: Storable + fmt::Debug, C: Codec<T>> fmt::Debug for StoreAdapter<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreAdapter")
            .field("key", &self.inner.key)
            .field("value", &*self.inner.cache())
            .field("options", &self.inner.options)
            .field("interest", &self.inner.relay.interest())
            .finish()
    }
}

/// Builder state before a default is chosen.
#[derive(Debug, Clone, Copy)]
pub struct NoDefault;

/// Builder state holding the default expression.
pub struct WithDefault<T>(DefaultFn<T>);

/// Configures and builds a [`StoreAdapter`].
///
/// A default is required: [`build`](AdapterBuilder::build) only exists once
/// [`default`](AdapterBuilder::default) or
/// [`default_with`](AdapterBuilder::default_with) has been called.
#[must_use]
pub struct AdapterBuilder<T, C, D> {
    key: Key,
    store: Arc<dyn Store>,
    codec: C,
    default: D,
    options: AdapterOptions,
    on_change: Vec<ChangeFn<T>>,
    _value: PhantomData<fn() -> T>,
}

impl<T: Storable, C: Codec<T>, D> AdapterBuilder<T, C, D> {
    /// Whether to register the default. Defaults to `true`.
    pub fn register_default(mut self, register: bool) -> Self {
        self.options.register_default = register;
        self
    }

    /// Whether to follow external changes. Defaults to `true`.
    pub fn observe(mut self, observe: bool) -> Self {
        self.options.observe = observe;
        self
    }

    pub fn options(mut self, options: AdapterOptions) -> Self {
        self.options = options;
        self
    }

    /// Call `callback` with the new value after every change, for the life of
    /// the adapter.
    pub fn on_change(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_change.push(Box::new(callback));
        self
    }

    /// Use `codec` instead of `T`'s default codec.
    pub fn codec<C2: Codec<T>>(self, codec: C2) -> AdapterBuilder<T, C2, D> {
        AdapterBuilder {
            key: self.key,
            store: self.store,
            codec,
            default: self.default,
            options: self.options,
            on_change: self.on_change,
            _value: PhantomData,
        }
    }
}

impl<T: Storable, C: Codec<T>> AdapterBuilder<T, C, NoDefault> {
    /// Use `value` whenever the key holds nothing usable.
    pub fn default(self, value: T) -> AdapterBuilder<T, C, WithDefault<T>> {
        self.default_with(move || value.clone())
    }

    /// Evaluate `default` whenever the key holds nothing usable.
    pub fn default_with(
        self,
        default: impl Fn() -> T + Send + Sync + 'static,
    ) -> AdapterBuilder<T, C, WithDefault<T>> {
        AdapterBuilder {
            key: self.key,
            store: self.store,
            codec: self.codec,
            default: WithDefault(Box::new(default)),
            options: self.options,
            on_change: self.on_change,
            _value: PhantomData,
        }
    }
}

impl<T: Storable, C: Codec<T>> AdapterBuilder<T, C, WithDefault<T>> {
    /// Read the current value, register the default and start observing, as
    /// configured.
    ///
    /// Never fails: store errors are logged and the adapter starts from the
    /// default.
    pub fn build(self) -> StoreAdapter<T, C> {
        let AdapterBuilder {
            key,
            store,
            codec,
            default: WithDefault(default),
            options,
            on_change,
            _value,
        } = self;

        let fallback = default();

        let inner = Arc::new_cyclic(|weak: &Weak<AdapterInner<T, C>>| {
            let observer = options.observe.then(|| store_observer(weak.clone()));
            let relay = Arc::new(ChangeRelay::new(key.clone(), Arc::clone(&store), observer));

            if options.observe {
                // Keeps the cache in sync while nobody else is subscribed.
                if let Err(error) = relay.add_notification_interest() {
                    log::warn!("{}: cannot observe store: {}", key, error);
                }
            }

            let on_change = on_change
                .into_iter()
                .filter_map(|callback| match relay.subscribe(callback) {
                    Ok(subscription) => Some(subscription),
                    Err(error) => {
                        log::warn!("{}: cannot attach change callback: {}", key, error);
                        None
                    }
                })
                .collect();

            AdapterInner {
                key,
                store,
                codec,
                default,
                options,
                cached: RwLock::new(fallback.clone()),
                relay,
                _on_change: on_change,
            }
        });

        if inner.options.register_default {
            if let Err(error) = inner.register_if_absent(&fallback) {
                log::error!("{}: cannot register default: {}", inner.key, error);
            }
        }

        // Changes that land before `new_cyclic` returns cannot reach the
        // adapter, so the first read happens only once the observer is live.
        inner.sync_cache(fallback);

        StoreAdapter { inner }
    }
}

fn store_observer<T: Storable, C: Codec<T>>(adapter: Weak<AdapterInner<T, C>>) -> Observer {
    Arc::new(move |_: &Key| {
        if let Some(adapter) = adapter.upgrade() {
            adapter.on_store_change();
        }
    })
}
