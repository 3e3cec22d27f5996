//! Change fan-out for one key.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use prefstore_core::{Key, Observer, ObserverId, Result, Store};

/// Which kinds of subscriber a relay currently serves.
///
/// Notification subscribers receive the new value; invalidation subscribers
/// only learn that something changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interest {
    #[default]
    None,
    NotificationOnly,
    InvalidationOnly,
    Both,
}

impl Interest {
    pub fn with_notification(self) -> Self {
        match self {
            Interest::None | Interest::NotificationOnly => Interest::NotificationOnly,
            Interest::InvalidationOnly | Interest::Both => Interest::Both,
        }
    }

    pub fn with_invalidation(self) -> Self {
        match self {
            Interest::None | Interest::InvalidationOnly => Interest::InvalidationOnly,
            Interest::NotificationOnly | Interest::Both => Interest::Both,
        }
    }

    pub fn without_notification(self) -> Self {
        match self {
            Interest::None | Interest::NotificationOnly => Interest::None,
            Interest::InvalidationOnly | Interest::Both => Interest::InvalidationOnly,
        }
    }

    pub fn without_invalidation(self) -> Self {
        match self {
            Interest::None | Interest::InvalidationOnly => Interest::None,
            Interest::NotificationOnly | Interest::Both => Interest::NotificationOnly,
        }
    }

    pub fn is_none(self) -> bool {
        self == Interest::None
    }
}

/// Handle identifying one subscriber of a relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SubscriberKind {
    Notification,
    Invalidation,
}

type Notify<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Invalidate = Arc<dyn Fn() + Send + Sync>;

struct RelayState<T> {
    interest: Interest,
    notification_refs: usize,
    invalidation_refs: usize,
    registration: Option<ObserverId>,
    next_id: u64,
    notification: Vec<(SubscriberId, Notify<T>)>,
    invalidation: Vec<(SubscriberId, Invalidate)>,
}

impl<T> RelayState<T> {
    fn new() -> Self {
        RelayState {
            interest: Interest::None,
            notification_refs: 0,
            invalidation_refs: 0,
            registration: None,
            next_id: 0,
            notification: Vec::new(),
            invalidation: Vec::new(),
        }
    }

    fn next_id(&mut self) -> SubscriberId {
        self.next_id += 1;
        SubscriberId(self.next_id)
    }

    fn increment(&mut self, kind: SubscriberKind) {
        match kind {
            SubscriberKind::Notification => {
                self.notification_refs += 1;
                if self.notification_refs == 1 {
                    self.interest = self.interest.with_notification();
                }
            }
            SubscriberKind::Invalidation => {
                self.invalidation_refs += 1;
                if self.invalidation_refs == 1 {
                    self.interest = self.interest.with_invalidation();
                }
            }
        }
    }

    fn decrement(&mut self, kind: SubscriberKind) {
        match kind {
            SubscriberKind::Notification if self.notification_refs > 0 => {
                self.notification_refs -= 1;
                if self.notification_refs == 0 {
                    self.interest = self.interest.without_notification();
                }
            }
            SubscriberKind::Invalidation if self.invalidation_refs > 0 => {
                self.invalidation_refs -= 1;
                if self.invalidation_refs == 0 {
                    self.interest = self.interest.without_invalidation();
                }
            }
            _ => {}
        }
    }
}

/// Fans changes of one key out to subscribers.
///
/// Interest is reference counted per kind. The relay registers its store
/// observer when interest goes from [`Interest::None`] to anything else and
/// removes it when interest drops back to `None`, so the store sees at most
/// one registration per relay however many subscribers there are.
///
/// A relay built without a store observer is detached: interest is still
/// counted and [`publish`](ChangeRelay::publish) still fans out, but the store
/// is never observed.
///
/// The echo flag lets an owner swallow the store callback caused by its own
/// write. It is one-shot: the first [`consume_echo`](ChangeRelay::consume_echo)
/// after arming returns `true` and clears it.
pub struct ChangeRelay<T> {
    key: Key,
    store: Arc<dyn Store>,
    observer: Option<Observer>,
    state: Mutex<RelayState<T>>,
    suppress_echo: AtomicBool,
}

impl<T: Send + Sync + 'static> ChangeRelay<T> {
    pub fn new(key: Key, store: Arc<dyn Store>, observer: Option<Observer>) -> Self {
        ChangeRelay {
            key,
            store,
            observer,
            state: Mutex::new(RelayState::new()),
            suppress_echo: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn interest(&self) -> Interest {
        self.state().interest
    }

    /// Whether the store observer is currently registered.
    pub fn is_observing(&self) -> bool {
        self.state().registration.is_some()
    }

    pub fn add_notification_interest(&self) -> Result<()> {
        self.acquire(SubscriberKind::Notification)
    }

    pub fn add_invalidation_interest(&self) -> Result<()> {
        self.acquire(SubscriberKind::Invalidation)
    }

    pub fn remove_notification_interest(&self) {
        let mut state = self.state();
        self.release(&mut state, SubscriberKind::Notification);
    }

    pub fn remove_invalidation_interest(&self) {
        let mut state = self.state();
        self.release(&mut state, SubscriberKind::Invalidation);
    }

    /// Register a callback receiving every published value.
    ///
    /// The subscriber stays registered until the returned [`Subscription`]
    /// is dropped.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        let mut state = self.state();
        self.acquire_locked(&mut state, SubscriberKind::Notification)?;
        let id = state.next_id();
        state.notification.push((id, Arc::new(callback)));
        drop(state);
        Ok(Subscription::new(self, id, SubscriberKind::Notification))
    }

    /// Register a callback that is told a change happened, without the value.
    pub fn subscribe_invalidation(
        self: &Arc<Self>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<Subscription> {
        let mut state = self.state();
        self.acquire_locked(&mut state, SubscriberKind::Invalidation)?;
        let id = state.next_id();
        state.invalidation.push((id, Arc::new(callback)));
        drop(state);
        Ok(Subscription::new(self, id, SubscriberKind::Invalidation))
    }

    /// Published values as a channel.
    pub fn changes(self: &Arc<Self>) -> Result<ChangeStream<T>>
    where
        T: Clone,
    {
        let (sender, receiver) = mpsc::channel();
        let subscription = self.subscribe(move |value: &T| {
            // The stream may have been dropped while this callback was queued.
            let _ = sender.send(value.clone());
        })?;
        Ok(ChangeStream {
            receiver,
            subscription,
        })
    }

    /// Call every subscriber: notification subscribers with `value`, then
    /// invalidation subscribers.
    pub fn publish(&self, value: &T) {
        let (notify, invalidate): (Vec<Notify<T>>, Vec<Invalidate>) = {
            let state = self.state();
            (
                state.notification.iter().map(|(_, f)| Arc::clone(f)).collect(),
                state.invalidation.iter().map(|(_, f)| Arc::clone(f)).collect(),
            )
        };
        for callback in notify {
            callback(value);
        }
        for callback in invalidate {
            callback();
        }
    }

    pub fn arm_echo_suppression(&self) {
        self.suppress_echo.store(true, Ordering::SeqCst);
    }

    pub fn disarm_echo_suppression(&self) {
        self.suppress_echo.store(false, Ordering::SeqCst);
    }

    /// Returns `true`, once, if echo suppression was armed.
    pub fn consume_echo(&self) -> bool {
        self.suppress_echo.swap(false, Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, RelayState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self, kind: SubscriberKind) -> Result<()> {
        let mut state = self.state();
        self.acquire_locked(&mut state, kind)
    }

    fn acquire_locked(&self, state: &mut RelayState<T>, kind: SubscriberKind) -> Result<()> {
        let before = state.interest;
        state.increment(kind);
        if before.is_none() && !state.interest.is_none() {
            if let Err(error) = self.attach(state) {
                state.decrement(kind);
                return Err(error);
            }
        }
        Ok(())
    }

    fn release(&self, state: &mut RelayState<T>, kind: SubscriberKind) {
        let before = state.interest;
        state.decrement(kind);
        if !before.is_none() && state.interest.is_none() {
            self.detach(state);
        }
    }

    fn attach(&self, state: &mut RelayState<T>) -> Result<()> {
        if let Some(observer) = &self.observer {
            let id = self.store.observe(&self.key, Arc::clone(observer))?;
            log::debug!("{}: registered store observer {}", self.key, id);
            state.registration = Some(id);
        }
        Ok(())
    }

    fn detach(&self, state: &mut RelayState<T>) {
        if let Some(id) = state.registration.take() {
            unobserve(&*self.store, &self.key, id);
        }
    }
}

fn unobserve(store: &dyn Store, key: &Key, id: ObserverId) {
    match store.unobserve(key, id) {
        Ok(_) => log::debug!("{}: removed store observer {}", key, id),
        Err(error) => log::warn!("{}: failed to remove store observer {}: {}", key, id, error),
    }
}

impl<T> Drop for ChangeRelay<T> {
    fn drop(&mut self) {
        let registration = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .registration
            .take();
        if let Some(id) = registration {
            unobserve(&*self.store, &self.key, id);
        }
    }
}

impl<T> fmt::Debug for ChangeRelay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ChangeRelay")
            .field("key", &self.key)
            .field("interest", &state.interest)
            .field("notification_refs", &state.notification_refs)
            .field("invalidation_refs", &state.invalidation_refs)
            .field("registration", &state.registration)
            .finish()
    }
}

trait Detach: Send + Sync {
    fn detach_subscriber(&self, id: SubscriberId, kind: SubscriberKind);
}

impl<T: Send + Sync + 'static> Detach for ChangeRelay<T> {
    fn detach_subscriber(&self, id: SubscriberId, kind: SubscriberKind) {
        let mut state = self.state();
        let removed = match kind {
            SubscriberKind::Notification => remove_subscriber(&mut state.notification, id),
            SubscriberKind::Invalidation => remove_subscriber(&mut state.invalidation, id),
        };
        if removed {
            self.release(&mut state, kind);
        }
    }
}

fn remove_subscriber<F>(subscribers: &mut Vec<(SubscriberId, F)>, id: SubscriberId) -> bool {
    let before = subscribers.len();
    subscribers.retain(|(existing, _)| *existing != id);
    subscribers.len() != before
}

/// Keeps a subscriber registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    relay: Weak<dyn Detach>,
    id: SubscriberId,
    kind: SubscriberKind,
}

impl Subscription {
    fn new<T: Send + Sync + 'static>(
        relay: &Arc<ChangeRelay<T>>,
        id: SubscriberId,
        kind: SubscriberKind,
    ) -> Self {
        let weak: Weak<ChangeRelay<T>> = Arc::downgrade(relay);
        let relay: Weak<dyn Detach> = weak;
        Subscription { relay, id, kind }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(relay) = self.relay.upgrade() {
            relay.detach_subscriber(self.id, self.kind);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Published values delivered through a channel instead of a callback.
///
/// Values queue up until read. Dropping the stream unsubscribes.
pub struct ChangeStream<T> {
    receiver: mpsc::Receiver<T>,
    subscription: Subscription,
}

impl<T> ChangeStream<T> {
    /// Next queued value, without blocking.
    pub fn try_next(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next value.
    pub fn next_timeout(&self, timeout: Duration) -> Option<T> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Every queued value, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

impl<T> fmt::Debug for ChangeStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeStream")
            .field("subscription", &self.subscription)
            .finish()
    }
}
