//! The capability shared by every store: a pure reducer over a private
//! state, read access to that state, and change subscriptions.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::actions::Action;

/// Handle returned by [`Store::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Something the [`Dispatcher`](crate::Dispatcher) can deliver actions to.
///
/// Implementations must not block on I/O or call back into the dispatcher.
pub trait Reducer: Send + Sync {
    fn on_dispatch(&self, action: &Action);

    /// Return to the blank state and drop all listeners.
    fn reset(&self);
}

pub trait Store: Reducer {
    type State: Clone;

    /// Compute the next state. Must be free of side effects.
    fn reduce(&self, state: Self::State, action: &Action) -> Self::State;

    /// A snapshot of the current state.
    fn state(&self) -> Self::State;

    fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// State cell plus listener registry, owned by each concrete store.
pub(crate) struct StoreCore<T> {
    state: Mutex<T>,
    listeners: Mutex<BTreeMap<SubscriptionId, Listener>>,
    next_subscription: AtomicU64,
}

impl<T> StoreCore<T>
where
    T: Clone + PartialEq,
{
    pub(crate) fn new(initial: T) -> Self {
        Self {
            state: Mutex::new(initial),
            listeners: Mutex::new(BTreeMap::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    pub(crate) fn get(&self) -> T {
        self.lock_state().clone()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock_state())
    }

    /// Replace the state with `f(state)`; listeners run only on a real change,
    /// after the state lock has been released.
    pub(crate) fn apply(&self, f: impl FnOnce(T) -> T) {
        let changed = {
            let mut state = self.lock_state();
            let next = f(state.clone());
            if next == *state {
                false
            } else {
                *state = next;
                true
            }
        };

        if changed {
            self.notify();
        }
    }

    pub(crate) fn reset(&self, blank: T) {
        *self.lock_state() = blank;
        self.lock_listeners().clear();
    }

    pub(crate) fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.lock_listeners().insert(id, listener);
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock_listeners().remove(&id).is_some()
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self.lock_listeners().values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    // state stays consistent even if a listener panicked mid-notify, so
    // poisoning carries no information here
    fn lock_state(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, BTreeMap<SubscriptionId, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
