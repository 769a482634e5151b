//! Ordered, synchronous broadcast of [`Action`]s to registered reducers.
//!
//! A dispatch runs every reducer to completion before the next dispatch is
//! admitted. Dispatches from other threads wait their turn; a dispatch issued
//! from inside a reducer or store listener on the same thread is rejected.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, ThreadId},
};

use crate::{actions::Action, store::Reducer};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("cannot dispatch {action} while another action is being reduced")]
    Reentrant { action: String },
}

#[derive(Default)]
pub struct Dispatcher {
    reducers: Mutex<Vec<Arc<dyn Reducer>>>,
    /// Held for the duration of one reducer pass.
    serial: Mutex<()>,
    /// Thread currently running a reducer pass.
    in_flight: Mutex<Option<ThreadId>>,
    torn_down: AtomicBool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("reducers", &lock(&self.reducers).len())
            .field("torn_down", &self.torn_down.load(Ordering::SeqCst))
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reducers receive actions in registration order.
    pub fn register(&self, reducer: Arc<dyn Reducer>) {
        lock(&self.reducers).push(reducer);
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    #[tracing::instrument(skip_all, fields(?action))]
    pub fn dispatch(&self, action: Action) -> Result<(), DispatchError> {
        if self.is_torn_down() {
            tracing::debug!("dispatcher torn down, dropping late action");
            return Ok(());
        }

        let current = thread::current().id();
        if *lock(&self.in_flight) == Some(current) {
            tracing::warn!("rejecting re-entrant dispatch");
            return Err(DispatchError::Reentrant {
                action: format!("{action:?}"),
            });
        }

        let _serial = lock(&self.serial);
        // teardown may have happened while we waited for the previous pass
        if self.is_torn_down() {
            tracing::debug!("dispatcher torn down, dropping late action");
            return Ok(());
        }

        let reducers = lock(&self.reducers).clone();
        *lock(&self.in_flight) = Some(current);
        let _in_flight = InFlightGuard(&self.in_flight);

        tracing::debug!(reducers = reducers.len(), "dispatching action");
        for reducer in reducers {
            reducer.on_dispatch(&action);
        }

        Ok(())
    }

    /// Unregister every reducer and reset it. Later dispatches are ignored.
    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
        let reducers = std::mem::take(&mut *lock(&self.reducers));
        tracing::debug!(reducers = reducers.len(), "tearing down dispatcher");
        for reducer in reducers {
            reducer.reset();
        }
    }
}

/// Clears the in-flight marker even if a reducer panics.
struct InFlightGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::BreakpointAction;
    use std::sync::Weak;

    #[derive(Default)]
    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        resets: Mutex<usize>,
    }

    impl Reducer for Recorder {
        fn on_dispatch(&self, action: &Action) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{action:?}", self.label));
        }

        fn reset(&self) {
            *self.resets.lock().unwrap() += 1;
        }
    }

    fn clear_all() -> Action {
        Action::Breakpoint(BreakpointAction::ClearAllRequest)
    }

    #[test]
    fn delivers_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        for label in ["first", "second"] {
            dispatcher.register(Arc::new(Recorder {
                label,
                log: Arc::clone(&log),
                ..Default::default()
            }));
        }

        dispatcher.dispatch(clear_all()).unwrap();
        dispatcher
            .dispatch(Action::Breakpoint(BreakpointAction::ClearAllSuccess))
            .unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4);
        assert!(log[0].starts_with("first:") && log[0].ends_with("ClearAllRequest)"));
        assert!(log[1].starts_with("second:") && log[1].ends_with("ClearAllRequest)"));
        assert!(log[2].starts_with("first:") && log[2].ends_with("ClearAllSuccess)"));
    }

    struct Reentrant {
        dispatcher: Weak<Dispatcher>,
        result: Mutex<Option<Result<(), DispatchError>>>,
    }

    impl Reducer for Reentrant {
        fn on_dispatch(&self, _action: &Action) {
            if let Some(dispatcher) = self.dispatcher.upgrade() {
                *self.result.lock().unwrap() = Some(dispatcher.dispatch(clear_all()));
            }
        }

        fn reset(&self) {}
    }

    #[test]
    fn rejects_reentrant_dispatch() {
        let dispatcher = Arc::new(Dispatcher::new());
        let reducer = Arc::new(Reentrant {
            dispatcher: Arc::downgrade(&dispatcher),
            result: Mutex::new(None),
        });
        dispatcher.register(reducer.clone());

        dispatcher.dispatch(clear_all()).unwrap();

        let result = reducer.result.lock().unwrap().take().unwrap();
        assert!(matches!(result, Err(DispatchError::Reentrant { .. })));
    }

    #[test]
    fn dispatch_after_reentrancy_error_still_works() {
        let dispatcher = Arc::new(Dispatcher::new());
        let reducer = Arc::new(Reentrant {
            dispatcher: Arc::downgrade(&dispatcher),
            result: Mutex::new(None),
        });
        dispatcher.register(reducer.clone());

        dispatcher.dispatch(clear_all()).unwrap();
        dispatcher.dispatch(clear_all()).unwrap();
    }

    #[test]
    fn concurrent_dispatches_are_serialised() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.register(Arc::new(Recorder {
            label: "only",
            log: Arc::clone(&log),
            ..Default::default()
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                std::thread::spawn(move || dispatcher.dispatch(clear_all()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(log.lock().unwrap().len(), 8);
    }

    #[test]
    fn teardown_resets_and_ignores_late_actions() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        let recorder = Arc::new(Recorder {
            label: "r",
            log: Arc::clone(&log),
            ..Default::default()
        });
        dispatcher.register(recorder.clone());

        dispatcher.teardown();
        dispatcher.dispatch(clear_all()).unwrap();

        assert!(dispatcher.is_torn_down());
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(*recorder.resets.lock().unwrap(), 1);
    }
}
