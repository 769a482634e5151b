//! Composition root for one debugging session.

use std::sync::Arc;

use crate::{
    backend::Backend,
    breakpoints::BreakpointStore,
    debugger::Debugger,
    dispatcher::Dispatcher,
    error::Result,
    run_state::RunStateStore,
};

/// Owns the dispatcher, both stores and the facade for a single backend
/// connection.
///
/// Stores start blank. [`Session::teardown`] unregisters them from the
/// dispatcher, drops every subscription and clears their state; operations
/// still in flight afterwards complete against the backend but their actions
/// are dropped.
pub struct Session<B> {
    dispatcher: Arc<Dispatcher>,
    breakpoints: Arc<BreakpointStore>,
    run_state: Arc<RunStateStore>,
    debugger: Debugger<B>,
}

impl<B> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dispatcher", &self.dispatcher)
            .field("breakpoints", &self.breakpoints)
            .field("run_state", &self.run_state)
            .finish()
    }
}

impl<B> Session<B>
where
    B: Backend,
{
    #[tracing::instrument(skip_all)]
    pub fn start(backend: B) -> Self {
        let dispatcher = Arc::new(Dispatcher::new());
        let breakpoints = Arc::new(BreakpointStore::new());
        let run_state = Arc::new(RunStateStore::new());

        dispatcher.register(breakpoints.clone());
        dispatcher.register(run_state.clone());

        let debugger = Debugger::new(
            Arc::new(backend),
            Arc::clone(&dispatcher),
            Arc::clone(&breakpoints),
            Arc::clone(&run_state),
        );

        tracing::debug!("session started");
        Self {
            dispatcher,
            breakpoints,
            run_state,
            debugger,
        }
    }

    /// Frames requested after every stop and by
    /// [`Debugger::fetch_stacktrace`].
    pub fn with_stacktrace_depth(mut self, depth: usize) -> Self {
        self.debugger.set_stacktrace_depth(depth);
        self
    }

    pub fn debugger(&self) -> &Debugger<B> {
        &self.debugger
    }

    pub fn breakpoints(&self) -> &Arc<BreakpointStore> {
        &self.breakpoints
    }

    pub fn run_state(&self) -> &Arc<RunStateStore> {
        &self.run_state
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn is_torn_down(&self) -> bool {
        self.dispatcher.is_torn_down()
    }

    pub fn teardown(&self) {
        tracing::debug!("tearing down session");
        self.dispatcher.teardown();
    }

    /// Detach from the backend and tear the session down. The session is
    /// torn down even when detaching fails.
    pub async fn end(self, kill: bool) -> Result<()> {
        let detached = self.debugger.detach(kill).await;
        self.teardown();
        detached
    }
}
