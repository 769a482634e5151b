//! The action-issuing entry points.
//!
//! Every operation calls the backend, waits for it to settle and only then
//! dispatches the matching success or failure action, so stores observe
//! outcomes in completion order.

use std::{path::PathBuf, sync::Arc};

use futures::future::try_join_all;

use crate::{
    actions::{Action, BreakpointAction, DebuggerAction, RunCommand},
    backend::{Backend, BackendError},
    breakpoints::BreakpointStore,
    dispatcher::Dispatcher,
    error::{Error, Result},
    run_state::RunStateStore,
    types::{Breakpoint, BreakpointId, DebuggerState, Evaluation, Frame, Location, RunOutcome},
    utils::split_assignment,
};

/// Frames requested after every stop.
pub const DEFAULT_STACKTRACE_DEPTH: usize = 50;

pub struct Debugger<B> {
    backend: Arc<B>,
    dispatcher: Arc<Dispatcher>,
    breakpoints: Arc<BreakpointStore>,
    run_state: Arc<RunStateStore>,
    stacktrace_depth: usize,
}

impl<B> Clone for Debugger<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            dispatcher: Arc::clone(&self.dispatcher),
            breakpoints: Arc::clone(&self.breakpoints),
            run_state: Arc::clone(&self.run_state),
            stacktrace_depth: self.stacktrace_depth,
        }
    }
}

impl<B> std::fmt::Debug for Debugger<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debugger")
            .field("stacktrace_depth", &self.stacktrace_depth)
            .finish_non_exhaustive()
    }
}

impl<B> Debugger<B>
where
    B: Backend,
{
    pub(crate) fn new(
        backend: Arc<B>,
        dispatcher: Arc<Dispatcher>,
        breakpoints: Arc<BreakpointStore>,
        run_state: Arc<RunStateStore>,
    ) -> Self {
        Self {
            backend,
            dispatcher,
            breakpoints,
            run_state,
            stacktrace_depth: DEFAULT_STACKTRACE_DEPTH,
        }
    }

    pub(crate) fn set_stacktrace_depth(&mut self, depth: usize) {
        self.stacktrace_depth = depth;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn dispatch(&self, action: impl Into<Action>) -> Result<()> {
        Ok(self.dispatcher.dispatch(action.into())?)
    }

    /// Create a breakpoint at a 0-based editor line.
    ///
    /// Without a `name`, the next ordinal from the breakpoint store is used.
    #[tracing::instrument(skip(self, file), fields(file = %file.as_ref().display()))]
    pub async fn create_breakpoint(
        &self,
        file: impl AsRef<std::path::Path>,
        editor_line: usize,
        name: Option<String>,
    ) -> Result<Vec<Breakpoint>> {
        let name = name.unwrap_or_else(|| self.breakpoints.next_breakpoint_name().to_string());
        if self.breakpoints.has_pending_create(&name) {
            return Err(Error::PendingName(name));
        }

        let location = Location::new(PathBuf::from(file.as_ref()), editor_line + 1);
        let pattern = location.to_pattern();
        self.dispatch(BreakpointAction::CreateRequest {
            name: Some(name.clone()),
            location: Some(location),
        })?;

        match self.backend.create_breakpoints(Some(&name), &pattern).await {
            Ok(created) => {
                tracing::debug!(count = created.len(), "breakpoint created");
                self.dispatch(BreakpointAction::CreateSuccess {
                    created: created.clone(),
                })?;
                Ok(created)
            }
            Err(e) => {
                self.dispatch(BreakpointAction::CreateFailure {
                    name: Some(name),
                    expecting_multiple: false,
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
        }
    }

    /// Create breakpoints from any location expression, e.g. a function name.
    ///
    /// Nothing is recorded until the backend answers, since the number and
    /// position of the resulting breakpoints is unknown up front.
    #[tracing::instrument(skip(self))]
    pub async fn create_breakpoint_from_pattern(&self, pattern: &str) -> Result<Vec<Breakpoint>> {
        self.dispatch(BreakpointAction::CreateRequest {
            name: None,
            location: None,
        })?;

        match self.backend.create_breakpoints(None, pattern).await {
            Ok(created) => {
                self.dispatch(BreakpointAction::CreateSuccess {
                    created: created.clone(),
                })?;
                Ok(created)
            }
            Err(e) => {
                self.dispatch(BreakpointAction::CreateFailure {
                    name: None,
                    expecting_multiple: true,
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
        }
    }

    fn confirmed(&self, id: BreakpointId) -> Result<Breakpoint> {
        self.breakpoints
            .breakpoint_by_id(id)
            .filter(Breakpoint::is_confirmed)
            .ok_or(Error::UnknownBreakpoint(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_breakpoint_condition(&self, id: BreakpointId, condition: &str) -> Result<()> {
        self.confirmed(id)?;
        self.dispatch(BreakpointAction::SetConditionRequest { id })?;

        match self.backend.set_breakpoint_condition(id, condition).await {
            Ok(()) => self.dispatch(BreakpointAction::SetConditionSuccess {
                id,
                condition: condition.to_string(),
            }),
            Err(e) => {
                self.dispatch(BreakpointAction::SetConditionFailure {
                    id,
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn clear_breakpoint(&self, id: BreakpointId) -> Result<()> {
        self.confirmed(id)?;
        self.dispatch(BreakpointAction::ClearRequest { id })?;

        match self.backend.clear_breakpoint(id).await {
            Ok(()) => self.dispatch(BreakpointAction::ClearSuccess { id }),
            Err(e) => {
                self.dispatch(BreakpointAction::ClearFailure {
                    id,
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
        }
    }

    /// Clear every confirmed breakpoint with no request in flight.
    ///
    /// The clears run concurrently and the first failure fails the batch.
    /// Breakpoints already cleared by then stay cleared on the backend.
    #[tracing::instrument(skip(self))]
    pub async fn clear_all_breakpoints(&self) -> Result<()> {
        let ids = self.breakpoints.clearable_ids();
        tracing::debug!(?ids, "clearing breakpoints");
        self.dispatch(BreakpointAction::ClearAllRequest)?;

        let clears = ids.iter().map(|id| self.backend.clear_breakpoint(*id));
        match try_join_all(clears).await {
            Ok(_) => self.dispatch(BreakpointAction::ClearAllSuccess),
            Err(e) => {
                self.dispatch(BreakpointAction::ClearAllFailure {
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
        }
    }

    pub async fn continue_(&self) -> Result<RunOutcome> {
        self.run(RunCommand::Continue).await
    }

    pub async fn next(&self) -> Result<RunOutcome> {
        self.run(RunCommand::Next).await
    }

    pub async fn step(&self) -> Result<RunOutcome> {
        self.run(RunCommand::Step).await
    }

    pub async fn step_instruction(&self) -> Result<RunOutcome> {
        self.run(RunCommand::StepInstruction).await
    }

    /// Resume the process and wait until it stops or exits.
    ///
    /// An exit is an outcome, not an error. Rejections leave the run state
    /// alone, anything else invalidates it.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, command: RunCommand) -> Result<RunOutcome> {
        match self.backend.run(command).await {
            Ok(state) if state.exited => {
                self.exited(state.exit_status.unwrap_or_default())
            }
            Ok(state) => {
                let stacktrace = self.stacktrace_after_stop(&state).await;
                self.dispatch(DebuggerAction::Stopped {
                    command,
                    state: state.clone(),
                    stacktrace,
                })?;
                Ok(RunOutcome::Paused(state))
            }
            Err(BackendError::Exited { status }) => self.exited(status),
            Err(e @ BackendError::Rejected(_)) => {
                self.dispatch(DebuggerAction::RunFailure {
                    command,
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
            Err(e @ BackendError::Transport(_)) => {
                tracing::error!(error = %e, %command, "backend failed during run command");
                self.dispatch(DebuggerAction::UnknownError {
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
        }
    }

    fn exited(&self, exit_status: i32) -> Result<RunOutcome> {
        tracing::info!(%exit_status, "process exited");
        self.dispatch(DebuggerAction::Exited { exit_status })?;
        Ok(RunOutcome::Exited { exit_status })
    }

    async fn stacktrace_after_stop(&self, state: &DebuggerState) -> Option<Vec<Frame>> {
        let goroutine_id = state
            .current_goroutine
            .as_ref()
            .map(|g| g.id)
            .or_else(|| state.current_thread.as_ref().map(|t| t.goroutine_id))?;

        match self
            .backend
            .stacktrace(goroutine_id, self.stacktrace_depth, false)
            .await
        {
            Ok(frames) => Some(frames),
            Err(e) => {
                tracing::warn!(error = %e, %goroutine_id, "could not load stacktrace");
                None
            }
        }
    }

    /// Restart the process from the beginning. The stacktrace is discarded.
    #[tracing::instrument(skip(self))]
    pub async fn restart(&self) -> Result<RunOutcome> {
        match self.backend.restart().await {
            Ok(state) if state.exited => self.exited(state.exit_status.unwrap_or_default()),
            Ok(state) => {
                self.dispatch(DebuggerAction::Restarted {
                    state: state.clone(),
                })?;
                Ok(RunOutcome::Paused(state))
            }
            Err(BackendError::Exited { status }) => self.exited(status),
            Err(e @ BackendError::Rejected(_)) => {
                self.dispatch(DebuggerAction::RestartFailure {
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
            Err(e @ BackendError::Transport(_)) => {
                tracing::error!(error = %e, "backend failed during restart");
                self.dispatch(DebuggerAction::UnknownError {
                    error: e.to_string(),
                })?;
                Err(e.into())
            }
        }
    }

    /// Reload the frames of the current goroutine.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_stacktrace(&self) -> Result<Vec<Frame>> {
        if self.run_state.scope().is_none() {
            return Err(Error::InvalidScope);
        }
        let goroutine_id = self.run_state.eval_scope().goroutine_id;

        let stacktrace = self
            .backend
            .stacktrace(goroutine_id, self.stacktrace_depth, false)
            .await?;
        self.dispatch(DebuggerAction::StacktraceLoaded {
            goroutine_id,
            stacktrace: stacktrace.clone(),
        })?;
        Ok(stacktrace)
    }

    /// Evaluate an expression in the current scope, or assign when it has the
    /// form `symbol = value`.
    #[tracing::instrument(skip(self))]
    pub async fn evaluate(&self, expression: &str) -> Result<Evaluation> {
        if self.run_state.scope().is_none() {
            return Err(Error::InvalidScope);
        }
        let scope = self.run_state.eval_scope();

        match split_assignment(expression) {
            Some((symbol, value)) => {
                self.backend.set_symbol(symbol, value, scope).await?;
                Ok(Evaluation::Assigned {
                    symbol: symbol.to_string(),
                    value: value.to_string(),
                })
            }
            None => Ok(Evaluation::Value(
                self.backend.eval_symbol(expression, scope).await?,
            )),
        }
    }

    /// Detach from the backend, optionally killing the debugged process.
    pub async fn detach(&self, kill: bool) -> Result<()> {
        Ok(self.backend.detach(kill).await?)
    }
}
