//! The operations the synchronization core needs from a debugger backend.

use std::future::Future;

use crate::{
    actions::RunCommand,
    types::{Breakpoint, BreakpointId, DebuggerState, EvalScope, Frame, GoroutineId, Variable},
};

/// How a backend call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The debugged process terminated. Expected outcome of run-control
    /// commands rather than a failure.
    #[error("process exited with status {status}")]
    Exited { status: i32 },

    /// The backend answered the call with an error.
    #[error("{0}")]
    Rejected(String),

    /// The backend did not answer in a usable way. The session should be
    /// considered broken.
    #[error("backend transport failure: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn is_exit(&self) -> bool {
        matches!(self, BackendError::Exited { .. })
    }
}

pub trait Backend: Send + Sync + 'static {
    /// `pattern` is either `file:line` (one breakpoint) or any other location
    /// expression the backend understands, which may expand to several.
    fn create_breakpoints(
        &self,
        name: Option<&str>,
        pattern: &str,
    ) -> impl Future<Output = Result<Vec<Breakpoint>, BackendError>> + Send;

    fn set_breakpoint_condition(
        &self,
        id: BreakpointId,
        condition: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn clear_breakpoint(
        &self,
        id: BreakpointId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Resume the process and wait for its next stop.
    ///
    /// Fails with [`BackendError::Exited`] when the process terminates.
    fn run(
        &self,
        command: RunCommand,
    ) -> impl Future<Output = Result<DebuggerState, BackendError>> + Send;

    fn restart(&self) -> impl Future<Output = Result<DebuggerState, BackendError>> + Send;

    fn stacktrace(
        &self,
        goroutine_id: GoroutineId,
        depth: usize,
        full: bool,
    ) -> impl Future<Output = Result<Vec<Frame>, BackendError>> + Send;

    fn eval_symbol(
        &self,
        expression: &str,
        scope: EvalScope,
    ) -> impl Future<Output = Result<Variable, BackendError>> + Send;

    fn set_symbol(
        &self,
        symbol: &str,
        value: &str,
        scope: EvalScope,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn detach(&self, kill: bool) -> impl Future<Output = Result<(), BackendError>> + Send;
}
