//! Typed records broadcast through the [`Dispatcher`](crate::Dispatcher).
//!
//! Every backend call produces a request action before it is issued and a
//! success or failure action once it settles. Stores only ever change in
//! response to one of these.

use crate::types::{Breakpoint, BreakpointId, DebuggerState, Frame, GoroutineId, Location};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Breakpoint(BreakpointAction),
    Debugger(DebuggerAction),
}

impl From<BreakpointAction> for Action {
    fn from(value: BreakpointAction) -> Self {
        Self::Breakpoint(value)
    }
}

impl From<DebuggerAction> for Action {
    fn from(value: DebuggerAction) -> Self {
        Self::Debugger(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BreakpointAction {
    /// `name`/`location` are `None` for pattern creates, where the number
    /// and position of the resulting breakpoints is unknown.
    CreateRequest {
        name: Option<String>,
        location: Option<Location>,
    },
    CreateSuccess {
        created: Vec<Breakpoint>,
    },
    CreateFailure {
        name: Option<String>,
        expecting_multiple: bool,
        error: String,
    },

    SetConditionRequest {
        id: BreakpointId,
    },
    SetConditionSuccess {
        id: BreakpointId,
        condition: String,
    },
    SetConditionFailure {
        id: BreakpointId,
        error: String,
    },

    ClearRequest {
        id: BreakpointId,
    },
    ClearSuccess {
        id: BreakpointId,
    },
    ClearFailure {
        id: BreakpointId,
        error: String,
    },

    ClearAllRequest,
    ClearAllSuccess,
    ClearAllFailure {
        error: String,
    },
}

/// The run-control commands that resume the process until its next stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCommand {
    Continue,
    Next,
    Step,
    StepInstruction,
}

impl RunCommand {
    pub fn name(self) -> &'static str {
        match self {
            RunCommand::Continue => "continue",
            RunCommand::Next => "next",
            RunCommand::Step => "step",
            RunCommand::StepInstruction => "stepInstruction",
        }
    }
}

impl std::fmt::Display for RunCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DebuggerAction {
    /// A run command stopped the process again.
    Stopped {
        command: RunCommand,
        state: DebuggerState,
        stacktrace: Option<Vec<Frame>>,
    },
    /// The backend rejected a run command; the process did not move.
    RunFailure {
        command: RunCommand,
        error: String,
    },
    Restarted {
        state: DebuggerState,
    },
    RestartFailure {
        error: String,
    },
    Exited {
        exit_status: i32,
    },
    /// A failure that cannot be attributed to a single call.
    UnknownError {
        error: String,
    },
    StacktraceLoaded {
        goroutine_id: GoroutineId,
        stacktrace: Vec<Frame>,
    },
}
