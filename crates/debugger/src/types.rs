use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub type BreakpointId = i64;
pub type ThreadId = i64;
pub type GoroutineId = i64;

/// Id carried by a breakpoint that the backend has not confirmed yet.
pub const PENDING_ID: BreakpointId = -1;

/// A source position as the backend sees it (1-based line).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// The `file:line` form understood by the backend's location parser.
    pub fn to_pattern(&self) -> String {
        format!("{}:{}", self.file.display(), self.line)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: BreakpointId,
    pub name: String,
    pub location: Location,
    /// Set while a create, clear or condition request for this entry is in flight.
    #[serde(default)]
    pub pending_change: bool,
    #[serde(default)]
    pub condition: Option<String>,
}

impl Breakpoint {
    /// An optimistic entry inserted before the backend answers.
    pub fn pending(name: impl Into<String>, location: Location) -> Self {
        Self {
            id: PENDING_ID,
            name: name.into(),
            location,
            pending_change: true,
            condition: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.id != PENDING_ID
    }

    pub fn is_in_file(&self, file: &Path) -> bool {
        self.location.file == file
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
    #[serde(default)]
    pub children: Vec<Variable>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub locals: Vec<Variable>,
    #[serde(default)]
    pub args: Vec<Variable>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: ThreadId,
    pub file: PathBuf,
    pub line: usize,
    pub pc: u64,
    pub function: Option<Function>,
    pub goroutine_id: GoroutineId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub pc: u64,
    pub file: PathBuf,
    pub line: usize,
    pub function: Option<Function>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Goroutine {
    pub id: GoroutineId,
    /// Topmost frame that belongs to user code rather than the runtime.
    pub user_current_location: Option<Frame>,
}

/// What the backend reports after a run-control command settles.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DebuggerState {
    pub current_thread: Option<Thread>,
    pub current_goroutine: Option<Goroutine>,
    pub threads: Vec<Thread>,
    #[serde(default)]
    pub goroutines: Vec<Goroutine>,
    #[serde(default)]
    pub exited: bool,
    #[serde(default)]
    pub exit_status: Option<i32>,
}

/// The current source position of the paused process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub file: PathBuf,
    /// 1-based, as reported by the backend.
    pub line: usize,
}

impl Scope {
    /// The 0-based row used by editor surfaces.
    pub fn editor_line(&self) -> usize {
        self.line.saturating_sub(1)
    }
}

/// Where expressions are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalScope {
    pub goroutine_id: GoroutineId,
    pub frame_id: i64,
}

impl Default for EvalScope {
    fn default() -> Self {
        Self {
            goroutine_id: -1,
            frame_id: 0,
        }
    }
}

/// A record paired with whether it is the one the debugger is stopped on.
///
/// Computed on every query so the flag can never go stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotated<T> {
    pub value: T,
    pub active: bool,
}

/// Result of evaluating something in the eval console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Value(Variable),
    Assigned { symbol: String, value: String },
}

/// How a run-control command finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Paused(DebuggerState),
    Exited { exit_status: i32 },
}
