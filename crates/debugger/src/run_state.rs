//! Snapshot of the paused process, replaced wholesale on every run-control
//! outcome.

use std::sync::Arc;

use crate::{
    actions::{Action, DebuggerAction},
    store::{Reducer, Store, StoreCore, SubscriptionId},
    types::{Annotated, DebuggerState, EvalScope, Frame, Goroutine, Scope, Thread, Variable},
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunState {
    pub current_thread: Option<Thread>,
    pub current_goroutine: Option<Goroutine>,
    pub threads: Vec<Thread>,
    pub goroutines: Vec<Goroutine>,
    /// `None` until fetched for the current stop.
    pub stacktrace: Option<Vec<Frame>>,
    pub exited: bool,
    pub exit_status: Option<i32>,
}

impl RunState {
    fn paused(state: DebuggerState, stacktrace: Option<Vec<Frame>>) -> Self {
        if state.exited {
            return Self::exited(state.exit_status.unwrap_or_default());
        }

        Self {
            current_thread: state.current_thread,
            current_goroutine: state.current_goroutine,
            threads: state.threads,
            goroutines: state.goroutines,
            stacktrace,
            exited: false,
            exit_status: None,
        }
    }

    fn exited(exit_status: i32) -> Self {
        Self {
            exited: true,
            exit_status: Some(exit_status),
            ..Self::default()
        }
    }
}

pub struct RunStateStore {
    core: StoreCore<RunState>,
}

impl Default for RunStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RunStateStore").field(&self.core.get()).finish()
    }
}

impl RunStateStore {
    pub fn new() -> Self {
        Self {
            core: StoreCore::new(RunState::default()),
        }
    }

    pub fn current_thread(&self) -> Option<Thread> {
        self.core.read(|s| s.current_thread.clone())
    }

    pub fn exited(&self) -> bool {
        self.core.read(|s| s.exited)
    }

    pub fn exit_status(&self) -> Option<i32> {
        self.core.read(|s| s.exit_status)
    }

    /// Where the process is paused, if it is.
    pub fn scope(&self) -> Option<Scope> {
        self.core.read(|s| {
            s.current_thread.as_ref().map(|t| Scope {
                file: t.file.clone(),
                line: t.line,
            })
        })
    }

    /// Always the innermost frame of the current goroutine; only frame 0 is
    /// addressable for evaluation.
    pub fn eval_scope(&self) -> EvalScope {
        self.core.read(|s| match &s.current_thread {
            Some(thread) => EvalScope {
                goroutine_id: thread.goroutine_id,
                frame_id: 0,
            },
            None => EvalScope::default(),
        })
    }

    pub fn locals(&self) -> Vec<Variable> {
        self.core.read(|s| {
            s.current_thread
                .as_ref()
                .and_then(|t| t.function.as_ref())
                .map(|f| f.locals.clone())
                .unwrap_or_default()
        })
    }

    pub fn args(&self) -> Vec<Variable> {
        self.core.read(|s| {
            s.current_thread
                .as_ref()
                .and_then(|t| t.function.as_ref())
                .map(|f| f.args.clone())
                .unwrap_or_default()
        })
    }

    pub fn threads(&self) -> Vec<Annotated<Thread>> {
        self.core.read(|s| {
            let current = s.current_thread.as_ref().map(|t| t.id);
            s.threads
                .iter()
                .map(|t| Annotated {
                    active: Some(t.id) == current,
                    value: t.clone(),
                })
                .collect()
        })
    }

    pub fn goroutines(&self) -> Vec<Annotated<Goroutine>> {
        self.core.read(|s| {
            let current = s.current_goroutine.as_ref().map(|g| g.id);
            s.goroutines
                .iter()
                .map(|g| Annotated {
                    active: Some(g.id) == current,
                    value: g.clone(),
                })
                .collect()
        })
    }

    /// Frames of the current goroutine; the frame at the current pc is active.
    pub fn stacktrace(&self) -> Option<Vec<Annotated<Frame>>> {
        self.core.read(|s| {
            let pc = s.current_thread.as_ref().map(|t| t.pc);
            s.stacktrace.as_ref().map(|frames| {
                frames
                    .iter()
                    .map(|f| Annotated {
                        active: Some(f.pc) == pc,
                        value: f.clone(),
                    })
                    .collect()
            })
        })
    }
}

impl Store for RunStateStore {
    type State = RunState;

    fn reduce(&self, state: Self::State, action: &Action) -> Self::State {
        let Action::Debugger(action) = action else {
            return state;
        };

        match action {
            DebuggerAction::Stopped {
                state: snapshot,
                stacktrace,
                ..
            } => RunState::paused(snapshot.clone(), stacktrace.clone()),
            DebuggerAction::Restarted { state: snapshot } => {
                RunState::paused(snapshot.clone(), None)
            }
            DebuggerAction::Exited { exit_status } => RunState::exited(*exit_status),
            DebuggerAction::UnknownError { error } => {
                tracing::warn!(%error, "unclassified backend error, discarding run state");
                RunState::default()
            }
            DebuggerAction::RunFailure { command, error } => {
                tracing::debug!(%command, %error, "run command failed");
                state
            }
            DebuggerAction::RestartFailure { error } => {
                tracing::debug!(%error, "restart failed");
                state
            }
            DebuggerAction::StacktraceLoaded {
                goroutine_id,
                stacktrace,
            } => {
                let current = state.current_goroutine.as_ref().map(|g| g.id);
                if current != Some(*goroutine_id) {
                    tracing::warn!(
                        %goroutine_id,
                        ?current,
                        "stacktrace is for a goroutine that is no longer current, ignoring"
                    );
                    return state;
                }
                RunState {
                    stacktrace: Some(stacktrace.clone()),
                    ..state
                }
            }
        }
    }

    fn state(&self) -> Self::State {
        self.core.get()
    }

    fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.core.subscribe(Arc::new(listener))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.unsubscribe(id)
    }
}

impl Reducer for RunStateStore {
    fn on_dispatch(&self, action: &Action) {
        self.core.apply(|state| self.reduce(state, action));
    }

    fn reset(&self) {
        self.core.reset(RunState::default());
    }
}
