//! Debugger session state synchronization.
//!
//! A [`Session`] wires a [`Backend`] to two stores through a [`Dispatcher`]:
//! the [`BreakpointStore`] reconciles optimistic breakpoint edits with the
//! backend's answers and the [`RunStateStore`] holds the snapshot of the
//! paused process. All mutations go through the [`Debugger`] facade, which
//! dispatches an action before and after every backend call.
//!
//! [`DelveClient`] implements [`Backend`] for delve's JSON-RPC API.
mod actions;
mod backend;
mod breakpoints;
mod client;
mod debugger;
mod dispatcher;
mod error;
mod run_state;
mod session;
mod store;
mod types;
pub mod utils;
mod wire;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use actions::{Action, BreakpointAction, DebuggerAction, RunCommand};
pub use backend::{Backend, BackendError};
pub use breakpoints::BreakpointStore;
pub use client::{DelveClient, REQUEST_TIMEOUT, TcpDelveClient};
pub use debugger::{DEFAULT_STACKTRACE_DEPTH, Debugger};
pub use dispatcher::{DispatchError, Dispatcher};
pub use error::{Error, Result};
pub use run_state::{RunState, RunStateStore};
pub use session::Session;
pub use store::{Listener, Reducer, Store, SubscriptionId};
pub use types::{
    Annotated, Breakpoint, BreakpointId, DebuggerState, EvalScope, Evaluation, Frame, Function,
    Goroutine, GoroutineId, Location, PENDING_ID, RunOutcome, Scope, Thread, ThreadId, Variable,
};
