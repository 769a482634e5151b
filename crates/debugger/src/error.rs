use crate::{backend::BackendError, dispatcher::DispatchError, types::BreakpointId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("no current scope, the process is not paused")]
    InvalidScope,

    #[error("no breakpoint with id {0}")]
    UnknownBreakpoint(BreakpointId),

    #[error("a breakpoint named {0:?} is already being created")]
    PendingName(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
