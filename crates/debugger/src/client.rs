//! [`Backend`] implementation speaking delve's JSON-RPC API (version 2).

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::StreamExt;
use retry::delay::Exponential;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{ToSocketAddrs, tcp::OwnedWriteHalf},
    sync::oneshot,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use transport::{Id, Message, Request, Response, RpcReader, RpcWriter};

use crate::{
    actions::RunCommand,
    backend::{Backend, BackendError},
    types::{Breakpoint, BreakpointId, DebuggerState, EvalScope, Frame, GoroutineId, Variable},
    wire,
};

/// Timeout for calls that do not resume the process.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const GOROUTINE_PAGE: i64 = 256;

type Pending = Arc<Mutex<HashMap<Id, oneshot::Sender<Result<Value, BackendError>>>>>;

pub type TcpDelveClient = DelveClient<OwnedWriteHalf>;

pub struct DelveClient<W> {
    writer: tokio::sync::Mutex<RpcWriter<W>>,
    next_id: AtomicU64,
    pending: Pending,
    closed: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    reader_handle: Option<JoinHandle<()>>,
    request_timeout: Duration,
}

impl<W> std::fmt::Debug for DelveClient<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelveClient")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .field("pending", &lock(&self.pending).len())
            .finish()
    }
}

impl TcpDelveClient {
    /// Connect to a headless delve server.
    ///
    /// delve announces it is listening slightly before the socket accepts,
    /// so connection attempts are retried with exponential back-off.
    #[tracing::instrument]
    pub async fn connect(addr: impl ToSocketAddrs + std::fmt::Debug + Clone) -> Result<Self, BackendError> {
        let mut delays = Exponential::from_millis(200).take(5);
        loop {
            tracing::debug!("trying to make connection");
            match transport::connect(addr.clone()).await {
                Ok((reader, writer)) => {
                    tracing::debug!("connection made");
                    return Ok(Self::from_transport(reader, writer));
                }
                Err(e) => match delays.next() {
                    Some(delay) => {
                        tracing::debug!(error = %e, ?delay, "error making connection, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::warn!(error = %e, "giving up connecting to delve");
                        return Err(BackendError::Transport(format!(
                            "connecting to delve: {e}"
                        )));
                    }
                },
            }
        }
    }
}

impl<W> DelveClient<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create from an existing transport (useful for testing)
    pub fn from_transport<R>(reader: RpcReader<R>, writer: RpcWriter<W>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let cancel_token = CancellationToken::new();

        let reader_handle = spawn_reader_task(
            reader,
            Arc::clone(&pending),
            Arc::clone(&closed),
            cancel_token.clone(),
        );

        Self {
            writer: tokio::sync::Mutex::new(writer),
            next_id: AtomicU64::new(1),
            pending,
            closed,
            cancel_token,
            reader_handle: Some(reader_handle),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Requests sent and not yet answered.
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Stop the reader task and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.await;
        }
    }

    async fn call<P, T>(&self, method: &str, params: P, timeout: Option<Duration>) -> Result<T, BackendError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let params = serde_json::to_value(params)
            .map_err(|e| BackendError::Transport(format!("encoding {method} arguments: {e}")))?;

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        // dropped on every exit, including when this future is dropped
        let _pending = PendingEntry {
            pending: &self.pending,
            id,
        };
        if self.closed.load(Ordering::SeqCst) {
            return Err(connection_closed());
        }

        tracing::debug!(%id, %method, "sending request");
        let sent = self
            .writer
            .lock()
            .await
            .send(Message::Request(Request::new(id, method, params)))
            .await;
        if let Err(e) = sent {
            tracing::error!(error = %e, %method, "failed to send request");
            return Err(BackendError::Transport(format!("sending {method}: {e}")));
        }

        let response = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(response) => response,
                Err(_) => {
                    return Err(BackendError::Transport(format!(
                        "timed out after {limit:?} waiting for {method}"
                    )));
                }
            },
            None => rx.await,
        };

        let value = response.map_err(|_| connection_closed())??;
        serde_json::from_value(value)
            .map_err(|e| BackendError::Transport(format!("decoding {method} result: {e}")))
    }

    async fn request<P, T>(&self, method: &str, params: P) -> Result<T, BackendError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        self.call(method, params, Some(self.request_timeout)).await
    }

    async fn create_one(&self, breakpoint: wire::Breakpoint) -> Result<Breakpoint, BackendError> {
        let out: wire::BreakpointOut = self
            .request(
                "RPCServer.CreateBreakpoint",
                wire::CreateBreakpointIn {
                    breakpoint: wire::Breakpoint {
                        load_args: Some(wire::LoadConfig::default()),
                        load_locals: Some(wire::LoadConfig::default()),
                        ..breakpoint
                    },
                },
            )
            .await?;
        Ok(out.breakpoint.into())
    }

    /// Goroutines are not part of delve's state payload; fetch them so every
    /// snapshot carries a complete list.
    async fn goroutines(&self) -> Result<Vec<crate::types::Goroutine>, BackendError> {
        let out: wire::ListGoroutinesOut = self
            .request(
                "RPCServer.ListGoroutines",
                wire::ListGoroutinesIn {
                    start: 0,
                    count: GOROUTINE_PAGE,
                },
            )
            .await?;
        Ok(out
            .goroutines
            .unwrap_or_default()
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Remove breakpoints created by a pattern expansion that failed part
    /// way, so the backend holds nothing the caller was told failed.
    async fn roll_back(&self, created: &[Breakpoint]) {
        for bp in created {
            tracing::debug!(id = bp.id, "rolling back partially created breakpoint");
            if let Err(e) = self.clear_breakpoint(bp.id).await {
                tracing::warn!(error = %e, id = bp.id, "could not roll back breakpoint");
            }
        }
    }

    async fn snapshot(&self, state: wire::DebuggerState) -> Result<DebuggerState, BackendError> {
        if state.exited {
            return Err(BackendError::Exited {
                status: state.exit_status,
            });
        }
        let goroutines = self.goroutines().await?;
        Ok(state.into_state(goroutines))
    }
}

impl<W> Backend for DelveClient<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn create_breakpoints(
        &self,
        name: Option<&str>,
        pattern: &str,
    ) -> Result<Vec<Breakpoint>, BackendError> {
        if let Some((file, line)) = parse_file_line(pattern) {
            let created = self
                .create_one(wire::Breakpoint {
                    name: name.unwrap_or_default().to_string(),
                    file: file.to_path_buf(),
                    line,
                    ..Default::default()
                })
                .await?;
            return Ok(vec![created]);
        }

        let found: wire::FindLocationOut = self
            .request(
                "RPCServer.FindLocation",
                wire::FindLocationIn {
                    scope: EvalScope::default().into(),
                    loc: pattern.to_string(),
                },
            )
            .await?;
        if found.locations.is_empty() {
            return Err(BackendError::Rejected(format!(
                "location {pattern:?} not found"
            )));
        }

        let mut created = Vec::with_capacity(found.locations.len());
        for location in found.locations {
            let result = self
                .create_one(wire::Breakpoint {
                    addr: Some(location.pc),
                    file: location.file,
                    line: location.line,
                    ..Default::default()
                })
                .await;
            match result {
                Ok(bp) => created.push(bp),
                Err(e) => {
                    self.roll_back(&created).await;
                    return Err(e);
                }
            }
        }
        Ok(created)
    }

    async fn set_breakpoint_condition(
        &self,
        id: BreakpointId,
        condition: &str,
    ) -> Result<(), BackendError> {
        let current: wire::BreakpointOut = self
            .request("RPCServer.GetBreakpoint", wire::BreakpointIdIn { id })
            .await?;
        let _: wire::Ignored = self
            .request(
                "RPCServer.AmendBreakpoint",
                wire::AmendBreakpointIn {
                    breakpoint: wire::Breakpoint {
                        cond: condition.to_string(),
                        ..current.breakpoint
                    },
                },
            )
            .await?;
        Ok(())
    }

    async fn clear_breakpoint(&self, id: BreakpointId) -> Result<(), BackendError> {
        let _: wire::BreakpointOut = self
            .request("RPCServer.ClearBreakpoint", wire::BreakpointIdIn { id })
            .await?;
        Ok(())
    }

    async fn run(&self, command: RunCommand) -> Result<DebuggerState, BackendError> {
        let out: wire::StateOut = self
            .call(
                "RPCServer.Command",
                wire::CommandIn {
                    name: command.name(),
                },
                None,
            )
            .await?;
        self.snapshot(out.state).await
    }

    async fn restart(&self) -> Result<DebuggerState, BackendError> {
        let _: wire::Ignored = self
            .call("RPCServer.Restart", wire::RestartIn {}, None)
            .await?;
        let out: wire::StateOut = self
            .request(
                "RPCServer.State",
                wire::StateIn { non_blocking: true },
            )
            .await?;
        self.snapshot(out.state).await
    }

    async fn stacktrace(
        &self,
        goroutine_id: GoroutineId,
        depth: usize,
        full: bool,
    ) -> Result<Vec<Frame>, BackendError> {
        let out: wire::StacktraceOut = self
            .request(
                "RPCServer.Stacktrace",
                wire::StacktraceIn {
                    id: goroutine_id,
                    depth,
                    full,
                    cfg: full.then(wire::LoadConfig::default),
                },
            )
            .await?;
        Ok(out
            .locations
            .unwrap_or_default()
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn eval_symbol(
        &self,
        expression: &str,
        scope: EvalScope,
    ) -> Result<Variable, BackendError> {
        let out: wire::EvalOut = self
            .request(
                "RPCServer.Eval",
                wire::EvalIn {
                    scope: scope.into(),
                    expr: expression,
                    cfg: wire::LoadConfig::default(),
                },
            )
            .await?;
        Ok(out.variable.into())
    }

    async fn set_symbol(
        &self,
        symbol: &str,
        value: &str,
        scope: EvalScope,
    ) -> Result<(), BackendError> {
        let _: wire::Ignored = self
            .request(
                "RPCServer.Set",
                wire::SetIn {
                    scope: scope.into(),
                    symbol,
                    value,
                },
            )
            .await?;
        Ok(())
    }

    async fn detach(&self, kill: bool) -> Result<(), BackendError> {
        let _: wire::Ignored = self
            .request("RPCServer.Detach", wire::DetachIn { kill })
            .await?;
        self.cancel_token.cancel();
        Ok(())
    }
}

impl<W> Drop for DelveClient<W> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

fn spawn_reader_task<R>(
    mut reader: RpcReader<R>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("reader task cancelled");
                    break;
                }
                msg = reader.next() => {
                    match msg {
                        Some(Ok(Message::Response(response))) => {
                            resolve(&pending, response);
                        }
                        Some(Ok(Message::Request(request))) => {
                            tracing::warn!(method = %request.method, "unexpected request from delve");
                        }
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "transport error");
                            break;
                        }
                        None => {
                            tracing::debug!("transport closed");
                            break;
                        }
                    }
                }
            }
        }

        closed.store(true, Ordering::SeqCst);
        let outstanding: Vec<_> = lock(&pending).drain().collect();
        for (id, tx) in outstanding {
            tracing::debug!(%id, "failing outstanding request");
            let _ = tx.send(Err(connection_closed()));
        }
    })
}

struct PendingEntry<'a> {
    pending: &'a Pending,
    id: Id,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}

fn resolve(pending: &Pending, response: Response) {
    let id = response.id;
    let Some(tx) = lock(pending).remove(&id) else {
        tracing::warn!(%id, "response for unknown request");
        return;
    };
    tracing::debug!(%id, "received response");
    let _ = tx.send(response.into_result().map_err(classify_error));
}

/// delve reports run-control calls on a dead process as plain errors.
fn classify_error(message: String) -> BackendError {
    const MARKER: &str = "has exited with status ";
    if let Some(idx) = message.find(MARKER) {
        let digits: String = message[idx + MARKER.len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '-')
            .collect();
        if let Ok(status) = digits.parse() {
            return BackendError::Exited { status };
        }
    }
    BackendError::Rejected(message)
}

fn connection_closed() -> BackendError {
    BackendError::Transport("connection to delve closed".to_string())
}

/// `file:line` with a numeric line. Anything else is a location expression
/// for delve to resolve.
fn parse_file_line(pattern: &str) -> Option<(&Path, usize)> {
    let (file, line) = pattern.rsplit_once(':')?;
    if file.is_empty() || line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let line = line.parse().ok()?;
    Some((Path::new(file), line))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
