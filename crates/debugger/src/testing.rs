//! A scripted [`Backend`] for exercising the synchronization core without a
//! delve process.
//!
//! Results are queued per operation; when a queue is empty a plausible
//! default is returned. Any operation can be held at a gate until the test
//! releases it, which makes interleavings of concurrent calls deterministic.

use std::{
    collections::{HashMap, VecDeque},
    path::PathBuf,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicI64, Ordering},
    },
};

use tokio::sync::Notify;

use crate::{
    actions::RunCommand,
    backend::{Backend, BackendError},
    types::{
        Breakpoint, BreakpointId, DebuggerState, EvalScope, Frame, Function, Goroutine,
        GoroutineId, Location, Thread, Variable,
    },
};

/// A call received by the [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateBreakpoints {
        name: Option<String>,
        pattern: String,
    },
    SetBreakpointCondition {
        id: BreakpointId,
        condition: String,
    },
    ClearBreakpoint {
        id: BreakpointId,
    },
    Run(RunCommand),
    Restart,
    Stacktrace {
        goroutine_id: GoroutineId,
        depth: usize,
    },
    EvalSymbol {
        expression: String,
        scope: EvalScope,
    },
    SetSymbol {
        symbol: String,
        value: String,
        scope: EvalScope,
    },
    Detach {
        kill: bool,
    },
}

/// Operation names accepted by [`MockBackend::gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateBreakpoints,
    SetBreakpointCondition,
    ClearBreakpoint,
    Run,
    Restart,
    Stacktrace,
}

#[derive(Debug, Default)]
struct Script {
    creates: VecDeque<Result<Vec<Breakpoint>, BackendError>>,
    conditions: VecDeque<Result<(), BackendError>>,
    clear_failures: HashMap<BreakpointId, BackendError>,
    runs: VecDeque<Result<DebuggerState, BackendError>>,
    restarts: VecDeque<Result<DebuggerState, BackendError>>,
    stacktraces: VecDeque<Result<Vec<Frame>, BackendError>>,
    evals: VecDeque<Result<Variable, BackendError>>,
}

#[derive(Debug)]
pub struct MockBackend {
    next_id: AtomicI64,
    calls: Mutex<Vec<Call>>,
    script: Mutex<Script>,
    gates: Mutex<HashMap<Op, Arc<Notify>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            calls: Mutex::default(),
            script: Mutex::default(),
            gates: Mutex::default(),
        }
    }

    /// Ids handed out by default creates start here.
    pub fn with_first_id(self, id: BreakpointId) -> Self {
        self.next_id.store(id, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn push_create(&self, result: Result<Vec<Breakpoint>, BackendError>) {
        lock(&self.script).creates.push_back(result);
    }

    pub fn push_condition(&self, result: Result<(), BackendError>) {
        lock(&self.script).conditions.push_back(result);
    }

    pub fn fail_clear(&self, id: BreakpointId, error: BackendError) {
        lock(&self.script).clear_failures.insert(id, error);
    }

    pub fn push_run(&self, result: Result<DebuggerState, BackendError>) {
        lock(&self.script).runs.push_back(result);
    }

    pub fn push_restart(&self, result: Result<DebuggerState, BackendError>) {
        lock(&self.script).restarts.push_back(result);
    }

    pub fn push_stacktrace(&self, result: Result<Vec<Frame>, BackendError>) {
        lock(&self.script).stacktraces.push_back(result);
    }

    pub fn push_eval(&self, result: Result<Variable, BackendError>) {
        lock(&self.script).evals.push_back(result);
    }

    /// Hold every subsequent call to `op` until the returned handle is
    /// notified (once per held call).
    pub fn gate(&self, op: Op) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        lock(&self.gates).insert(op, Arc::clone(&notify));
        notify
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    async fn pass(&self, op: Op) {
        let gate = lock(&self.gates).get(&op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

impl Backend for MockBackend {
    async fn create_breakpoints(
        &self,
        name: Option<&str>,
        pattern: &str,
    ) -> Result<Vec<Breakpoint>, BackendError> {
        self.record(Call::CreateBreakpoints {
            name: name.map(str::to_string),
            pattern: pattern.to_string(),
        });
        self.pass(Op::CreateBreakpoints).await;

        if let Some(result) = lock(&self.script).creates.pop_front() {
            return result;
        }

        let (file, line) = pattern
            .rsplit_once(':')
            .and_then(|(file, line)| Some((file, line.parse::<usize>().ok()?)))
            .ok_or_else(|| BackendError::Rejected(format!("location {pattern:?} not found")))?;
        Ok(vec![Breakpoint {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: name.unwrap_or_default().to_string(),
            location: Location::new(file, line),
            pending_change: false,
            condition: None,
        }])
    }

    async fn set_breakpoint_condition(
        &self,
        id: BreakpointId,
        condition: &str,
    ) -> Result<(), BackendError> {
        self.record(Call::SetBreakpointCondition {
            id,
            condition: condition.to_string(),
        });
        self.pass(Op::SetBreakpointCondition).await;
        lock(&self.script).conditions.pop_front().unwrap_or(Ok(()))
    }

    async fn clear_breakpoint(&self, id: BreakpointId) -> Result<(), BackendError> {
        self.record(Call::ClearBreakpoint { id });
        self.pass(Op::ClearBreakpoint).await;
        match lock(&self.script).clear_failures.remove(&id) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn run(&self, command: RunCommand) -> Result<DebuggerState, BackendError> {
        self.record(Call::Run(command));
        self.pass(Op::Run).await;
        lock(&self.script)
            .runs
            .pop_front()
            .unwrap_or_else(|| Ok(paused_at("main.go", 1)))
    }

    async fn restart(&self) -> Result<DebuggerState, BackendError> {
        self.record(Call::Restart);
        self.pass(Op::Restart).await;
        lock(&self.script)
            .restarts
            .pop_front()
            .unwrap_or_else(|| Ok(paused_at("main.go", 1)))
    }

    async fn stacktrace(
        &self,
        goroutine_id: GoroutineId,
        depth: usize,
        _full: bool,
    ) -> Result<Vec<Frame>, BackendError> {
        self.record(Call::Stacktrace {
            goroutine_id,
            depth,
        });
        self.pass(Op::Stacktrace).await;
        lock(&self.script)
            .stacktraces
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn eval_symbol(
        &self,
        expression: &str,
        scope: EvalScope,
    ) -> Result<Variable, BackendError> {
        self.record(Call::EvalSymbol {
            expression: expression.to_string(),
            scope,
        });
        lock(&self.script).evals.pop_front().unwrap_or_else(|| {
            Ok(Variable {
                name: expression.to_string(),
                ..Variable::default()
            })
        })
    }

    async fn set_symbol(
        &self,
        symbol: &str,
        value: &str,
        scope: EvalScope,
    ) -> Result<(), BackendError> {
        self.record(Call::SetSymbol {
            symbol: symbol.to_string(),
            value: value.to_string(),
            scope,
        });
        Ok(())
    }

    async fn detach(&self, kill: bool) -> Result<(), BackendError> {
        self.record(Call::Detach { kill });
        Ok(())
    }
}

/// A snapshot paused on goroutine 1, thread 1, at `file:line`.
pub fn paused_at(file: impl Into<PathBuf>, line: usize) -> DebuggerState {
    let file = file.into();
    let thread = Thread {
        id: 1,
        file: file.clone(),
        line,
        pc: 0x1000 + line as u64,
        function: Some(Function {
            name: "main.main".to_string(),
            locals: Vec::new(),
            args: Vec::new(),
        }),
        goroutine_id: 1,
    };
    DebuggerState {
        current_thread: Some(thread.clone()),
        current_goroutine: Some(Goroutine {
            id: 1,
            user_current_location: Some(Frame {
                pc: thread.pc,
                file,
                line,
                function: None,
            }),
        }),
        threads: vec![thread],
        goroutines: Vec::new(),
        exited: false,
        exit_status: None,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
