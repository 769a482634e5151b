use std::{
    io::Write,
    path::{Path, PathBuf},
    thread::JoinHandle,
};

use color_eyre::eyre::{self, Context};
use crossbeam_channel::Receiver;
use debugger::{RunCommand, RunOutcome, Scope, Session, TcpDelveClient, utils::normalise_path};
use server::{DelveServer, ServerEvent};
use tokio::runtime::Runtime;

use crate::{
    commands::{Command, HELP, SourceLine},
    render,
};

pub enum ShouldQuit {
    True,
    False,
}

/// A command that resumes the program and only finishes at its next stop.
#[derive(Debug, Clone, Copy)]
enum Resume {
    Run(RunCommand),
    Restart,
}

type Running = Receiver<debugger::Result<RunOutcome>>;

pub struct App {
    runtime: Runtime,
    server: DelveServer,
    session: Option<Session<TcpDelveClient>>,
    package_dir: PathBuf,
    changes: Receiver<()>,
    last_scope: Option<Scope>,
    running: Option<Running>,
    input_rx: Receiver<String>,

    #[allow(dead_code)]
    input_thread: JoinHandle<()>,
}

impl App {
    pub fn new(
        runtime: Runtime,
        server: DelveServer,
        session: Session<TcpDelveClient>,
        changes: Receiver<()>,
        package_dir: PathBuf,
    ) -> Self {
        // handle input
        let (input_tx, input_rx) = crossbeam_channel::unbounded();
        let input_thread = std::thread::spawn(move || {
            let mut buffer = String::new();
            loop {
                match std::io::stdin().read_line(&mut buffer) {
                    Ok(0) => {
                        let _ = input_tx.send("q".to_string());
                        return;
                    }
                    Ok(_) => {
                        let input = buffer.trim().to_owned();
                        if input_tx.send(input).is_err() {
                            return;
                        }
                        buffer.clear();
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "reading from stdin");
                        return;
                    }
                }
            }
        });

        Self {
            runtime,
            server,
            session: Some(session),
            package_dir,
            changes,
            last_scope: None,
            running: None,
            input_rx,
            input_thread,
        }
    }

    fn session(&self) -> eyre::Result<&Session<TcpDelveClient>> {
        self.session
            .as_ref()
            .ok_or_else(|| eyre::eyre!("session has ended"))
    }

    /// Resolve a user-supplied path against the package directory.
    fn resolve(&self, file: &Path) -> PathBuf {
        let file = normalise_path(file);
        if file.is_absolute() {
            file.into_owned()
        } else {
            self.package_dir.join(file)
        }
    }

    pub fn set_breakpoint(&mut self, at: &SourceLine, name: Option<String>) {
        if let Err(e) = self.create_breakpoint(at, name) {
            println!("{e:#}");
        }
    }

    fn create_breakpoint(&self, at: &SourceLine, name: Option<String>) -> eyre::Result<()> {
        let file = self.resolve(&at.file);
        tracing::debug!(file = %file.display(), line = at.line, "adding breakpoint");
        let debugger = self.session()?.debugger();
        let created = self
            .runtime
            .block_on(debugger.create_breakpoint(&file, at.line - 1, name))
            .wrap_err_with(|| format!("setting breakpoint at {}:{}", file.display(), at.line))?;
        for bp in created {
            println!("breakpoint {} set at {}", bp.id, bp.location.to_pattern());
        }
        Ok(())
    }

    pub fn loop_step(&mut self) -> eyre::Result<ShouldQuit> {
        tracing::trace!("locking stdout");
        print!("> ");
        std::io::stdout().flush()?;
        tracing::trace!("stdout flushed");

        let never = crossbeam_channel::never();
        let running = self.running.as_ref().unwrap_or(&never);

        crossbeam_channel::select! {
            recv(running) -> outcome => {
                self.running = None;
                match outcome {
                    Ok(outcome) => {
                        if let Err(e) = self.report(outcome) {
                            println!("\n{e:#}");
                        }
                    }
                    Err(_) => println!("\nrun command was abandoned"),
                }
                Ok(ShouldQuit::False)
            },
            recv(self.input_rx) -> input => match input {
                Ok(input) => self.handle_input(&input),
                Err(_) => Ok(ShouldQuit::True),
            },
            recv(self.server.events()) -> event => match event {
                Ok(event) => Ok(self.handle_server_event(event)),
                Err(_) => Ok(ShouldQuit::False),
            },
            recv(self.changes) -> _ => {
                self.on_change();
                Ok(ShouldQuit::False)
            },
        }
    }

    fn handle_server_event(&mut self, event: ServerEvent) -> ShouldQuit {
        match event {
            ServerEvent::ServerStart { .. } => ShouldQuit::False,
            ServerEvent::DelveMessage(line) => {
                tracing::debug!(target: "delve", "{line}");
                ShouldQuit::False
            }
            ServerEvent::Error(line) => {
                println!("\n{line}");
                ShouldQuit::False
            }
            ServerEvent::Fatal(detail) => {
                println!("\n{detail}");
                if let Ok(session) = self.session() {
                    session.teardown();
                }
                ShouldQuit::True
            }
        }
    }

    fn on_change(&mut self) {
        // drain bursts of notifications from a single command
        while self.changes.try_recv().is_ok() {}

        let Ok(session) = self.session() else {
            return;
        };
        let scope = session.run_state().scope();
        if scope != self.last_scope {
            if let Some(scope) = &scope {
                println!("\n{}", render::scope(Some(scope)));
            }
            self.last_scope = scope;
        }
    }

    fn handle_input(&mut self, input: &str) -> eyre::Result<ShouldQuit> {
        if input.is_empty() {
            return Ok(ShouldQuit::False);
        }
        let command = match input.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                return Ok(ShouldQuit::False);
            }
        };
        tracing::debug!(?command, "executing command");
        match self.execute(command) {
            Ok(quit) => Ok(quit),
            Err(e) => {
                println!("{e:#}");
                Ok(ShouldQuit::False)
            }
        }
    }

    fn execute(&mut self, command: Command) -> eyre::Result<ShouldQuit> {
        if self.running.is_some() {
            match command {
                Command::Quit => return Ok(ShouldQuit::True),
                Command::Help => println!("{HELP}"),
                _ => println!("program is running, wait for it to stop or quit with `q`"),
            }
            return Ok(ShouldQuit::False);
        }

        let session = self.session()?;
        let debugger = session.debugger();
        let run_state = session.run_state();

        match command {
            Command::Break { at, name } => self.create_breakpoint(&at, name)?,
            Command::BreakPattern(pattern) => {
                let created = self
                    .runtime
                    .block_on(debugger.create_breakpoint_from_pattern(&pattern))
                    .wrap_err_with(|| format!("setting breakpoints on {pattern}"))?;
                for bp in created {
                    println!("breakpoint {} set at {}", bp.id, bp.location.to_pattern());
                }
            }
            Command::Condition { id, expression } => self
                .runtime
                .block_on(debugger.set_breakpoint_condition(id, &expression))
                .wrap_err_with(|| format!("setting condition on breakpoint {id}"))?,
            Command::Clear(id) => self
                .runtime
                .block_on(debugger.clear_breakpoint(id))
                .wrap_err_with(|| format!("clearing breakpoint {id}"))?,
            Command::ClearAll => self
                .runtime
                .block_on(debugger.clear_all_breakpoints())
                .context("clearing breakpoints")?,
            Command::Continue => self.resume(Resume::Run(RunCommand::Continue))?,
            Command::Next => self.resume(Resume::Run(RunCommand::Next))?,
            Command::Step => self.resume(Resume::Run(RunCommand::Step))?,
            Command::StepInstruction => self.resume(Resume::Run(RunCommand::StepInstruction))?,
            Command::Restart => self.resume(Resume::Restart)?,
            Command::Print(expression) => {
                let evaluation = self
                    .runtime
                    .block_on(debugger.evaluate(&expression))
                    .wrap_err_with(|| format!("evaluating {expression}"))?;
                println!("{}", render::evaluation(&evaluation));
            }
            Command::Where => println!("{}", render::scope(run_state.scope().as_ref())),
            Command::Backtrace => match run_state.stacktrace() {
                Some(frames) => println!("{}", render::frames(&frames)),
                None => {
                    let frames = self
                        .runtime
                        .block_on(debugger.fetch_stacktrace())
                        .context("loading stacktrace")?;
                    tracing::debug!(count = frames.len(), "stacktrace loaded");
                    if let Some(frames) = run_state.stacktrace() {
                        println!("{}", render::frames(&frames));
                    }
                }
            },
            Command::Threads => println!("{}", render::threads(&run_state.threads())),
            Command::Goroutines => println!("{}", render::goroutines(&run_state.goroutines())),
            Command::Locals => println!("{}", render::variables(&run_state.locals())),
            Command::Args => println!("{}", render::variables(&run_state.args())),
            Command::ListBreakpoints => {
                println!("{}", render::breakpoints(&session.breakpoints().breakpoints()))
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(ShouldQuit::True),
        }
        Ok(ShouldQuit::False)
    }

    /// Start a run-control command on the runtime. Its outcome arrives on
    /// `self.running` so the loop keeps serving input and server output.
    fn resume(&mut self, resume: Resume) -> eyre::Result<()> {
        let debugger = self.session()?.debugger().clone();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        tracing::debug!(?resume, "resuming program");
        self.runtime.spawn(async move {
            let outcome = match resume {
                Resume::Run(command) => debugger.run(command).await,
                Resume::Restart => debugger.restart().await,
            };
            let _ = done_tx.send(outcome);
        });
        self.running = Some(done_rx);
        Ok(())
    }

    fn report(&self, outcome: debugger::Result<RunOutcome>) -> eyre::Result<()> {
        match outcome.context("running program")? {
            RunOutcome::Paused(_) => {}
            RunOutcome::Exited { exit_status } => {
                println!("program exited with status {exit_status}")
            }
        }
        Ok(())
    }

    /// Detach from delve, killing the debuggee, and stop the server.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            if self.running.take().is_some() {
                // delve does not answer a detach while the program runs;
                // stopping the server below kills the program instead
                session.teardown();
            } else if let Err(e) = self.runtime.block_on(session.end(true)) {
                tracing::warn!(error = %e, "detaching from delve");
            }
        }
        self.server.end_session();
    }
}
