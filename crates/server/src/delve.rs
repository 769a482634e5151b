use std::{
    io::{BufRead, BufReader, Read},
    path::Path,
    process::{Child, Command, Stdio},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};
use eyre::WrapErr;
use nix::{
    sys::signal::{Signal, kill},
    unistd::Pid,
};

use crate::{
    LISTENING_MARKER, ServerConfig, ServerEvent, SessionKind, build_args, is_delve_message,
    parse_listening,
};

/// A running `dlv` process.
///
/// Output is classified on background threads. The event channel closes once
/// the process has exited and all of its output has been read.
pub struct DelveServer {
    pid: Pid,
    ended: Arc<AtomicBool>,
    events: Receiver<ServerEvent>,
    _waiter: JoinHandle<()>,
}

impl std::fmt::Debug for DelveServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelveServer")
            .field("pid", &self.pid)
            .field("ended", &self.ended.load(Ordering::SeqCst))
            .finish()
    }
}

impl DelveServer {
    #[tracing::instrument(skip(package_dir, config), fields(package_dir = %package_dir.as_ref().display()))]
    pub fn start(
        kind: SessionKind,
        package_dir: impl AsRef<Path>,
        config: &ServerConfig,
    ) -> eyre::Result<Self> {
        let dlv = which::which("dlv").map_err(|_| {
            eyre::eyre!("dlv not found in PATH. Install delve: https://github.com/go-delve/delve")
        })?;

        let cwd = package_dir.as_ref();
        let cwd = cwd
            .canonicalize()
            .wrap_err_with(|| format!("resolving package directory {}", cwd.display()))?;

        let mut command = Command::new(dlv);
        command.args(build_args(kind, config)).current_dir(&cwd);
        Self::spawn(command, config)
    }

    /// Run `command` under supervision, treating its output as delve's.
    pub fn spawn(mut command: Command, config: &ServerConfig) -> eyre::Result<Self> {
        tracing::debug!(?command, "starting server process");
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .wrap_err("spawning background process")?;

        let pid = i32::try_from(child.id())
            .map(Pid::from_raw)
            .wrap_err("child process id out of range")?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| eyre::eyre!("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| eyre::eyre!("child stderr was not captured"))?;

        let (tx, events) = crossbeam_channel::unbounded();
        let ended = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicBool::new(false));

        let readers = [
            spawn_reader(stdout, tx.clone(), Arc::clone(&started), config),
            spawn_reader(stderr, tx.clone(), Arc::clone(&started), config),
        ];
        let waiter = spawn_waiter(child, readers, tx, Arc::clone(&ended));

        Ok(Self {
            pid,
            ended,
            events,
            _waiter: waiter,
        })
    }

    pub fn events(&self) -> &Receiver<ServerEvent> {
        &self.events
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Ask delve to shut down. Calling this more than once is harmless.
    pub fn end_session(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(pid = %self.pid, "terminating server");
        if let Err(e) = kill(self.pid, Signal::SIGTERM) {
            tracing::warn!(error = %e, "could not terminate server process");
        }
    }
}

impl Drop for DelveServer {
    fn drop(&mut self) {
        self.end_session();
    }
}

fn spawn_reader(
    stream: impl Read + Send + 'static,
    tx: Sender<ServerEvent>,
    started: Arc<AtomicBool>,
    config: &ServerConfig,
) -> JoinHandle<()> {
    let host = config.host.clone();
    let port = config.port;
    let log_messages = config.log_server_messages;

    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::debug!(error = %e, "error reading server output");
                    break;
                }
            };

            let event = if line.contains(LISTENING_MARKER) && !started.swap(true, Ordering::SeqCst)
            {
                let (host, port) = parse_listening(&line).unwrap_or_else(|| (host.clone(), port));
                tracing::debug!(%host, %port, "server ready");
                ServerEvent::ServerStart { host, port }
            } else if is_delve_message(&line) {
                if log_messages {
                    tracing::debug!(target: "delve", "{line}");
                }
                ServerEvent::DelveMessage(line)
            } else {
                ServerEvent::Error(line)
            };

            if tx.send(event).is_err() {
                tracing::debug!("event receiver dropped");
                break;
            }
        }
    })
}

fn spawn_waiter(
    mut child: Child,
    readers: [JoinHandle<()>; 2],
    tx: Sender<ServerEvent>,
    ended: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for reader in readers {
            let _ = reader.join();
        }

        let status = match child.wait() {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(error = %e, "waiting for server process");
                return;
            }
        };
        tracing::debug!(%status, "server process exited");

        if ended.swap(true, Ordering::SeqCst) {
            return;
        }
        let detail = match status.code() {
            Some(code) => format!("delve exited with code {code}"),
            None => format!("delve exited: {status}"),
        };
        let _ = tx.send(ServerEvent::Fatal(detail));
    })
}
