//! Supervision of a headless `dlv` process.
//!
//! [`DelveServer::start`] launches `dlv debug` or `dlv test` for a package
//! and reports what happens to it as [`ServerEvent`]s on a channel.

mod config;
mod delve;

pub use config::{BuildFlags, DEFAULT_HOST, DEFAULT_PORT, ServerConfig};
pub use delve::DelveServer;

/// Printed by delve once its API server is up.
const LISTENING_MARKER: &str = "API server listening at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionKind {
    /// Build and debug the package's main program.
    #[default]
    Debug,
    /// Build and debug the package's test binary.
    Test,
}

impl SessionKind {
    fn command(self) -> &'static str {
        match self {
            SessionKind::Debug => "debug",
            SessionKind::Test => "test",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// The API server accepts connections.
    ServerStart { host: String, port: u16 },
    /// A log line from delve itself.
    DelveMessage(String),
    /// Anything else delve or the debugged program printed.
    Error(String),
    /// The process ended without being asked to.
    Fatal(String),
}

/// Arguments for `dlv`, excluding the program name.
pub fn build_args(kind: SessionKind, config: &ServerConfig) -> Vec<String> {
    let mut args = vec![
        kind.command().to_string(),
        "--headless".to_string(),
        "--api-version=2".to_string(),
        format!("--listen={}", config.address()),
    ];
    if let Some(flags) = config.build_flags.as_ref().and_then(|f| f.to_arg()) {
        args.push(format!("--build-flags={flags}"));
    }
    if config.log_server_messages {
        args.push("--log".to_string());
    }
    args
}

/// Whether a line is one of delve's own log lines, which start with a
/// timestamp.
pub fn is_delve_message(line: &str) -> bool {
    let line = line.trim_start();
    line.len() >= 4 && line.as_bytes()[..4].iter().all(u8::is_ascii_digit)
}

/// Address announced on the listening line, e.g.
/// `API server listening at: 127.0.0.1:2345`.
fn parse_listening(line: &str) -> Option<(String, u16)> {
    let (_, rest) = line.split_once(LISTENING_MARKER)?;
    let addr = rest.trim_start_matches(':').trim();
    let (host, port) = addr.rsplit_once(':')?;
    let port = port.parse().ok()?;
    Some((host.trim_matches(['[', ']']).to_string(), port))
}
