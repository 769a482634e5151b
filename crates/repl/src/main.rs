use std::{path::PathBuf, sync::Mutex, time::Duration};

use clap::Parser;
use color_eyre::eyre::{self, Context};
use debugger::{Session, Store, TcpDelveClient};
use server::{BuildFlags, DelveServer, ServerConfig, ServerEvent, SessionKind};
use tracing_subscriber::filter::EnvFilter;

mod app;
mod commands;
mod render;

use app::{App, ShouldQuit};
use commands::SourceLine;

/// Time allowed for delve to build the package and start listening.
const SERVER_READY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
struct Args {
    /// Directory of the Go package to debug.
    #[clap(default_value = ".")]
    package: PathBuf,

    /// Debug the package's tests instead of its main program.
    #[clap(long)]
    test: bool,

    #[clap(long)]
    host: Option<String>,

    #[clap(short, long)]
    port: Option<u16>,

    /// Flags passed to `go build`.
    #[clap(long)]
    build_flags: Option<String>,

    /// JSON file with server settings; flags take precedence.
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(long)]
    log_server_messages: bool,

    /// Breakpoint to set before the program starts, as `file:line`.
    #[clap(short, long)]
    breakpoint: Vec<SourceLine>,

    #[clap(long, default_value = "delve-repl.log")]
    log_file: PathBuf,
}

impl Args {
    fn server_config(&self) -> eyre::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load_from(path)?,
            None => ServerConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(flags) = &self.build_flags {
            config.build_flags = Some(BuildFlags::One(flags.clone()));
        }
        config.log_server_messages |= self.log_server_messages;
        Ok(config)
    }

    fn session_kind(&self) -> SessionKind {
        if self.test {
            SessionKind::Test
        } else {
            SessionKind::Debug
        }
    }
}

/// Block until delve reports it is listening, echoing anything it prints
/// meanwhile.
fn wait_for_server(server: &DelveServer) -> eyre::Result<(String, u16)> {
    loop {
        let event = server
            .events()
            .recv_timeout(SERVER_READY_TIMEOUT)
            .wrap_err("waiting for delve to start")?;
        match event {
            ServerEvent::ServerStart { host, port } => return Ok((host, port)),
            ServerEvent::DelveMessage(line) => tracing::debug!(target: "delve", "{line}"),
            ServerEvent::Error(line) => eprintln!("{line}"),
            ServerEvent::Fatal(detail) => eyre::bail!("{detail}"),
        }
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install().context("installing color_eyre")?;

    let args = Args::parse();
    let log_file = std::fs::File::create(&args.log_file)
        .wrap_err_with(|| format!("creating log file {}", args.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(log_file))
        .init();

    let config = args.server_config().context("building server configuration")?;
    let package_dir = args
        .package
        .canonicalize()
        .wrap_err_with(|| format!("resolving package directory {}", args.package.display()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building async runtime")?;

    let server = DelveServer::start(args.session_kind(), &package_dir, &config)
        .context("starting delve")?;
    let (host, port) = wait_for_server(&server)?;
    tracing::debug!(%host, %port, "delve listening");

    let client = runtime
        .block_on(TcpDelveClient::connect(format!("{host}:{port}")))
        .context("connecting to delve")?;
    let session = Session::start(client);

    let (changes_tx, changes_rx) = crossbeam_channel::unbounded();
    {
        let tx = changes_tx.clone();
        session.breakpoints().subscribe(move || {
            let _ = tx.send(());
        });
        session.run_state().subscribe(move || {
            let _ = changes_tx.send(());
        });
    }

    let mut app = App::new(runtime, server, session, changes_rx, package_dir);
    for at in &args.breakpoint {
        app.set_breakpoint(at, None);
    }
    tracing::debug!("breakpoints added");
    println!("delve ready, type `help` for commands");

    loop {
        match app.loop_step() {
            Ok(ShouldQuit::True) => break,
            Ok(ShouldQuit::False) => {}
            Err(e) => {
                app.shutdown();
                eyre::bail!("Error running command: {e}");
            }
        }
    }
    app.shutdown();

    Ok(())
}
