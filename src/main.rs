#![forbid(unsafe_code)]

//! `console-session`: interactive bridge to a REPL-style console process.
//!
//! Launches the configured console, relays lines typed on this terminal to
//! it and prints everything it writes. Ends on stdin EOF, Ctrl-C or SIGTERM
//! by asking the console to quit and escalating if it does not.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use console_session::session::process::OsLauncher;
use console_session::{AppError, Diagnostics, Result, Session, SessionConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "console-session",
    about = "Interactive line session with a REPL-style console process",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML session configuration file.
    #[arg(long, required_unless_present = "chrome_url", conflicts_with = "chrome_url")]
    config: Option<PathBuf>,

    /// Start a headless browser REPL against this URL instead of reading a
    /// configuration file.
    #[arg(long)]
    chrome_url: Option<String>,

    /// Browser executable used with `--chrome-url`.
    #[arg(long, requires = "chrome_url")]
    chrome_path: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Log every queued line, write, read and queue transition.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn session_config(&self) -> Result<SessionConfig> {
        match (&self.config, &self.chrome_url) {
            (Some(path), _) => SessionConfig::load_from_path(path),
            (None, Some(url)) => Ok(match &self.chrome_path {
                Some(chrome) => SessionConfig::headless_chrome_at(chrome, url),
                None => SessionConfig::headless_chrome(url),
            }),
            (None, None) => Err(AppError::Config(
                "either --config or --chrome-url is required".into(),
            )),
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format, args.debug)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = args.session_config()?;
    let grace = config.shutdown_grace();
    let diagnostics = if args.debug {
        Diagnostics::tracing()
    } else {
        Diagnostics::disabled()
    };

    let mut session = Session::launch_with(&OsLauncher, &config, diagnostics).await?;
    info!(session_id = session.id(), pid = ?session.pid(), "console ready");

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut input_open = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }

            line = input.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    if let Err(err) = session.send(line).await {
                        warn!(%err, "line not sent");
                    }
                }
                Ok(None) => {
                    info!("stdin closed, closing console session");
                    input_open = false;
                    if let Err(err) = session.close().await {
                        warn!(%err, "quit command not sent");
                    }
                }
                Err(err) => {
                    error!(%err, "failed to read stdin");
                    input_open = false;
                    if let Err(err) = session.close().await {
                        warn!(%err, "quit command not sent");
                    }
                }
            },

            output = session.receive() => match output {
                Some(line) => {
                    stdout.write_all(line.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
                None => {
                    info!("console output ended");
                    break;
                }
            },
        }
    }

    let exit_code = session.terminate(grace).await;
    info!(?exit_code, "console-session shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

/// Filter directive that lets `--debug` diagnostics through.
const DIAGNOSTICS_DIRECTIVE: &str = "console_session::diagnostics=debug";

fn init_tracing(log_format: LogFormat, debug: bool) -> Result<()> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = log_filter(from_env.as_deref(), debug)?;
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}

/// Build the log filter from `RUST_LOG` (falling back to `info`), adding
/// the diagnostics directive when `--debug` is set so an explicit
/// `RUST_LOG` cannot silence it.
fn log_filter(from_env: Option<&str>, debug: bool) -> Result<EnvFilter> {
    let filter = from_env
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    if !debug {
        return Ok(filter);
    }

    let directive = DIAGNOSTICS_DIRECTIVE
        .parse()
        .map_err(|err| AppError::Config(format!("invalid log directive: {err}")))?;
    Ok(filter.add_directive(directive))
}
