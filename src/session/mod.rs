//! Interactive console sessions.
//!
//! A [`Session`] owns one long-running console process and four tasks:
//!
//! - two output readers (`reader`) merging stdout and stderr into the
//!   outbound queue,
//! - the input forwarder (`writer`) draining the inbound queue into stdin,
//! - the exit watchdog (`watchdog`) that closes the outbound queue once the
//!   process is gone.
//!
//! Tasks share nothing but the two queues, the session state channel and
//! cancellation tokens.
//!
//! ```text
//! send() ─► inbound (cap 1) ─► forwarder ─► stdin
//! receive() ◄─ outbound (cap 5000) ◄─┬─ stdout reader
//!                                    └─ stderr reader
//! ```

pub mod adapter;
pub mod codec;
pub mod handshake;
pub mod process;
pub mod reader;
pub mod watchdog;
pub mod writer;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::diagnostics::Diagnostics;
use crate::session::adapter::LineWriter;
use crate::session::process::{LaunchedProcess, Launcher, OsLauncher};
use crate::session::reader::ReaderContext;
use crate::session::watchdog::Watchdog;
use crate::{AppError, Result};

/// Lifecycle of a session.
///
/// `Launching → Ready → ShuttingDown → Terminated`, with `Ready →
/// Terminated` when the process exits on its own and `Launching →
/// FailedStartup` when the handshake fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Process started, banner not yet verified.
    Launching,
    /// Banner verified; lines flow both ways.
    Ready,
    /// `close` was called; waiting for the process to exit.
    ShuttingDown,
    /// The process has exited.
    Terminated {
        /// Exit code, `None` when ended by a signal or unknown.
        exit_code: Option<i32>,
    },
    /// The handshake failed; the session was never handed out.
    FailedStartup,
}

impl SessionState {
    /// Whether the process is known to have exited.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated { .. })
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launching => f.write_str("launching"),
            Self::Ready => f.write_str("ready"),
            Self::ShuttingDown => f.write_str("shutting_down"),
            Self::Terminated {
                exit_code: Some(code),
            } => write!(f, "terminated ({code})"),
            Self::Terminated { exit_code: None } => f.write_str("terminated"),
            Self::FailedStartup => f.write_str("failed_startup"),
        }
    }
}

/// Cloneable producer for the session's inbound queue.
///
/// Each line is written to the process in a single write, so concurrent
/// senders never interleave partial lines.
#[derive(Debug, Clone)]
pub struct LineSender {
    tx: mpsc::Sender<String>,
    input_closed: CancellationToken,
    diagnostics: Diagnostics,
}

impl LineSender {
    /// Queue `line` for the process; waits while the inbound queue is full.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidLine` if `line` contains `\n` or `\r`.
    /// - `AppError::Closed` once the session's input side has been closed.
    pub async fn send(&self, line: impl Into<String>) -> Result<()> {
        let line = line.into();

        if line.contains(['\n', '\r']) {
            return Err(AppError::InvalidLine(format!(
                "line must not contain a terminator: {line:?}"
            )));
        }

        if self.input_closed.is_cancelled() {
            return Err(AppError::Closed("session input is closed".into()));
        }

        self.enqueue(line).await
    }

    async fn enqueue(&self, line: String) -> Result<()> {
        self.diagnostics
            .emit(|| format!("queueing line for input: {line}"));
        self.tx
            .send(line)
            .await
            .map_err(|_| AppError::Closed("input forwarder has stopped".into()))
    }

    /// Whether the session's input side has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.input_closed.is_cancelled()
    }
}

/// Caller-facing handle to a running console session.
///
/// Dropping a session without calling [`close`](Self::close) closes the
/// process's stdin but sends no quit command and does not kill it.
#[derive(Debug)]
pub struct Session {
    id: String,
    pid: Option<u32>,
    quit_command: String,
    sender: LineSender,
    outbound_rx: mpsc::Receiver<String>,
    force_stop: CancellationToken,
    state_tx: Arc<watch::Sender<SessionState>>,
    state_rx: watch::Receiver<SessionState>,
    tasks: Vec<JoinHandle<()>>,
    diagnostics: Diagnostics,
}

impl Session {
    /// Launch `config.command` as a real OS process without diagnostics.
    ///
    /// # Errors
    ///
    /// See [`launch_with`](Self::launch_with).
    pub async fn launch(config: &SessionConfig) -> Result<Self> {
        Self::launch_with(&OsLauncher, config, Diagnostics::disabled()).await
    }

    /// Launch through `launcher`, start the session tasks and verify the
    /// startup banner.
    ///
    /// The banner line is consumed and not delivered to
    /// [`receive`](Self::receive). On handshake failure the tasks are
    /// stopped and the process terminated before the error is returned.
    ///
    /// # Errors
    ///
    /// - `AppError::Config` if `config` fails validation.
    /// - `AppError::Launch` if the process or one of its pipes cannot be
    ///   created.
    /// - `AppError::Startup` if the first line is missing, does not contain
    ///   `config.expected_banner`, or does not arrive within the configured
    ///   startup timeout.
    pub async fn launch_with(
        launcher: &dyn Launcher,
        config: &SessionConfig,
        diagnostics: Diagnostics,
    ) -> Result<Self> {
        let mut config = config.clone();
        config.validate()?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let command = config.command_spec();

        diagnostics.emit(|| format!("starting command: {} {:?}", command.program, command.args));
        info!(session_id, program = %command.program, args = ?command.args, "launching console process");

        let LaunchedProcess {
            pid,
            streams,
            handle,
        } = launcher.launch(&command)?;

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);
        let (state_tx, state_rx) = watch::channel(SessionState::Launching);
        let state_tx = Arc::new(state_tx);

        let input_closed = CancellationToken::new();
        let reader_cancel = CancellationToken::new();
        let force_stop = CancellationToken::new();

        let readers = reader::spawn_output_readers(
            streams.stdout,
            streams.stderr,
            &outbound_tx,
            &ReaderContext {
                session_id: session_id.clone(),
                max_line_bytes: config.max_line_bytes,
                diagnostics: diagnostics.clone(),
                cancel: reader_cancel.clone(),
            },
        );

        let forwarder = tokio::spawn(writer::run_forwarder(
            session_id.clone(),
            LineWriter::new(streams.stdin),
            inbound_rx,
            input_closed.clone(),
            diagnostics.clone(),
        ));

        let watchdog = watchdog::spawn_watchdog(Watchdog {
            session_id: session_id.clone(),
            handle,
            readers,
            reader_cancel,
            force_stop: force_stop.clone(),
            outbound_tx,
            state_tx: Arc::clone(&state_tx),
            stop_grace: config.shutdown_grace(),
            drain_grace: config.drain_grace(),
            diagnostics: diagnostics.clone(),
        });

        let mut session = Self {
            id: session_id,
            pid,
            quit_command: config.quit_command.clone(),
            sender: LineSender {
                tx: inbound_tx,
                input_closed,
                diagnostics: diagnostics.clone(),
            },
            outbound_rx,
            force_stop,
            state_tx,
            state_rx,
            tasks: vec![forwarder, watchdog],
            diagnostics,
        };

        let handshake = handshake::await_banner(
            &mut session.outbound_rx,
            &config.expected_banner,
            config.startup_timeout(),
            &session.id,
        )
        .await;

        match handshake {
            Ok(_) => {
                session.state_tx.send_if_modified(|state| {
                    if *state == SessionState::Launching {
                        *state = SessionState::Ready;
                        true
                    } else {
                        false
                    }
                });
                info!(session_id = session.id.as_str(), pid = ?session.pid, "console session ready");
                Ok(session)
            }
            Err(err) => {
                warn!(session_id = session.id.as_str(), %err, "console startup failed");
                session.state_tx.send_replace(SessionState::FailedStartup);
                session.abort().await;
                Err(err)
            }
        }
    }

    /// Session identifier used in log fields.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// OS process id, when known.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// A cloneable producer for the inbound queue.
    #[must_use]
    pub fn sender(&self) -> LineSender {
        self.sender.clone()
    }

    /// Queue `line` for the process.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidLine` if `line` contains `\n` or `\r`.
    /// - `AppError::Closed` after [`close`](Self::close).
    pub async fn send(&self, line: impl Into<String>) -> Result<()> {
        self.sender.send(line).await
    }

    /// Next line of process output, from stdout or stderr.
    ///
    /// Returns `None` once the process has exited and both output streams
    /// have been drained; every later call returns `None` as well.
    pub async fn receive(&mut self) -> Option<String> {
        self.outbound_rx.recv().await
    }

    /// Send the quit command, then close the input side.
    ///
    /// Cooperative: relies on the process honouring the quit command. The
    /// quit command is sent at most once; later calls return `Ok(())`
    /// without doing anything. After this, `send` fails with
    /// `AppError::Closed`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Closed` if the input forwarder stopped before the
    /// quit command could be queued. Input is closed regardless.
    pub async fn close(&mut self) -> Result<()> {
        if self.sender.is_closed() {
            return Ok(());
        }

        self.state_tx.send_if_modified(|state| {
            if matches!(state, SessionState::Launching | SessionState::Ready) {
                *state = SessionState::ShuttingDown;
                true
            } else {
                false
            }
        });

        info!(session_id = self.id.as_str(), quit = self.quit_command.as_str(), "closing console session");
        let queued = self.sender.enqueue(self.quit_command.clone()).await;

        self.sender.input_closed.cancel();
        self.diagnostics.emit(|| "input queue closed".to_owned());

        queued
    }

    /// Wait until the process has exited and return its exit code.
    ///
    /// Output that has not been received stays queued.
    pub async fn wait(&mut self) -> Option<i32> {
        let terminated = self
            .state_rx
            .wait_for(SessionState::is_terminated)
            .await
            .map(|state| *state);

        match terminated {
            Ok(SessionState::Terminated { exit_code }) => exit_code,
            _ => None,
        }
    }

    /// Close the session and make sure the process is gone.
    ///
    /// Calls [`close`](Self::close) and waits up to `grace` for the process
    /// to exit. If it is still running, the watchdog sends a terminate
    /// signal, waits the configured shutdown grace, then kills it. Unread
    /// output is discarded. Returns the exit code once every session task
    /// has finished.
    pub async fn terminate(mut self, grace: Duration) -> Option<i32> {
        match tokio::time::timeout(grace, self.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(session_id = self.id.as_str(), %err, "quit command not delivered");
            }
            Err(_) => {
                warn!(session_id = self.id.as_str(), "input queue stayed full, quit command not queued");
                self.sender.input_closed.cancel();
            }
        }

        self.outbound_rx.close();

        let exit_code = if let Ok(code) = tokio::time::timeout(grace, self.wait()).await {
            code
        } else {
            warn!(session_id = self.id.as_str(), ?grace, "console ignored quit command, stopping it");
            self.force_stop.cancel();
            self.wait().await
        };

        self.join_tasks().await;
        exit_code
    }

    /// Stop everything after a failed handshake.
    async fn abort(&mut self) {
        self.sender.input_closed.cancel();
        self.outbound_rx.close();
        self.force_stop.cancel();
        self.join_tasks().await;
        debug!(session_id = self.id.as_str(), "aborted session tasks joined");
    }

    async fn join_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                warn!(session_id = self.id.as_str(), %err, "session task panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.sender.input_closed.cancel();
    }
}
