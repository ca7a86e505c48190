//! Console process creation.
//!
//! [`Launcher`] is the process-creation capability: given a [`CommandSpec`]
//! it yields three raw byte streams plus a [`ProcessHandle`] that can be
//! waited on and stopped. [`OsLauncher`] backs it with `tokio::process`;
//! tests substitute in-memory fakes.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::config::CommandSpec;
use crate::{AppError, Result};

/// Boxed writer attached to the process's stdin.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Boxed reader attached to the process's stdout or stderr.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed future returned by [`ProcessHandle`] methods.
pub type ProcessFuture<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>;

// ── Exit status ──────────────────────────────────────────────────────────────

/// How a process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, `None` if the process was ended by a signal.
    pub code: Option<i32>,
    /// Human-readable description.
    pub reason: String,
}

impl ExitInfo {
    /// Exit with a known code.
    #[must_use]
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            reason: format!("process exited with code {code}"),
        }
    }

    /// Exit without a code (signal, or unknown).
    #[must_use]
    pub fn without_code(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
        }
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        status.code().map_or_else(
            || Self::without_code("process terminated by signal"),
            Self::with_code,
        )
    }
}

// ── Launch capability ────────────────────────────────────────────────────────

/// Waitable, stoppable handle to a launched process.
///
/// Owned exclusively by the session watchdog.
pub trait ProcessHandle: Send {
    /// Wait for the process to exit. May be called again after it resolves.
    fn wait(&mut self) -> ProcessFuture<'_, ExitInfo>;

    /// Ask the process to stop (SIGTERM on Unix).
    fn terminate(&mut self) -> ProcessFuture<'_, ()>;

    /// Force the process to stop.
    fn kill(&mut self) -> ProcessFuture<'_, ()>;
}

/// The three standard streams of a launched process.
pub struct ProcessStreams {
    /// Process stdin.
    pub stdin: BoxedWriter,
    /// Process stdout.
    pub stdout: BoxedReader,
    /// Process stderr.
    pub stderr: BoxedReader,
}

/// Result of a successful launch.
pub struct LaunchedProcess {
    /// OS process id, when there is one.
    pub pid: Option<u32>,
    /// Piped standard streams.
    pub streams: ProcessStreams,
    /// Handle used by the watchdog.
    pub handle: Box<dyn ProcessHandle>,
}

/// Process-creation capability.
pub trait Launcher: Send + Sync {
    /// Start `command` with all three standard streams piped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Launch` if the process cannot be started or any
    /// of its pipes cannot be acquired.
    fn launch(&self, command: &CommandSpec) -> Result<LaunchedProcess>;
}

// ── OS launcher ──────────────────────────────────────────────────────────────

/// Launches real OS processes through `tokio::process`.
///
/// The child inherits the parent environment plus `CommandSpec::env`, and is
/// killed if its handle is dropped while still running.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsLauncher;

impl Launcher for OsLauncher {
    fn launch(&self, command: &CommandSpec) -> Result<LaunchedProcess> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            AppError::Launch(format!("failed to spawn {}: {err}", command.program))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Launch("failed to capture process stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Launch("failed to capture process stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Launch("failed to capture process stderr".into()))?;

        let pid = child.id();
        debug!(?pid, program = %command.program, "console process spawned");

        Ok(LaunchedProcess {
            pid,
            streams: ProcessStreams {
                stdin: Box::new(stdin),
                stdout: Box::new(stdout),
                stderr: Box::new(stderr),
            },
            handle: Box::new(OsProcess { child }),
        })
    }
}

/// [`ProcessHandle`] over a `tokio::process::Child`.
struct OsProcess {
    child: Child,
}

impl OsProcess {
    #[cfg(unix)]
    fn signal_terminate(&mut self) -> io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // Already reaped: nothing to signal.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn signal_terminate(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }
}

impl ProcessHandle for OsProcess {
    fn wait(&mut self) -> ProcessFuture<'_, ExitInfo> {
        Box::pin(async move {
            let status = self.child.wait().await?;
            Ok(ExitInfo::from(status))
        })
    }

    fn terminate(&mut self) -> ProcessFuture<'_, ()> {
        Box::pin(async move { self.signal_terminate() })
    }

    fn kill(&mut self) -> ProcessFuture<'_, ()> {
        Box::pin(async move { self.child.kill().await })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
