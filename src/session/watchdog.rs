//! Process exit watchdog.
//!
//! The watchdog is the only task that waits on the process. When the
//! process exits, on its own or after a forced stop, the watchdog publishes
//! [`SessionState::Terminated`], gives the output readers a bounded window
//! to drain to end-of-file, then drops its outbound sender. Readers still
//! idling on an open stream after that window (a grandchild holding the
//! pipe) are cancelled; readers waiting for queue space keep their lines and
//! finish once the consumer catches up. With every sender gone the outbound
//! queue closes and `Session::receive` returns `None` instead of hanging.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::diagnostics::Diagnostics;
use crate::session::process::{ExitInfo, ProcessHandle};
use crate::session::SessionState;

/// Everything the watchdog task takes ownership of.
pub struct Watchdog {
    /// Session identifier for log fields.
    pub session_id: String,
    /// Handle to the running process.
    pub handle: Box<dyn ProcessHandle>,
    /// The output reader tasks.
    pub readers: Vec<JoinHandle<()>>,
    /// Stops readers still idling on an open stream after the drain window.
    pub reader_cancel: CancellationToken,
    /// Fired by the session to request a forced stop.
    pub force_stop: CancellationToken,
    /// The watchdog's own outbound sender; dropping it closes the queue.
    pub outbound_tx: mpsc::Sender<String>,
    /// Session state publisher.
    pub state_tx: Arc<watch::Sender<SessionState>>,
    /// Grace period for each forced-stop step.
    pub stop_grace: Duration,
    /// Reader drain window after exit.
    pub drain_grace: Duration,
    /// Diagnostic sink.
    pub diagnostics: Diagnostics,
}

/// Start the watchdog task.
#[must_use]
pub fn spawn_watchdog(watchdog: Watchdog) -> JoinHandle<()> {
    tokio::spawn(run_watchdog(watchdog))
}

async fn run_watchdog(watchdog: Watchdog) {
    let Watchdog {
        session_id,
        mut handle,
        readers,
        reader_cancel,
        force_stop,
        outbound_tx,
        state_tx,
        stop_grace,
        drain_grace,
        diagnostics,
    } = watchdog;

    let exited = tokio::select! {
        result = handle.wait() => Some(result),
        () = force_stop.cancelled() => None,
    };

    let result = match exited {
        Some(result) => result,
        None => {
            info!(session_id, "watchdog: forced stop requested");
            force_stop_process(handle.as_mut(), stop_grace, &session_id).await
        }
    };

    let exit = result.unwrap_or_else(|err| {
        warn!(session_id, %err, "watchdog: error waiting for console process");
        ExitInfo::without_code(format!("wait error: {err}"))
    });

    info!(
        session_id,
        exit_code = ?exit.code,
        reason = exit.reason.as_str(),
        "console process exited"
    );
    diagnostics.emit(|| format!("process exited: {}", exit.reason));

    state_tx.send_modify(|state| {
        *state = SessionState::Terminated {
            exit_code: exit.code,
        };
    });

    if tokio::time::timeout(drain_grace, join_all(readers))
        .await
        .is_err()
    {
        debug!(
            session_id,
            ?drain_grace,
            "watchdog: readers still running after drain window, cancelling idle ones"
        );
        reader_cancel.cancel();
    }

    drop(outbound_tx);
    diagnostics.emit(|| "output queue closed".to_owned());
}

// ── Private helpers ──────────────────────────────────────────────────────────

/// Ask politely, wait, then kill.
async fn force_stop_process(
    handle: &mut dyn ProcessHandle,
    grace: Duration,
    session_id: &str,
) -> std::io::Result<ExitInfo> {
    if let Err(err) = handle.terminate().await {
        warn!(session_id, %err, "watchdog: terminate signal failed");
    }

    if let Ok(result) = tokio::time::timeout(grace, handle.wait()).await {
        return result;
    }

    warn!(
        session_id,
        ?grace,
        "watchdog: process ignored terminate signal, killing"
    );
    handle.kill().await?;
    handle.wait().await
}
