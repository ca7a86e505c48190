//! Input forwarder task.
//!
//! Drains the session's inbound queue and writes each line, terminated by
//! `\n`, to the process's stdin through a [`LineWriter`]. Every line goes out
//! in a single write, so lines queued by concurrent [`LineSender`] clones
//! never interleave.
//!
//! A failed write is reported to the diagnostic sink and logged, and the
//! loop carries on: a dead process simply stops consuming input, and the
//! task still exits normally when the session's input side is closed.
//!
//! [`LineSender`]: crate::session::LineSender

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::diagnostics::Diagnostics;
use crate::session::adapter::LineWriter;

// ── Forwarder ────────────────────────────────────────────────────────────────

/// Input forwarder task: writes queued lines to the process's stdin.
///
/// Receives lines from `inbound_rx` in queue order and writes each through
/// `writer`. Emits `got request to write line: …` before each write and
/// `wrote N bytes` or `write failed for line …` after it.
///
/// The task exits cleanly when:
/// - `input_closed` is cancelled and every line already queued has been
///   written (queued lines take priority over the close signal), or
/// - every sender of `inbound_rx` has been dropped.
///
/// On exit the inbound queue is closed and the process's stdin is shut
/// down, so the process observes end-of-file after the last line.
///
/// Write failures never end the task; there is no error return.
///
/// # Examples
///
/// ```rust,ignore
/// let (tx, rx) = mpsc::channel(1);
/// let closed = CancellationToken::new();
/// tokio::spawn(run_forwarder(id, LineWriter::new(child_stdin), rx, closed.clone(), diagnostics));
/// tx.send("1+1".to_owned()).await?;
/// closed.cancel();
/// ```
pub async fn run_forwarder<W>(
    session_id: String,
    mut writer: LineWriter<W>,
    mut inbound_rx: mpsc::Receiver<String>,
    input_closed: CancellationToken,
    diagnostics: Diagnostics,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        let line = tokio::select! {
            biased;

            line = inbound_rx.recv() => {
                if let Some(line) = line {
                    line
                } else {
                    debug!(session_id, "forwarder: all senders dropped, stopping");
                    break;
                }
            }

            () = input_closed.cancelled() => {
                debug!(session_id, "forwarder: input closed, stopping");
                break;
            }
        };

        diagnostics.emit(|| format!("got request to write line: {line}"));

        match writer.write_line(&line).await {
            Ok(written) => diagnostics.emit(|| format!("wrote {written} bytes")),
            Err(err) => {
                diagnostics.emit(|| format!("write failed for line {line:?}: {err}"));
                warn!(session_id, error = %err, "forwarder: write to stdin failed");
            }
        }
    }

    // No line can be queued after this point.
    inbound_rx.close();
    if let Err(err) = writer.shutdown().await {
        debug!(session_id, error = %err, "forwarder: stdin shutdown failed");
    }
}
