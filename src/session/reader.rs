//! Output readers.
//!
//! One task per output stream (stdout and stderr) decodes lines and pushes
//! them onto the single outbound queue. The caller cannot tell which stream
//! a line came from. Readers never close the queue themselves; it closes
//! once every sender, including the watchdog's, has been dropped.

use std::fmt;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::diagnostics::Diagnostics;
use crate::session::adapter::read_lines;

// ── Stream origin ────────────────────────────────────────────────────────────

/// Which process stream a reader is attached to. Used only for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Settings shared by both readers of a session.
#[derive(Debug, Clone)]
pub struct ReaderContext {
    /// Session identifier for log fields.
    pub session_id: String,
    /// Per-line decode limit.
    pub max_line_bytes: usize,
    /// Diagnostic sink.
    pub diagnostics: Diagnostics,
    /// Stops a reader idling on a stream that is still open.
    pub cancel: CancellationToken,
}

/// Read lines from `stream` and push each onto `outbound_tx`.
///
/// Runs until the stream reaches end-of-file or fails, or the outbound
/// receiver is gone. `ctx.cancel` stops the reader only while it is waiting
/// on an idle stream: lines already buffered are still decoded, and a send
/// waiting for queue space is never abandoned, so a slow consumer loses no
/// output.
///
/// # Examples
///
/// ```rust,ignore
/// let (tx, mut rx) = mpsc::channel(16);
/// tokio::spawn(run_reader(Origin::Stdout, child_stdout, tx, ctx));
/// while let Some(line) = rx.recv().await {
///     println!("{line}");
/// }
/// ```
pub async fn run_reader<R>(
    origin: Origin,
    stream: R,
    outbound_tx: mpsc::Sender<String>,
    ctx: ReaderContext,
) where
    R: AsyncRead + Unpin + Send,
{
    let session_id = ctx.session_id.as_str();
    let mut lines = read_lines(stream, ctx.max_line_bytes);

    loop {
        let item = tokio::select! {
            biased;

            item = lines.next() => item,

            () = ctx.cancel.cancelled() => {
                debug!(session_id, %origin, "reader: cancelled while stream was idle, stopping");
                break;
            }
        };

        match item {
            None => {
                debug!(session_id, %origin, "reader: end of stream");
                break;
            }
            Some(Err(err)) => {
                warn!(session_id, %origin, error = %err, "reader: stream error, stopping");
                break;
            }
            Some(Ok(line)) => {
                ctx.diagnostics
                    .emit(|| format!("{origin} reader got line: {line}"));

                // A line already read is never dropped by cancellation; only a
                // closed receiver ends a pending send.
                if outbound_tx.send(line).await.is_err() {
                    debug!(session_id, %origin, "reader: output queue receiver gone, stopping");
                    break;
                }
            }
        }
    }
}

/// Start the stdout and stderr readers for one session.
///
/// Both tasks feed clones of `outbound_tx`; the caller keeps the original.
#[must_use]
pub fn spawn_output_readers<O, E>(
    stdout: O,
    stderr: E,
    outbound_tx: &mpsc::Sender<String>,
    ctx: &ReaderContext,
) -> Vec<JoinHandle<()>>
where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
{
    vec![
        tokio::spawn(run_reader(
            Origin::Stdout,
            stdout,
            outbound_tx.clone(),
            ctx.clone(),
        )),
        tokio::spawn(run_reader(
            Origin::Stderr,
            stderr,
            outbound_tx.clone(),
            ctx.clone(),
        )),
    ]
}
