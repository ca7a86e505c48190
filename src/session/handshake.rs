//! Startup banner check.
//!
//! A console is considered up once the first line it produces (on either
//! output stream) contains the expected banner text. The banner line is
//! consumed here and never reaches the caller.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{AppError, Result};

/// Take exactly one line off `outbound_rx` and check it against `expected`.
///
/// Waits indefinitely when `timeout` is `None`.
///
/// # Errors
///
/// - `AppError::Startup("process exited before …")` if the queue closed first.
/// - `AppError::Startup("unable to fetch console startup line …")` if the line
///   does not contain `expected`; the message embeds both texts.
/// - `AppError::Startup("startup timeout …")` if no line arrives within `timeout`.
pub async fn await_banner(
    outbound_rx: &mut mpsc::Receiver<String>,
    expected: &str,
    timeout: Option<Duration>,
    session_id: &str,
) -> Result<String> {
    let first = match timeout {
        Some(limit) => tokio::time::timeout(limit, outbound_rx.recv())
            .await
            .map_err(|_| {
                AppError::Startup(format!(
                    "startup timeout: no startup line within {limit:?} (expected {expected:?})"
                ))
            })?,
        None => outbound_rx.recv().await,
    };

    let Some(line) = first else {
        return Err(AppError::Startup(format!(
            "process exited before emitting startup line (expected {expected:?})"
        )));
    };

    if !line.contains(expected) {
        debug!(session_id, line = line.as_str(), "handshake: unexpected first line");
        return Err(AppError::Startup(format!(
            "unable to fetch console startup line: got {line:?} but expected {expected:?}"
        )));
    }

    info!(session_id, banner = line.as_str(), "handshake: startup banner received");
    Ok(line)
}

// ── Tests ────────────────────────────────────────────────────────────────────
