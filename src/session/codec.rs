//! Line codec for console process streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a configurable maximum line
//! length so a process that never emits a newline cannot make the session
//! buffer without bound.
//!
//! Two behaviours differ from the wrapped codec:
//!
//! - At end-of-stream, bytes after the last `\n` are discarded instead of
//!   being yielded as a final line. A console that dies mid-line therefore
//!   never produces a truncated line.
//! - A line that exceeds the limit, or that is not valid UTF-8, is logged
//!   and skipped rather than ending the stream.
//!
//! # Usage
//!
//! Use [`LineCodec`] as the codec parameter for
//! [`tokio_util::codec::FramedRead`] over a process's stdout or stderr, and
//! as the [`Encoder`] that frames lines for its stdin. Both directions use
//! `\n` as the delimiter.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use crate::{AppError, Result};

/// Default maximum line length accepted from a process stream: 1 MiB.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1_048_576;

/// Newline framing for process stdin/stdout/stderr.
///
/// # Decoder
///
/// Yields one `String` per `\n`-terminated line with the `\n` (and a
/// preceding `\r`) stripped. Lines longer than the configured limit and
/// lines that are not valid UTF-8 are skipped with a warning; only other
/// I/O failures surface as [`AppError::Io`].
///
/// # Encoder
///
/// Outbound strings are encoded as `item\n`. The max-length limit is a
/// decoder-side concern.
///
/// # Examples
///
/// ```rust,ignore
/// use tokio_util::codec::FramedRead;
/// use console_session::session::codec::LineCodec;
///
/// let lines = FramedRead::new(child_stdout, LineCodec::with_max_length(64 * 1024));
/// ```
#[derive(Debug)]
pub struct LineCodec {
    inner: LinesCodec,
    max_length: usize,
}

impl LineCodec {
    /// Codec with the [`DEFAULT_MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_BYTES)
    }

    /// Codec rejecting inbound lines longer than `max_length` bytes.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    /// Configured decode limit.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ── Decoder ──────────────────────────────────────────────────────────────────

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next complete line, skipping lines that are too long or
    /// not valid UTF-8.
    ///
    /// Returns `Ok(None)` while `src` holds no complete line yet.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] for I/O failures other than invalid UTF-8.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.inner.decode(src) {
                Ok(item) => return Ok(item),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(
                        max_length = self.max_length,
                        "skipping line longer than the configured limit"
                    );
                }
                Err(LinesCodecError::Io(err)) if err.kind() == io::ErrorKind::InvalidData => {
                    warn!(error = %err, "skipping line that is not valid UTF-8");
                }
                Err(LinesCodecError::Io(err)) => return Err(err.into()),
            }
        }
    }

    /// Yield remaining complete lines once the stream reaches EOF, then
    /// drop an unterminated tail.
    ///
    /// # Errors
    ///
    /// Same as [`decode`](Self::decode).
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        if !src.is_empty() {
            debug!(
                discarded_bytes = src.len(),
                "discarding unterminated trailing line at end of stream"
            );
            src.clear();
        }

        Ok(None)
    }
}

// ── Encoder ──────────────────────────────────────────────────────────────────

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = AppError;

    /// Encode `item` as a `\n`-terminated line into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] on underlying I/O failures.
    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<()> {
        self.inner.encode(item, dst).map_err(|err| match err {
            LinesCodecError::Io(io_err) => AppError::from(io_err),
            LinesCodecError::MaxLineLengthExceeded => {
                AppError::InvalidLine("line exceeds the encoder limit".into())
            }
        })
    }
}
