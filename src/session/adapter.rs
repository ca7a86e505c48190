//! Line-oriented adapters over raw process streams.
//!
//! [`LineWriter`] frames each line with [`LineCodec`] into a scratch buffer
//! and hands the whole frame to the stream in one `write_all`, so a line is
//! never split across writes. [`read_lines`] turns a byte stream into a lazy
//! sequence of lines that ends at end-of-file.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Encoder, FramedRead};

use crate::session::codec::LineCodec;
use crate::{AppError, Result};

// ── Writer ───────────────────────────────────────────────────────────────────

/// Writes terminated lines to a process's input stream.
///
/// Each line is framed into a reusable scratch buffer and written with one
/// `write_all` followed by a flush.
///
/// # Examples
///
/// ```rust,ignore
/// let mut writer = LineWriter::new(child_stdin);
/// let written = writer.write_line("1+1").await?;
/// assert_eq!(written, 4);
/// writer.shutdown().await?;
/// ```
#[derive(Debug)]
pub struct LineWriter<W> {
    inner: W,
    codec: LineCodec,
    frame: BytesMut,
    shut_down: bool,
}

impl<W> LineWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wrap a raw writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            codec: LineCodec::new(),
            frame: BytesMut::new(),
            shut_down: false,
        }
    }

    /// Write `line` followed by `\n` and flush.
    ///
    /// Returns the number of bytes written, terminator included.
    ///
    /// # Errors
    ///
    /// - `AppError::Closed` if [`shutdown`](Self::shutdown) was already called.
    /// - `AppError::Io` if the write or flush fails (e.g. the process exited).
    pub async fn write_line(&mut self, line: &str) -> Result<usize> {
        if self.shut_down {
            return Err(AppError::Closed("input stream already shut down".into()));
        }

        self.frame.clear();
        self.codec.encode(line, &mut self.frame)?;
        self.inner.write_all(&self.frame).await?;
        self.inner.flush().await?;

        Ok(self.frame.len())
    }

    /// Shut down the write half so the process observes end-of-file.
    ///
    /// Calling this more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the underlying shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.inner.shutdown().await?;
        Ok(())
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Lazily decode `reader` into lines of at most `max_line_bytes` bytes.
///
/// The stream yields `Ok(line)` per complete line and ends when the reader
/// reaches end-of-file; an unterminated tail is dropped. It cannot be
/// restarted, only recreated over a new reader.
///
/// # Examples
///
/// ```rust,ignore
/// use futures_util::StreamExt;
///
/// let mut lines = read_lines(child_stdout, DEFAULT_MAX_LINE_BYTES);
/// while let Some(line) = lines.next().await {
///     println!("{}", line?);
/// }
/// ```
pub fn read_lines<R>(reader: R, max_line_bytes: usize) -> FramedRead<R, LineCodec>
where
    R: AsyncRead,
{
    FramedRead::new(reader, LineCodec::with_max_length(max_line_bytes))
}
