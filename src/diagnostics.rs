//! Optional diagnostic side channel.
//!
//! Sessions report every queued line, every write, every line read from the
//! process and every queue transition as a human-readable string. Reports
//! go to an injected [`DiagnosticSink`]; the default [`Diagnostics`] handle
//! is disabled and never builds the message at all.

use std::fmt;
use std::sync::Arc;

/// Receiver of diagnostic strings. Has no effect on session behaviour.
pub trait DiagnosticSink: Send + Sync {
    /// Record one diagnostic message.
    fn record(&self, message: &str);

    /// Whether messages should be built and delivered at all.
    fn enabled(&self) -> bool {
        true
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn record(&self, _message: &str) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// Sink that forwards diagnostics to `tracing` at `DEBUG`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, message: &str) {
        tracing::debug!(target: "console_session::diagnostics", "{message}");
    }
}

/// Cheap, cloneable handle to a shared sink.
#[derive(Clone)]
pub struct Diagnostics(Arc<dyn DiagnosticSink>);

impl Diagnostics {
    /// Wrap `sink`.
    pub fn new(sink: impl DiagnosticSink + 'static) -> Self {
        Self(Arc::new(sink))
    }

    /// Wrap an already shared sink.
    #[must_use]
    pub fn from_shared(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self(sink)
    }

    /// Handle that discards all diagnostics.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(NoopSink)
    }

    /// Handle that routes diagnostics through `tracing`.
    #[must_use]
    pub fn tracing() -> Self {
        Self::new(TracingSink)
    }

    /// Build and record a message if the sink is enabled.
    pub fn emit(&self, message: impl FnOnce() -> String) {
        if self.0.enabled() {
            self.0.record(&message());
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("enabled", &self.0.enabled())
            .finish()
    }
}
