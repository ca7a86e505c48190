//! Session configuration parsing and validation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::session::codec::DEFAULT_MAX_LINE_BYTES;
use crate::{AppError, Result};

/// Startup line printed by the headless browser REPL.
pub const CHROME_BANNER: &str = "Type a Javascript expression to evaluate or \"quit\" to exit.";

/// Line the headless browser REPL interprets as a request to exit.
pub const CHROME_QUIT_COMMAND: &str = "quit";

#[cfg(target_os = "macos")]
const DEFAULT_CHROME_PATH: &str = "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";

#[cfg(target_os = "windows")]
const DEFAULT_CHROME_PATH: &str = r"C:\Program Files\Google\Chrome\Application\chrome.exe";

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const DEFAULT_CHROME_PATH: &str = "google-chrome";

fn default_expected_banner() -> String {
    CHROME_BANNER.into()
}

fn default_quit_command() -> String {
    CHROME_QUIT_COMMAND.into()
}

fn default_inbound_capacity() -> usize {
    1
}

fn default_outbound_capacity() -> usize {
    5000
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

fn default_shutdown_grace_millis() -> u64 {
    5000
}

fn default_drain_grace_millis() -> u64 {
    2000
}

/// Whole milliseconds in `duration`, rounding a non-zero sub-millisecond
/// value up so it never collapses to the "disabled" zero.
fn duration_millis(duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 && !duration.is_zero() {
        1
    } else {
        millis
    }
}

/// Program invocation handed to a [`Launcher`](crate::session::process::Launcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable path or name resolved through `PATH`.
    pub program: String,
    /// Ordered argument list.
    pub args: Vec<String>,
    /// Extra environment variables layered over the inherited environment.
    pub env: HashMap<String, String>,
    /// Working directory for the child, if overridden.
    pub working_dir: Option<PathBuf>,
}

/// Configuration for one console session, parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Console program to launch.
    pub command: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the child process.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Substring the first line of output must contain.
    #[serde(default = "default_expected_banner")]
    pub expected_banner: String,
    /// Line sent to request a graceful exit.
    #[serde(default = "default_quit_command")]
    pub quit_command: String,
    /// Bound of the queue of lines waiting to be written to the process.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
    /// Bound of the queue of lines produced by the process.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// Longest line accepted from the process's output streams.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Handshake timeout in milliseconds; 0 waits indefinitely.
    #[serde(default)]
    pub startup_timeout_millis: u64,
    /// Grace period used by each escalation step of `Session::terminate`.
    #[serde(default = "default_shutdown_grace_millis")]
    pub shutdown_grace_millis: u64,
    /// Time output readers get to reach end-of-file after the process exits.
    #[serde(default = "default_drain_grace_millis")]
    pub drain_grace_millis: u64,
}

impl SessionConfig {
    /// Create a configuration for `command` with every other field defaulted.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            expected_banner: default_expected_banner(),
            quit_command: default_quit_command(),
            inbound_capacity: default_inbound_capacity(),
            outbound_capacity: default_outbound_capacity(),
            max_line_bytes: default_max_line_bytes(),
            startup_timeout_millis: 0,
            shutdown_grace_millis: default_shutdown_grace_millis(),
            drain_grace_millis: default_drain_grace_millis(),
        }
    }

    /// Headless browser REPL against `url`, using the platform's default
    /// browser location.
    #[must_use]
    pub fn headless_chrome(url: impl Into<String>) -> Self {
        Self::headless_chrome_at(DEFAULT_CHROME_PATH, url)
    }

    /// Headless browser REPL against `url` using the browser at `chrome_path`.
    #[must_use]
    pub fn headless_chrome_at(chrome_path: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(chrome_path)
            .with_args(["--headless", "--disable-gpu", "--repl"])
            .with_arg(url)
            .with_banner(CHROME_BANNER)
            .with_quit_command(CHROME_QUIT_COMMAND)
    }

    /// Append an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments in order.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the child's working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the expected startup banner.
    #[must_use]
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.expected_banner = banner.into();
        self
    }

    /// Set the termination command.
    #[must_use]
    pub fn with_quit_command(mut self, quit: impl Into<String>) -> Self {
        self.quit_command = quit.into();
        self
    }

    /// Set both queue capacities.
    #[must_use]
    pub fn with_capacities(mut self, inbound: usize, outbound: usize) -> Self {
        self.inbound_capacity = inbound;
        self.outbound_capacity = outbound;
        self
    }

    /// Set the handshake timeout; `Duration::ZERO` waits indefinitely.
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout_millis = duration_millis(timeout);
        self
    }

    /// Set the grace period used when terminating the session.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_millis = duration_millis(grace);
        self
    }

    /// Set the reader drain window after process exit.
    #[must_use]
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace_millis = duration_millis(grace);
        self
    }

    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field constraints and canonicalize `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first offending field.
    pub fn validate(&mut self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(AppError::Config("command must not be empty".into()));
        }

        if self.expected_banner.is_empty() {
            return Err(AppError::Config("expected_banner must not be empty".into()));
        }

        if self.quit_command.is_empty() {
            return Err(AppError::Config("quit_command must not be empty".into()));
        }

        if self.quit_command.contains(['\n', '\r']) {
            return Err(AppError::Config(
                "quit_command must not contain a line terminator".into(),
            ));
        }

        if self.inbound_capacity == 0 || self.outbound_capacity == 0 {
            return Err(AppError::Config(
                "queue capacities must be greater than zero".into(),
            ));
        }

        if self.max_line_bytes == 0 {
            return Err(AppError::Config(
                "max_line_bytes must be greater than zero".into(),
            ));
        }

        if let Some(dir) = &self.working_dir {
            let canonical = dir
                .canonicalize()
                .map_err(|err| AppError::Config(format!("working_dir invalid: {err}")))?;
            self.working_dir = Some(canonical);
        }

        Ok(())
    }

    /// Invocation to hand to a launcher.
    #[must_use]
    pub fn command_spec(&self) -> CommandSpec {
        CommandSpec {
            program: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            working_dir: self.working_dir.clone(),
        }
    }

    /// Handshake timeout, or `None` to wait indefinitely.
    #[must_use]
    pub fn startup_timeout(&self) -> Option<Duration> {
        (self.startup_timeout_millis > 0).then(|| Duration::from_millis(self.startup_timeout_millis))
    }

    /// Grace period for each step of forced termination.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_millis)
    }

    /// Reader drain window after process exit.
    #[must_use]
    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_millis)
    }
}
