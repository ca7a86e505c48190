#![forbid(unsafe_code)]

//! Line-oriented sessions with REPL-style console processes.
//!
//! [`Session`] launches a console program, verifies its startup banner and
//! then exposes two queues: [`Session::send`] for lines going to the
//! process and [`Session::receive`] for lines it prints on stdout or
//! stderr. [`Session::close`] asks the console to quit.

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod session;

pub use config::SessionConfig;
pub use diagnostics::{DiagnosticSink, Diagnostics};
pub use errors::{AppError, Result};
pub use session::{LineSender, Session, SessionState};
