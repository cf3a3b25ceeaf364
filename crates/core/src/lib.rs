//! Shared domain types for the Temoa desk run/serve subsystem.
//!
//! Zero internal dependencies: every other workspace crate builds on the
//! values defined here.

pub mod error;
pub mod log_event;
pub mod run;
pub mod server;

pub use error::{CoreError, FailureKind};
pub use log_event::{LogEvent, LogLevel, LogSource};
pub use run::{Overrides, RunId, RunRequest, RunResult, OUTPUT_DATABASE_KEY};
pub use server::{ServerHandle, ServerKind, LOOPBACK_HOST};
