//! Temoa desk: run a model off the interactive task and serve what it
//! produced.
//!
//! [`RunOrchestrator`] owns the run state machine and both artifact
//! servers, and reports everything to a [`Collaborator`].

pub mod artifacts;
pub mod cli;
pub mod collaborator;
pub mod config;
pub mod orchestrator;
pub mod terminal;

pub use collaborator::Collaborator;
pub use config::DeskConfig;
pub use orchestrator::{RunDefaults, RunOrchestrator, RunState};
pub use terminal::TerminalFrontend;
