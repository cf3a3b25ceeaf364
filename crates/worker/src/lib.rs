//! Off-thread execution of the optimization run.
//!
//! [`JobRunner`] takes a [`RunRequest`](temoa_core::RunRequest), prepares the
//! output directory and the persisted configuration, invokes a
//! [`Computation`] on a blocking worker thread inside a scoped diagnostic
//! capture, and hands exactly one result back through the relay.

pub mod computation;
pub mod layout;
pub mod materialize;
pub mod runner;

pub use computation::{Computation, ExternalCommand};
pub use materialize::MaterializedConfig;
pub use runner::JobRunner;
