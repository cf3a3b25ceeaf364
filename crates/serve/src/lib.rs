//! Loopback artifact servers for finished runs.
//!
//! - [`EphemeralHttpServer`] serves a run's report directory from a
//!   dedicated background thread.
//! - [`EmbeddedQueryServer`] serves a queryable view of a dataset file as a
//!   task on the caller's runtime.
//!
//! Both bind `127.0.0.1` on ports handed out by [`port::allocate`].

pub mod error;
pub mod port;
pub mod query;
pub mod slot;
pub mod static_site;

pub use error::{ApiError, ServerError};
pub use query::{EmbeddedQueryServer, ReadinessOptions};
pub use slot::ServerSlot;
pub use static_site::{EphemeralHttpServer, StaticSite};
