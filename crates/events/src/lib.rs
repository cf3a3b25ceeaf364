//! Log relay and interactive-context hand-off.
//!
//! This crate provides the building blocks that carry diagnostics and run
//! outcomes from worker and server contexts to the single interactive
//! context:
//!
//! - [`LogRelay`] / [`RelayReceiver`] - unbounded, order-preserving hand-off
//!   channel of [`InteractiveEvent`]s.
//! - [`RelayLayer`] - `tracing` layer forwarding records into a relay.
//! - [`RunCapture`] / [`RunIo`] - scoped diagnostic capture installed around
//!   one computation.
//! - [`LogView`] - append-only, auto-scrolling view fed by drained batches.

pub mod capture;
pub mod layer;
pub mod relay;
pub mod view;

pub use capture::{LineSink, RunCapture, RunIo};
pub use layer::RelayLayer;
pub use relay::{InteractiveEvent, LogRelay, RelayReceiver};
pub use view::LogView;
