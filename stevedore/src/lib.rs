//! Load-test telemetry, shipped to a time-series backend.
//!
//! stevedore rides along with a load-generation harness: it subscribes to
//! the harness's event channels, encodes each observation into a data
//! point, buffers points per destination table and flushes them to the
//! backend on a fixed interval. Delivery is at-least-once: a failed write
//! is re-buffered and retried on the next cycle. The pipeline is built to
//! never block and never kill the host load test; backend trouble costs
//! data points, not test time.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

pub mod cache;
pub mod config;
pub mod event;
pub mod flush;
pub mod listener;
pub mod node;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod support;

pub use config::Settings;
pub use event::EventBus;
pub use listener::TelemetryListener;
pub use node::NodeRole;
