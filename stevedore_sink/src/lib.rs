//! Data points and the backend they are shipped to.
//!
//! This library is the data half of stevedore: the types that describe a
//! tagged, timestamped, multi-measure data point, a pure encoder that
//! builds one from captured values, and the [`Backend`] trait over the
//! time-series store the points are written to, with an HTTP
//! implementation. It knows nothing about load tests or buffering; the
//! `stevedore` crate owns that pipeline.

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

pub mod backend;
pub mod http;
pub mod point;

pub use backend::{Backend, Error, Retention};
pub use http::HttpBackend;
pub use point::{encode, CommonAttributes, DataPoint, Dimension, MeasureType, Record, Value};
