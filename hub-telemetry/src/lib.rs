//! Observability helpers for hub binaries.

#![warn(missing_docs, clippy::pedantic)]

pub mod report;
pub mod tracing_support;

pub use report::log_report;
pub use tracing_support::{TelemetryError, Verbosity, init_tracing};
