//! Method and tool hub facade.
//!
//! Bundles the hub crates behind feature flags. Services register methods in
//! code, load tools from configuration, validate the two against each other,
//! and dispatch requests through [`kernel::Hub`].

#![warn(missing_docs, clippy::pedantic)]

/// Names, classifications, contracts, and error kinds.
pub use hub_primitives as primitives;

/// Method and tool registries plus the drift validator.
pub use hub_registry as registry;

/// Caller context and policy engines (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use hub_policy as policy;

/// Request orchestration (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use hub_kernel as kernel;

/// YAML tool configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use hub_config as config;

/// Tracing setup and report logging (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use hub_telemetry as telemetry;

/// Validation command (enabled by `cli` feature).
#[cfg(feature = "cli")]
pub use hub_cli as cli;
