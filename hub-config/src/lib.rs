//! Configuration for the method and tool hub.
//!
//! Tools are declared in YAML and reference methods registered in code. The
//! same file may carry method declarations for drift checks and the default
//! validation settings. Unknown keys and unknown classification values are
//! rejected while parsing.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_ENV, DEFAULT_CONFIG_PATH, from_yaml_str, load_file, resolve_path};
pub use schema::{HubConfig, ValidationSettings};
