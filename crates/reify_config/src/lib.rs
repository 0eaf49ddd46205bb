//! Parsing and validation of `reify.toml` configuration files.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults the engine, cache, and scope analyzer use when built directly.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
