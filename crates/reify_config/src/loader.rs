//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ReifyConfig;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "reify.toml";

/// Loads and validates a `reify.toml` configuration from a directory.
pub fn load_config(dir: &Path) -> Result<ReifyConfig, ConfigError> {
    let content = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME))?;
    load_config_from_str(&content)
}

/// Parses and validates a `reify.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ReifyConfig, ConfigError> {
    let config: ReifyConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &ReifyConfig) -> Result<(), ConfigError> {
    if config.fingerprint.max_depth == 0 {
        return Err(ConfigError::ValidationError(
            "fingerprint.max_depth must be at least 1".to_string(),
        ));
    }
    if let Some(name) = config
        .scope
        .reconstructable
        .iter()
        .find(|name| name.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(format!(
            "scope.reconstructable contains an empty name: {name:?}"
        )));
    }
    Ok(())
}
