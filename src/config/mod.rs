// Configuration module for multistore
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::Path;
use crate::storage::EncryptionAlgorithm;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
    let mut config = ConfigLoader::parse_file(path).context("Failed to load configuration")?;

    apply_env_overrides(&mut config);

    ConfigLoader::validate(&config)?;
    Ok(config)
}

/// Allow environment variables to override config values
fn apply_env_overrides(config: &mut StoreConfig) {
    if let Ok(level) = std::env::var("MULTISTORE_LOG_LEVEL") {
        config.logging.level = level;
    }

    // Shared key for encrypted backends that do not carry their own
    if let Ok(key) = std::env::var("MULTISTORE_ENCRYPT_KEY") {
        for backend in &mut config.backends {
            let props = &mut backend.properties;
            if props.save_encrypt == EncryptionAlgorithm::Aes256
                && props.encrypt_key.as_deref().map_or(true, str::is_empty)
            {
                props.encrypt_key = Some(key.clone());
            }
        }
    }
}
