// Configuration loader with environment variable substitution

use super::types::*;
use crate::storage::EncryptionAlgorithm;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

pub struct ConfigLoader;

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").expect("env substitution pattern is valid")
    })
}

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
        let config = Self::parse_file(path)?;

        // Validate configuration
        Self::validate(&config)?;

        Ok(config)
    }

    /// Read, substitute and parse without validating
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> Result<StoreConfig> {
        // Substitute environment variables
        let content = Self::substitute_env_vars(content);

        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${STORE_KEY:-changeme} -> changeme (if STORE_KEY not set)
    fn substitute_env_vars(content: &str) -> String {
        env_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default_value = caps.get(2).map(|m| m.as_str());

                match std::env::var(var_name) {
                    Ok(value) => value,
                    Err(_) => match default_value {
                        Some(default) => default.to_string(),
                        // Keep original if no default and var not found
                        None => format!("${{{}}}", var_name),
                    },
                }
            })
            .to_string()
    }

    /// Validate configuration
    pub fn validate(config: &StoreConfig) -> Result<()> {
        if config.backends.is_empty() {
            bail!("at least one backend must be configured");
        }

        let mut names = HashSet::new();
        for backend in &config.backends {
            if backend.name.is_empty() {
                bail!("backend name cannot be empty");
            }
            if !names.insert(backend.name.as_str()) {
                bail!("duplicate backend name '{}'", backend.name);
            }

            let props = &backend.properties;
            if props.save_encrypt == EncryptionAlgorithm::Aes256
                && props.encrypt_key.as_deref().map_or(true, str::is_empty)
            {
                bail!(
                    "backend '{}' uses aes256 encryption but encrypt_key is missing",
                    backend.name
                );
            }

            match &backend.kind {
                BackendKind::Filesystem(fs) if fs.base_path.is_empty() => {
                    bail!("backend '{}': filesystem base_path cannot be empty", backend.name)
                }
                BackendKind::Http(http) if http.url.is_empty() => {
                    bail!("backend '{}': http url cannot be empty", backend.name)
                }
                BackendKind::Http(http) if http.timeout_seconds == 0 => {
                    bail!("backend '{}': http timeout_seconds must be > 0", backend.name)
                }
                _ => {}
            }
        }

        // Validate cache limits
        if config.cache.max_items == 0 {
            bail!("cache.max_items must be > 0");
        }

        if config.cache.ttl_seconds == 0 {
            bail!("cache.ttl_seconds must be > 0");
        }

        if config.cache.validation.sampling_percent > 100 {
            bail!("cache.validation.sampling_percent must be 0-100");
        }

        if config.client.operation_timeout_seconds == Some(0) {
            bail!("client.operation_timeout_seconds must be > 0");
        }

        match config.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => bail!("Unknown log level: '{}'", other),
        }

        Ok(())
    }
}
