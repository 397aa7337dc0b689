// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for multistore

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::balancer::LoadBalancingStrategy;
use crate::cache::{CacheOptions, ValidationPolicy};
use crate::client::ReplicationMode;
use crate::storage::ConnectionProperties;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub client: ClientSettings,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub backends: Vec<BackendEntry>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Orchestrator behaviour
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub replication: ReplicationMode,

    #[serde(default)]
    pub load_balancing: LoadBalancingStrategy,

    /// Deadline applied to every synchronous put/get/remove/exists
    #[serde(default)]
    pub operation_timeout_seconds: Option<u64>,
}

impl ClientSettings {
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    #[serde(default = "default_max_items")]
    pub max_items: usize,

    #[serde(default)]
    pub validation: ValidationConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size_mb: default_max_size_mb(),
            ttl_seconds: default_ttl_seconds(),
            max_items: default_max_items(),
            validation: ValidationConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn to_options(&self) -> CacheOptions {
        CacheOptions {
            enabled: self.enabled,
            max_size_mb: self.max_size_mb,
            ttl: Duration::from_secs(self.ttl_seconds),
            max_items: self.max_items,
            validation: self.validation.to_policy(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStrategy {
    #[default]
    None,
    Sampling,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub strategy: ValidationStrategy,

    #[serde(default = "default_sampling_percent")]
    pub sampling_percent: u8,

    #[serde(default = "default_validation_interval")]
    pub interval_seconds: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strategy: ValidationStrategy::None,
            sampling_percent: default_sampling_percent(),
            interval_seconds: default_validation_interval(),
        }
    }
}

impl ValidationConfig {
    pub fn to_policy(&self) -> ValidationPolicy {
        match self.strategy {
            ValidationStrategy::None => ValidationPolicy::None,
            ValidationStrategy::Sampling => ValidationPolicy::sampling(
                self.sampling_percent,
                Duration::from_secs(self.interval_seconds),
            ),
        }
    }
}

/// One configured backend connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendEntry {
    pub name: String,

    #[serde(default)]
    pub properties: ConnectionProperties,

    /// Backend-specific configuration, selected by `type`
    #[serde(flatten)]
    pub kind: BackendKind,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendKind {
    Memory(MemoryConfig),
    Filesystem(FilesystemConfig),
    Http(HttpConfig),
}

impl BackendKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            BackendKind::Memory(_) => "memory",
            BackendKind::Filesystem(_) => "filesystem",
            BackendKind::Http(_) => "http",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Containers created up front
    #[serde(default)]
    pub containers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    pub base_path: String,

    /// Create missing container directories on write
    #[serde(default = "default_create_containers")]
    pub create_containers: bool,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_path: "/data/objects".to_string(),
            create_containers: default_create_containers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    pub url: String,

    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9000".to_string(),
            api_token: None,
            timeout_seconds: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,  // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String,  // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_max_size_mb() -> u64 { 1024 }
fn default_ttl_seconds() -> u64 { 600 }
fn default_max_items() -> usize { 5 }
fn default_sampling_percent() -> u8 { 10 }
fn default_validation_interval() -> u64 { 1800 }
fn default_create_containers() -> bool { false }
fn default_timeout() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
