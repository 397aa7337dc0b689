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

// Object storage capability contract shared by every backend

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Encryption applied to objects before they are written to a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionAlgorithm {
    #[default]
    None,
    Aes256,
}

/// Compression applied to objects before they are written to a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    #[default]
    None,
    Gzip,
}

/// Static per-connection properties, fixed when the backend is built
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Main instances accept writes; the rest are read-only replicas
    #[serde(default)]
    pub is_main_instance: bool,

    #[serde(default)]
    pub save_encrypt: EncryptionAlgorithm,

    #[serde(default)]
    pub save_compress: CompressionAlgorithm,

    #[serde(default, skip_serializing)]
    pub encrypt_key: Option<String>,
}

impl ConnectionProperties {
    pub fn main() -> Self {
        Self {
            is_main_instance: true,
            ..Default::default()
        }
    }

    pub fn replica() -> Self {
        Self::default()
    }

    pub fn with_gzip(mut self) -> Self {
        self.save_compress = CompressionAlgorithm::Gzip;
        self
    }

    pub fn with_aes256(mut self, key: impl Into<String>) -> Self {
        self.save_encrypt = EncryptionAlgorithm::Aes256;
        self.encrypt_key = Some(key.into());
        self
    }
}

impl fmt::Debug for ConnectionProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProperties")
            .field("is_main_instance", &self.is_main_instance)
            .field("save_encrypt", &self.save_encrypt)
            .field("save_compress", &self.save_compress)
            .field("encrypt_key", &self.encrypt_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Object storage backend
///
/// Every backend applies its own compression/encryption pipeline, derived
/// from [`ConnectionProperties`], inside `put` and `get`. Callers always
/// hand over and receive plain object bytes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Prepare the backend (create base directories, probe endpoints)
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Fetch and decode an object
    async fn get(&self, container: &str, name: &str) -> Result<Bytes>;

    /// Encode and store an object
    async fn put(&self, container: &str, name: &str, data: Bytes) -> Result<()>;

    /// Delete an object; deleting a missing object is an error
    async fn remove(&self, container: &str, name: &str) -> Result<()>;

    async fn exists(&self, container: &str, name: &str) -> Result<bool>;

    fn properties(&self) -> &ConnectionProperties;

    /// Identifier used in logs and error context
    fn name(&self) -> &str;

    /// Get backend type identifier
    fn backend_type(&self) -> &str;

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
