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

// Backend factory for creating storage backends from configuration

use super::backend::ObjectStore;
use super::filesystem::FilesystemBackend;
use super::http::HttpBackend;
use super::memory::MemoryBackend;
use crate::config::{BackendEntry, BackendKind};
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

pub struct BackendFactory;

impl BackendFactory {
    /// Create storage backend from configuration
    pub fn create(entry: &BackendEntry) -> Result<Arc<dyn ObjectStore>> {
        let properties = entry.properties.clone();

        let backend: Arc<dyn ObjectStore> = match &entry.kind {
            BackendKind::Memory(config) => Arc::new(MemoryBackend::with_containers(
                &entry.name,
                properties,
                config.containers.iter().cloned(),
            )?),
            BackendKind::Filesystem(config) => Arc::new(FilesystemBackend::new(
                &entry.name,
                config.clone(),
                properties,
            )?),
            BackendKind::Http(config) => {
                Arc::new(HttpBackend::new(&entry.name, config.clone(), properties)?)
            }
        };

        info!(
            "Created {} backend '{}' (main: {}, compress: {:?}, encrypt: {:?})",
            backend.backend_type(),
            backend.name(),
            entry.properties.is_main_instance,
            entry.properties.save_compress,
            entry.properties.save_encrypt
        );

        Ok(backend)
    }

    /// Create every configured backend, preserving configuration order
    pub fn create_all(entries: &[BackendEntry]) -> Result<Vec<Arc<dyn ObjectStore>>> {
        entries.iter().map(Self::create).collect()
    }
}
