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

// In-process backend, keeps encoded objects in memory

use super::backend::{ConnectionProperties, ObjectStore};
use super::build_pipelines;
use crate::transform::Pipelines;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;

/// Backend holding objects in a concurrent map of containers.
///
/// Objects are stored exactly as they would be on a remote service, i.e.
/// after this backend's compression/encryption pipeline ran.
pub struct MemoryBackend {
    name: String,
    properties: ConnectionProperties,
    pipelines: Pipelines,
    containers: DashMap<String, HashMap<String, Bytes>>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>, properties: ConnectionProperties) -> crate::Result<Self> {
        let name = name.into();
        let pipelines = build_pipelines(&name, &properties)?;

        Ok(Self {
            name,
            properties,
            pipelines,
            containers: DashMap::new(),
        })
    }

    /// Create a backend with the given containers already present
    pub fn with_containers<I, S>(
        name: impl Into<String>,
        properties: ConnectionProperties,
        containers: I,
    ) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new(name, properties)?;
        for container in containers {
            backend.create_container(container);
        }
        Ok(backend)
    }

    pub fn create_container(&self, container: impl Into<String>) {
        self.containers.entry(container.into()).or_default();
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.containers.contains_key(container)
    }

    /// Stored (encoded) bytes of an object
    pub fn raw_object(&self, container: &str, name: &str) -> Option<Bytes> {
        self.containers
            .get(container)
            .and_then(|objects| objects.get(name).cloned())
    }

    pub fn object_count(&self) -> usize {
        self.containers.iter().map(|c| c.value().len()).sum()
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn get(&self, container: &str, name: &str) -> Result<Bytes> {
        let raw = self
            .raw_object(container, name)
            .ok_or_else(|| anyhow!("object '{}/{}' not found", container, name))?;

        Ok(self.pipelines.read.decode_blocking(raw).await?)
    }

    async fn put(&self, container: &str, name: &str, data: Bytes) -> Result<()> {
        let encoded = self.pipelines.write.encode_blocking(data).await?;

        let mut objects = match self.containers.get_mut(container) {
            Some(objects) => objects,
            None => bail!("container '{}' does not exist", container),
        };

        debug!(
            "Storing {} bytes as '{}/{}' in memory backend '{}'",
            encoded.len(),
            container,
            name,
            self.name
        );
        objects.insert(name.to_string(), encoded);
        Ok(())
    }

    async fn remove(&self, container: &str, name: &str) -> Result<()> {
        let mut objects = match self.containers.get_mut(container) {
            Some(objects) => objects,
            None => bail!("container '{}' does not exist", container),
        };

        match objects.remove(name) {
            Some(_) => Ok(()),
            None => bail!("object '{}/{}' not found", container, name),
        }
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool> {
        Ok(self.raw_object(container, name).is_some())
    }

    fn properties(&self) -> &ConnectionProperties {
        &self.properties
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn backend_type(&self) -> &str {
        "memory"
    }
}
