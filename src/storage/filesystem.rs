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

// Filesystem backend implementation

use super::backend::{ConnectionProperties, ObjectStore};
use super::build_pipelines;
use crate::config::FilesystemConfig;
use crate::transform::Pipelines;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Filesystem backend storing each container as a directory under `base_path`
pub struct FilesystemBackend {
    name: String,
    base_path: PathBuf,
    create_containers: bool,
    properties: ConnectionProperties,
    pipelines: Pipelines,
}

impl FilesystemBackend {
    pub fn new(
        name: impl Into<String>,
        config: FilesystemConfig,
        properties: ConnectionProperties,
    ) -> crate::Result<Self> {
        let name = name.into();
        let base_path = PathBuf::from(&config.base_path);
        let pipelines = build_pipelines(&name, &properties)?;

        info!(
            "Initializing filesystem backend '{}' at: {}",
            name,
            base_path.display()
        );

        Ok(Self {
            name,
            base_path,
            create_containers: config.create_containers,
            properties,
            pipelines,
        })
    }

    /// Ensure base directory exists
    async fn ensure_base_directory(&self) -> Result<()> {
        if !self.base_path.exists() {
            info!("Creating base directory: {}", self.base_path.display());
            fs::create_dir_all(&self.base_path)
                .await
                .context("Failed to create base directory")?;
        }
        Ok(())
    }

    fn container_path(&self, container: &str) -> Result<PathBuf> {
        Ok(self.base_path.join(checked_relative(container)?))
    }

    /// Get the file path for a given container and object name
    fn object_path(&self, container: &str, name: &str) -> Result<PathBuf> {
        Ok(self.container_path(container)?.join(checked_relative(name)?))
    }

    /// Create a container directory
    pub async fn create_container(&self, container: &str) -> Result<()> {
        let path = self.container_path(container)?;
        fs::create_dir_all(&path)
            .await
            .with_context(|| format!("Failed to create container: {}", path.display()))
    }
}

/// Reject names that would escape the container directory
fn checked_relative(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    if name.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
        bail!("invalid object path '{}'", name);
    }
    Ok(path)
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    async fn initialize(&self) -> Result<()> {
        self.ensure_base_directory().await
    }

    async fn get(&self, container: &str, name: &str) -> Result<Bytes> {
        let file_path = self.object_path(container, name)?;
        let raw = fs::read(&file_path)
            .await
            .with_context(|| format!("Failed to read file: {}", file_path.display()))?;

        Ok(self.pipelines.read.decode_blocking(Bytes::from(raw)).await?)
    }

    async fn put(&self, container: &str, name: &str, data: Bytes) -> Result<()> {
        let container_dir = self.container_path(container)?;
        if !container_dir.is_dir() {
            if !self.create_containers {
                bail!("container '{}' does not exist", container);
            }
            debug!("Creating container directory: {}", container_dir.display());
            fs::create_dir_all(&container_dir)
                .await
                .context("Failed to create container directory")?;
        }

        let file_path = self.object_path(container, name)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create object directory")?;
        }

        let encoded = self.pipelines.write.encode_blocking(data).await?;

        debug!("Writing {} bytes to {}", encoded.len(), file_path.display());

        let mut file = fs::File::create(&file_path)
            .await
            .with_context(|| format!("Failed to create file: {}", file_path.display()))?;

        file.write_all(&encoded)
            .await
            .context("Failed to write data")?;

        file.flush().await.context("Failed to flush data")?;

        Ok(())
    }

    async fn remove(&self, container: &str, name: &str) -> Result<()> {
        let file_path = self.object_path(container, name)?;
        fs::remove_file(&file_path)
            .await
            .with_context(|| format!("Failed to remove file: {}", file_path.display()))
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool> {
        let file_path = self.object_path(container, name)?;
        match fs::metadata(&file_path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context("Failed to stat object"),
        }
    }

    fn properties(&self) -> &ConnectionProperties {
        &self.properties
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn backend_type(&self) -> &str {
        "filesystem"
    }

    async fn health_check(&self) -> Result<bool> {
        // Check if base directory is accessible and writable
        match fs::metadata(&self.base_path).await {
            Ok(metadata) if metadata.is_dir() => {
                let test_file = self.base_path.join(".health_check_test");
                match fs::File::create(&test_file).await {
                    Ok(mut f) => {
                        if let Err(e) = f.write_all(b"test").await {
                            warn!("Health check failed - cannot write: {}", e);
                            return Ok(false);
                        }
                        let _ = fs::remove_file(&test_file).await;
                        Ok(true)
                    }
                    Err(e) => {
                        warn!("Health check failed - cannot create file: {}", e);
                        Ok(false)
                    }
                }
            }
            Ok(_) => {
                warn!(
                    "Health check failed - base path is not a directory: {}",
                    self.base_path.display()
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    "Health check failed - cannot access base path {}: {}",
                    self.base_path.display(),
                    e
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_backend(
        properties: ConnectionProperties,
        create_containers: bool,
    ) -> (FilesystemBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = FilesystemConfig {
            base_path: temp_dir.path().to_string_lossy().to_string(),
            create_containers,
        };
        let backend = FilesystemBackend::new("fs", config, properties).unwrap();
        (backend, temp_dir)
    }

    #[tokio::test]
    async fn test_initialize() {
        let (backend, _temp_dir) = create_test_backend(ConnectionProperties::main(), true);
        let result = backend.initialize().await;
        assert!(result.is_ok());
        assert!(backend.base_path.exists());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (backend, _temp_dir) = create_test_backend(ConnectionProperties::main(), true);
        backend.initialize().await.unwrap();

        let data = Bytes::from_static(b"test data");
        backend.put("docs", "report.pdf", data.clone()).await.unwrap();

        let file_path = backend.object_path("docs", "report.pdf").unwrap();
        assert!(file_path.exists());
        assert_eq!(std::fs::read(&file_path).unwrap(), data.to_vec());
        assert_eq!(backend.get("docs", "report.pdf").await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_nested_object_names() {
        let (backend, _temp_dir) = create_test_backend(ConnectionProperties::main(), true);
        backend
            .put("docs", "2024/q1/report.pdf", Bytes::from_static(b"q1"))
            .await
            .unwrap();
        assert!(backend.exists("docs", "2024/q1/report.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (backend, _temp_dir) = create_test_backend(ConnectionProperties::main(), true);
        let result = backend
            .put("docs", "../escape.txt", Bytes::from_static(b"x"))
            .await;
        assert!(result.is_err());
        assert!(backend.get("/etc", "passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_container_without_auto_create() {
        let (backend, _temp_dir) = create_test_backend(ConnectionProperties::main(), false);
        backend.initialize().await.unwrap();

        let result = backend.put("docs", "a.txt", Bytes::from_static(b"x")).await;
        assert!(result.unwrap_err().to_string().contains("does not exist"));

        backend.create_container("docs").await.unwrap();
        assert!(backend.put("docs", "a.txt", Bytes::from_static(b"x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_encoded_on_disk() {
        let props = ConnectionProperties::main().with_gzip().with_aes256("disk-key");
        let (backend, _temp_dir) = create_test_backend(props, true);
        let data = Bytes::from(b"plain text on disk ".repeat(32));

        backend.put("docs", "a.txt", data.clone()).await.unwrap();

        let on_disk = std::fs::read(backend.object_path("docs", "a.txt").unwrap()).unwrap();
        assert_ne!(on_disk, data.to_vec());
        assert_eq!(backend.get("docs", "a.txt").await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_remove_and_exists() {
        let (backend, _temp_dir) = create_test_backend(ConnectionProperties::main(), true);
        backend.put("docs", "a.txt", Bytes::from_static(b"x")).await.unwrap();
        assert!(backend.exists("docs", "a.txt").await.unwrap());

        backend.remove("docs", "a.txt").await.unwrap();
        assert!(!backend.exists("docs", "a.txt").await.unwrap());
        assert!(backend.remove("docs", "a.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_health_check() {
        let (backend, _temp_dir) = create_test_backend(ConnectionProperties::main(), true);
        backend.initialize().await.unwrap();

        let result = backend.health_check().await;
        assert!(result.is_ok());
        assert!(result.unwrap());
    }
}
