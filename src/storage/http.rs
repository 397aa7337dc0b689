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

// HTTP object gateway backend
//
// Speaks a minimal REST object protocol:
//   PUT/GET/DELETE/HEAD {url}/{container}/{name}

use super::backend::{ConnectionProperties, ObjectStore};
use super::build_pipelines;
use crate::config::HttpConfig;
use crate::transform::Pipelines;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpBackend {
    name: String,
    client: Client,
    base_url: Url,
    properties: ConnectionProperties,
    pipelines: Pipelines,
}

impl HttpBackend {
    pub fn new(
        name: impl Into<String>,
        config: HttpConfig,
        properties: ConnectionProperties,
    ) -> crate::Result<Self> {
        let name = name.into();
        let pipelines = build_pipelines(&name, &properties)?;

        let base_url = Url::parse(&config.url).map_err(|e| {
            crate::StoreError::InvalidConfig(format!(
                "invalid url '{}' for backend '{}': {}",
                config.url, name, e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(crate::StoreError::InvalidConfig(format!(
                "url '{}' for backend '{}' cannot carry object paths",
                config.url, name
            )));
        }

        let mut client_builder = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(config.timeout_seconds));

        // Add API token if provided
        if let Some(token) = &config.api_token {
            let mut headers = reqwest::header::HeaderMap::new();
            let auth_value = format!("Bearer {}", token);
            let header = reqwest::header::HeaderValue::from_str(&auth_value).map_err(|_| {
                crate::StoreError::InvalidConfig(format!("invalid API token for backend '{}'", name))
            })?;
            headers.insert(reqwest::header::AUTHORIZATION, header);
            client_builder = client_builder.default_headers(headers);
        }

        let client = client_builder.build().map_err(|e| {
            crate::StoreError::InvalidConfig(format!(
                "failed to build HTTP client for backend '{}': {}",
                name, e
            ))
        })?;

        Ok(Self {
            name,
            client,
            base_url,
            properties,
            pipelines,
        })
    }

    /// `{url}/{container}/{name}` with every path segment percent-encoded;
    /// `/` inside `name` keeps separating segments
    fn object_url(&self, container: &str, name: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("url '{}' cannot carry object paths", self.base_url))?
            .pop_if_empty()
            .push(container)
            .extend(name.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for HttpBackend {
    async fn get(&self, container: &str, name: &str) -> Result<Bytes> {
        let url = self.object_url(container, name)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            bail!("GET {} failed with status {}: {}", url, status, error_text);
        }

        let raw = response.bytes().await.context("Failed to read response body")?;
        Ok(self.pipelines.read.decode_blocking(raw).await?)
    }

    async fn put(&self, container: &str, name: &str, data: Bytes) -> Result<()> {
        let url = self.object_url(container, name)?;
        let encoded = self.pipelines.write.encode_blocking(data).await?;

        debug!("Uploading {} bytes to {}", encoded.len(), url);

        let response = self
            .client
            .put(url.clone())
            .header("Content-Type", "application/octet-stream")
            .body(encoded)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("PUT {} failed with status {}: {}", url, status, error_text);
        }

        Ok(())
    }

    async fn remove(&self, container: &str, name: &str) -> Result<()> {
        let url = self.object_url(container, name)?;
        let response = self
            .client
            .delete(url.clone())
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("DELETE {} failed with status {}: {}", url, status, error_text);
        }

        Ok(())
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool> {
        let url = self.object_url(container, name)?;
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .context("Failed to send request")?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => bail!("HEAD {} failed with status {}", url, status),
        }
    }

    fn properties(&self) -> &ConnectionProperties {
        &self.properties
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn backend_type(&self) -> &str {
        "http"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.base_url.clone()).send().await {
            Ok(response) => Ok(!response.status().is_server_error()),
            Err(e) => {
                warn!("Health check failed for '{}': {}", self.base_url, e);
                Ok(false)
            }
        }
    }
}
