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

// Storage backend module
//
// Provides the trait-based capability contract every object storage
// backend implements, plus in-tree backends (memory, filesystem, HTTP
// gateway). Vendor SDK clients plug in by implementing `ObjectStore`.

pub mod backend;
pub mod factory;
pub mod filesystem;
pub mod http;
pub mod memory;

pub use backend::{CompressionAlgorithm, ConnectionProperties, EncryptionAlgorithm, ObjectStore};
pub use factory::BackendFactory;
pub use filesystem::FilesystemBackend;
pub use http::HttpBackend;
pub use memory::MemoryBackend;

use crate::error::StoreError;
use crate::transform::{Pipelines, TransformError};

/// Derive a backend's pipelines, failing fast on a missing encryption key
pub(crate) fn build_pipelines(
    backend: &str,
    properties: &ConnectionProperties,
) -> Result<Pipelines, StoreError> {
    Pipelines::from_properties(properties).map_err(|e| match e {
        TransformError::MissingKey => StoreError::MissingEncryptionKey {
            backend: backend.to_string(),
        },
        other => StoreError::Transform(other),
    })
}
