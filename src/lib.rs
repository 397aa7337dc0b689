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

// Multi-backend object storage client
//
// Orchestrates a set of object storage backends behind one facade:
// - Replicates writes to main backends (sync or async consistency)
// - Load balances reads across replicas and mains with fallback
// - Caches reads with TTL, bounded size and background sampling validation
// - Applies per-backend gzip compression and AES-256-GCM encryption

pub mod balancer;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod storage;
pub mod transform;

// Re-export main types
pub use balancer::{BalancerFactory, ClientGroup, LoadBalancer, LoadBalancingStrategy};
pub use cache::{CacheOptions, ObjectCache, ValidationPolicy};
pub use client::{ObjectClient, ReplicationMode};
pub use config::{load_config, load_config_with_env, StoreConfig};
pub use error::{BackendErrors, Operation, Result, StoreError};
pub use storage::{
    BackendFactory, CompressionAlgorithm, ConnectionProperties, EncryptionAlgorithm, ObjectStore,
};
pub use transform::{Pipelines, ReadPipeline, TransformError, WritePipeline};
