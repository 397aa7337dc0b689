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

// Orchestrator facade over a set of object storage backends
//
// Writes fan out to every main backend (replication), reads go through
// the cache and then the load balancer, removes fan out to every main
// backend. Each backend applies its own transform pipeline internally.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::balancer::{self, BalancerFactory, LoadBalancer, LoadBalancingStrategy};
use crate::cache::{cache_key, CacheOptions, ObjectCache, ValidationPolicy};
use crate::config::StoreConfig;
use crate::error::{Operation, Result, StoreError};
use crate::storage::{BackendFactory, ObjectStore};

/// Write consistency for `put_object`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationMode {
    /// Write to every main backend and wait for all of them
    #[default]
    Sync,
    /// Return after the first successful main backend, write every other
    /// main in the background
    Async,
}

pub struct ObjectClient {
    backends: Vec<Arc<dyn ObjectStore>>,
    replication: ReplicationMode,
    strategy: LoadBalancingStrategy,
    cache: ObjectCache,
    balancer: OnceLock<Arc<dyn LoadBalancer>>,
    operation_timeout: Option<Duration>,
    // Outstanding async-mode replication; detached, awaited on shutdown
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl ObjectClient {
    pub fn new(
        replication: ReplicationMode,
        strategy: LoadBalancingStrategy,
        backends: Vec<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self {
            backends,
            replication,
            strategy,
            cache: ObjectCache::default(),
            balancer: OnceLock::new(),
            operation_timeout: None,
            background: Mutex::new(Vec::new()),
        }
    }

    /// Bound every synchronous operation by `timeout`
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Build backends from configuration, initialize them and apply cache settings
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        let backends = BackendFactory::create_all(&config.backends)?;
        for backend in &backends {
            backend
                .initialize()
                .await
                .map_err(|e| StoreError::InvalidConfig(format!("backend '{}': {:#}", backend.name(), e)))?;
        }

        let mut client = Self::new(
            config.client.replication,
            config.client.load_balancing,
            backends,
        );
        client.operation_timeout = config.client.operation_timeout();
        client.configure_cache(config.cache.to_options()).await;

        info!(
            "Object client ready: {} backends, {:?} replication, {:?} load balancing",
            client.backends.len(),
            client.replication,
            client.strategy
        );
        Ok(client)
    }

    pub fn backends(&self) -> &[Arc<dyn ObjectStore>] {
        &self.backends
    }

    pub fn replication(&self) -> ReplicationMode {
        self.replication
    }

    pub fn strategy(&self) -> LoadBalancingStrategy {
        self.strategy
    }

    fn main_backends(&self) -> Vec<Arc<dyn ObjectStore>> {
        self.backends
            .iter()
            .filter(|b| b.properties().is_main_instance)
            .cloned()
            .collect()
    }

    fn balancer(&self) -> &Arc<dyn LoadBalancer> {
        self.balancer.get_or_init(|| {
            debug!("Building {:?} load balancer", self.strategy);
            BalancerFactory::create(self.strategy, balancer::partition(&self.backends))
        })
    }

    async fn bounded<T, F>(&self, operation: Operation, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.operation_timeout {
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| StoreError::Timeout { operation, after })?,
            None => fut.await,
        }
    }

    /// Read `reader` to the end and store it under `container/name`
    pub async fn put_object<R>(&self, container: &str, name: &str, mut reader: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        if self.main_backends().is_empty() {
            return Err(StoreError::NoMainBackend(Operation::Put));
        }

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.map_err(StoreError::Read)?;
        self.put_bytes(container, name, Bytes::from(buf)).await
    }

    pub async fn put_bytes(&self, container: &str, name: &str, data: Bytes) -> Result<()> {
        let mains = self.main_backends();
        if mains.is_empty() {
            return Err(StoreError::NoMainBackend(Operation::Put));
        }

        let result = match self.replication {
            ReplicationMode::Sync => {
                self.bounded(Operation::Put, put_all(&mains, container, name, data))
                    .await
            }
            ReplicationMode::Async => {
                let first = self
                    .bounded(Operation::Put, put_first(&mains, container, name, data.clone()))
                    .await;
                first.map(|succeeded| {
                    let others = mains
                        .iter()
                        .enumerate()
                        .filter(|(index, _)| *index != succeeded)
                        .map(|(_, backend)| Arc::clone(backend))
                        .collect();
                    self.replicate_in_background(others, container, name, data);
                })
            }
        };

        self.settle(container, name, &result);
        result
    }

    /// Fetch an object, serving from the cache when possible
    pub async fn get_object(&self, container: &str, name: &str) -> Result<Bytes> {
        let key = cache_key(container, name);
        if let Some(data) = self.cache.lookup(&key) {
            debug!("Cache hit for '{}'", key);
            return Ok(data);
        }

        if self.backends.is_empty() {
            return Err(StoreError::NoBackends);
        }

        let data = self
            .bounded(Operation::Get, self.balancer().get_object(container, name))
            .await?;
        self.cache.store(&key, data.clone());
        Ok(data)
    }

    /// Remove an object from every main backend
    pub async fn remove_object(&self, container: &str, name: &str) -> Result<()> {
        let mains = self.main_backends();
        if mains.is_empty() {
            return Err(StoreError::NoMainBackend(Operation::Remove));
        }

        let (c, n) = (container.to_string(), name.to_string());
        let result = self
            .bounded(
                Operation::Remove,
                fan_out(&mains, Operation::Remove, move |backend| {
                    let (c, n) = (c.clone(), n.clone());
                    async move { backend.remove(&c, &n).await }
                }),
            )
            .await;

        self.settle(container, name, &result);
        result
    }

    /// True on a cache hit or when any backend, replicas first, has the object
    pub async fn exists_object(&self, container: &str, name: &str) -> Result<bool> {
        if self.cache.lookup(&cache_key(container, name)).is_some() {
            return Ok(true);
        }
        if self.backends.is_empty() {
            return Err(StoreError::NoBackends);
        }

        self.bounded(Operation::Exists, async {
            let groups = balancer::partition(&self.backends);
            let total = self.backends.len();
            let mut errors = Vec::new();

            for client in groups.iter().flat_map(|g| g.clients.iter()) {
                match client.exists(container, name).await {
                    Ok(true) => return Ok(true),
                    Ok(false) => {}
                    Err(e) => errors.push(StoreError::backend(client.name(), Operation::Exists, e)),
                }
            }

            if errors.len() < total {
                Ok(false)
            } else {
                StoreError::aggregate(Operation::Exists, total, errors).map(|_| false)
            }
        })
        .await
    }

    // Success and partial failure both changed backend state
    fn settle(&self, container: &str, name: &str, result: &Result<()>) {
        match result {
            Ok(()) => self.cache.invalidate(&cache_key(container, name)),
            Err(e) if e.is_partial() => self.cache.invalidate(&cache_key(container, name)),
            Err(_) => {}
        }
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Replace cache options; entries are dropped and validation restarted
    pub async fn configure_cache(&self, options: CacheOptions) {
        self.cache.configure(options).await;
    }

    pub async fn enable_cache(&self) {
        self.cache.set_enabled(true).await;
    }

    pub async fn disable_cache(&self) {
        self.cache.set_enabled(false).await;
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub async fn set_validation_policy(&self, policy: ValidationPolicy) {
        self.cache.set_validation_policy(policy).await;
    }

    /// Write `data` to `targets` on detached tasks; failures are only logged
    fn replicate_in_background(
        &self,
        targets: Vec<Arc<dyn ObjectStore>>,
        container: &str,
        name: &str,
        data: Bytes,
    ) {
        if targets.is_empty() {
            return;
        }

        let (container, name) = (container.to_string(), name.to_string());
        let handle = tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            for backend in targets {
                let (c, n, data) = (container.clone(), name.clone(), data.clone());
                tasks.spawn(async move {
                    let result = backend.put(&c, &n, data).await;
                    (backend.name().to_string(), result)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((_, Ok(()))) => {}
                    Ok((backend, Err(e))) => {
                        warn!("Background replication of '{}/{}' to '{}' failed: {:#}", container, name, backend, e);
                    }
                    Err(e) => {
                        warn!("Background replication worker for '{}/{}' failed: {}", container, name, e);
                    }
                }
            }
        });

        let mut pending = self.background.lock();
        pending.retain(|task| !task.is_finished());
        pending.push(handle);
    }

    /// Number of async-mode replications still running
    pub fn pending_replications(&self) -> usize {
        self.background
            .lock()
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Wait until every background replication started so far has finished
    pub async fn wait_for_replication(&self) {
        let pending = std::mem::take(&mut *self.background.lock());
        if pending.is_empty() {
            return;
        }

        debug!("Waiting for {} background replication(s)", pending.len());
        for task in pending {
            if let Err(e) = task.await {
                warn!("Background replication task ended abnormally: {}", e);
            }
        }
    }

    /// Drain background replication, then stop cache validation
    pub async fn shutdown(&self) {
        self.wait_for_replication().await;
        self.cache.stop_validation().await;
        info!("Object client shut down");
    }
}

/// Run `op` against every backend concurrently and fold the outcomes
async fn fan_out<F, Fut>(backends: &[Arc<dyn ObjectStore>], operation: Operation, op: F) -> Result<()>
where
    F: Fn(Arc<dyn ObjectStore>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for backend in backends {
        let name = backend.name().to_string();
        let fut = op(Arc::clone(backend));
        tasks.spawn(async move { (name, fut.await) });
    }

    let mut errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((name, Err(e))) => {
                warn!("{} failed on backend '{}': {:#}", operation, name, e);
                errors.push(StoreError::backend(name, operation, e));
            }
            Err(e) => errors.push(StoreError::Worker {
                operation,
                message: e.to_string(),
            }),
        }
    }

    StoreError::aggregate(operation, backends.len(), errors)
}

async fn put_all(mains: &[Arc<dyn ObjectStore>], container: &str, name: &str, data: Bytes) -> Result<()> {
    let (c, n) = (container.to_string(), name.to_string());
    fan_out(mains, Operation::Put, move |backend| {
        let (c, n, data) = (c.clone(), n.clone(), data.clone());
        async move { backend.put(&c, &n, data).await }
    })
    .await
}

/// Try mains in order until one succeeds; returns the index of that main
async fn put_first(
    mains: &[Arc<dyn ObjectStore>],
    container: &str,
    name: &str,
    data: Bytes,
) -> Result<usize> {
    let mut errors = Vec::new();

    for (index, backend) in mains.iter().enumerate() {
        match backend.put(container, name, data.clone()).await {
            Ok(()) => {
                debug!("PutObject '{}/{}' succeeded on '{}'", container, name, backend.name());
                return Ok(index);
            }
            Err(e) => errors.push(StoreError::backend(backend.name(), Operation::Put, e)),
        }
    }

    match StoreError::aggregate(Operation::Put, mains.len(), errors) {
        Err(e) => Err(e),
        Ok(()) => Err(StoreError::NoMainBackend(Operation::Put)),
    }
}
