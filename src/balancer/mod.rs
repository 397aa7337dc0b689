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

// Read-side backend selection
//
// Backends are split into priority groups: read-only replicas first, main
// instances second. A load balancer walks the groups to serve a read and
// falls back group by group until one backend answers.

mod classic;
mod round_robin;

pub use classic::ClassicBalancer;
pub use round_robin::RoundRobinBalancer;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Operation, Result, StoreError};
use crate::storage::ObjectStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingStrategy {
    /// Always try backends in configuration order
    #[default]
    Classic,
    /// Rotate the starting backend of the first group on every read
    RoundRobin,
}

/// Ordered tier of backends sharing the same read priority
#[derive(Clone, Default)]
pub struct ClientGroup {
    pub clients: Vec<Arc<dyn ObjectStore>>,
}

impl ClientGroup {
    pub fn new(clients: Vec<Arc<dyn ObjectStore>>) -> Self {
        Self { clients }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Split backends into `[replicas, mains]`, keeping configuration order
pub fn partition(backends: &[Arc<dyn ObjectStore>]) -> Vec<ClientGroup> {
    let (mains, replicas): (Vec<_>, Vec<_>) = backends
        .iter()
        .cloned()
        .partition(|b| b.properties().is_main_instance);

    vec![ClientGroup::new(replicas), ClientGroup::new(mains)]
}

#[async_trait]
pub trait LoadBalancer: Send + Sync {
    /// Read an object from the first backend that serves it
    async fn get_object(&self, container: &str, name: &str) -> Result<Bytes>;

    fn strategy(&self) -> LoadBalancingStrategy;
}

pub struct BalancerFactory;

impl BalancerFactory {
    pub fn create(strategy: LoadBalancingStrategy, groups: Vec<ClientGroup>) -> Arc<dyn LoadBalancer> {
        match strategy {
            LoadBalancingStrategy::Classic => Arc::new(ClassicBalancer::new(groups)),
            LoadBalancingStrategy::RoundRobin => Arc::new(RoundRobinBalancer::new(groups)),
        }
    }
}

/// Try each client of each group in order; shared fallback path
pub(crate) async fn try_in_order<'a, I>(
    groups: I,
    container: &str,
    name: &str,
    errors: &mut Vec<StoreError>,
) -> Option<Bytes>
where
    I: IntoIterator<Item = &'a ClientGroup>,
{
    for group in groups {
        for client in &group.clients {
            match client.get(container, name).await {
                Ok(data) => return Some(data),
                Err(e) => errors.push(StoreError::backend(client.name(), Operation::Get, e)),
            }
        }
    }
    None
}

pub(crate) fn all_failed(errors: Vec<StoreError>) -> StoreError {
    if errors.is_empty() {
        return StoreError::NoBackends;
    }
    StoreError::AllClientsFailed(crate::error::BackendErrors(errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ConnectionProperties, MemoryBackend};

    fn backend(name: &str, props: ConnectionProperties) -> Arc<dyn ObjectStore> {
        Arc::new(MemoryBackend::new(name, props).unwrap())
    }

    #[test]
    fn test_partition_puts_replicas_first() {
        let backends = vec![
            backend("main-a", ConnectionProperties::main()),
            backend("replica-a", ConnectionProperties::replica()),
            backend("main-b", ConnectionProperties::main()),
            backend("replica-b", ConnectionProperties::replica()),
        ];

        let groups = partition(&backends);
        assert_eq!(groups.len(), 2);

        let names = |g: &ClientGroup| g.clients.iter().map(|c| c.name().to_string()).collect::<Vec<_>>();
        assert_eq!(names(&groups[0]), vec!["replica-a", "replica-b"]);
        assert_eq!(names(&groups[1]), vec!["main-a", "main-b"]);
    }

    #[test]
    fn test_factory_strategy() {
        let groups = partition(&[backend("a", ConnectionProperties::main())]);
        assert_eq!(
            BalancerFactory::create(LoadBalancingStrategy::Classic, groups.clone()).strategy(),
            LoadBalancingStrategy::Classic
        );
        assert_eq!(
            BalancerFactory::create(LoadBalancingStrategy::RoundRobin, groups).strategy(),
            LoadBalancingStrategy::RoundRobin
        );
    }
}
