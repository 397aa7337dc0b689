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

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use super::{all_failed, try_in_order, ClientGroup, LoadBalancer, LoadBalancingStrategy};
use crate::error::{Operation, Result, StoreError};

/// Rotates the starting backend within the first (replica) group.
///
/// Each read starts at `cursor mod len`, advances the cursor, and tries
/// every backend of that group once, wrapping around. The remaining
/// groups are then tried in classic order.
pub struct RoundRobinBalancer {
    groups: Vec<ClientGroup>,
    cursor: Mutex<usize>,
}

impl RoundRobinBalancer {
    pub fn new(groups: Vec<ClientGroup>) -> Self {
        Self {
            groups,
            cursor: Mutex::new(0),
        }
    }

    /// Claim the start index for the next read of a group of `len` backends
    fn next_start(&self, len: usize) -> usize {
        let mut cursor = self.cursor.lock();
        let start = *cursor % len;
        *cursor = (start + 1) % len;
        start
    }
}

#[async_trait]
impl LoadBalancer for RoundRobinBalancer {
    async fn get_object(&self, container: &str, name: &str) -> Result<Bytes> {
        let Some((primary, rest)) = self.groups.split_first() else {
            return Err(StoreError::NoBackends);
        };

        let mut errors = Vec::new();

        if !primary.is_empty() {
            let len = primary.len();
            let start = self.next_start(len);
            debug!("Round-robin read of '{}/{}' starting at backend #{}", container, name, start);

            for offset in 0..len {
                let client = &primary.clients[(start + offset) % len];
                match client.get(container, name).await {
                    Ok(data) => return Ok(data),
                    Err(e) => errors.push(StoreError::backend(client.name(), Operation::Get, e)),
                }
            }
        }

        match try_in_order(rest, container, name, &mut errors).await {
            Some(data) => Ok(data),
            None => Err(all_failed(errors)),
        }
    }

    fn strategy(&self) -> LoadBalancingStrategy {
        LoadBalancingStrategy::RoundRobin
    }
}
