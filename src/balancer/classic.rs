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

use super::{all_failed, try_in_order, ClientGroup, LoadBalancer, LoadBalancingStrategy};
use crate::error::Result;

/// Groups in order, backends within a group in order, first success wins
pub struct ClassicBalancer {
    groups: Vec<ClientGroup>,
}

impl ClassicBalancer {
    pub fn new(groups: Vec<ClientGroup>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl LoadBalancer for ClassicBalancer {
    async fn get_object(&self, container: &str, name: &str) -> Result<Bytes> {
        let mut errors = Vec::new();
        match try_in_order(&self.groups, container, name, &mut errors).await {
            Some(data) => Ok(data),
            None => Err(all_failed(errors)),
        }
    }

    fn strategy(&self) -> LoadBalancingStrategy {
        LoadBalancingStrategy::Classic
    }
}
