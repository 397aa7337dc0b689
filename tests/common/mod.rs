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

// Shared test doubles for integration tests

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use multistore::{ConnectionProperties, ObjectStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Backend-name log shared between several mocks to observe call order
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// In-memory backend with call counters and switchable failures
pub struct MockBackend {
    name: String,
    properties: ConnectionProperties,
    objects: Mutex<HashMap<String, Bytes>>,
    fail_put: AtomicBool,
    fail_next_puts: AtomicUsize,
    fail_get: AtomicBool,
    fail_remove: AtomicBool,
    fail_exists: AtomicBool,
    put_delay: Option<Duration>,
    puts: AtomicUsize,
    gets: AtomicUsize,
    removes: AtomicUsize,
    get_log: Option<CallLog>,
}

impl MockBackend {
    pub fn new(name: &str, properties: ConnectionProperties) -> Self {
        Self {
            name: name.to_string(),
            properties,
            objects: Mutex::new(HashMap::new()),
            fail_put: AtomicBool::new(false),
            fail_next_puts: AtomicUsize::new(0),
            fail_get: AtomicBool::new(false),
            fail_remove: AtomicBool::new(false),
            fail_exists: AtomicBool::new(false),
            put_delay: None,
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
            get_log: None,
        }
    }

    pub fn main(name: &str) -> Self {
        Self::new(name, ConnectionProperties::main())
    }

    pub fn replica(name: &str) -> Self {
        Self::new(name, ConnectionProperties::replica())
    }

    pub fn failing_puts(self) -> Self {
        self.fail_put.store(true, Ordering::SeqCst);
        self
    }

    /// Fail only the next `count` puts
    pub fn failing_first_puts(self, count: usize) -> Self {
        self.fail_next_puts.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_gets(self) -> Self {
        self.fail_get.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_removes(self) -> Self {
        self.fail_remove.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_exists(self) -> Self {
        self.fail_exists.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    pub fn logging_gets(mut self, log: &CallLog) -> Self {
        self.get_log = Some(Arc::clone(log));
        self
    }

    pub fn with_object(self, container: &str, name: &str, data: &'static [u8]) -> Self {
        self.objects
            .lock()
            .insert(key(container, name), Bytes::from_static(data));
        self
    }

    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn object(&self, container: &str, name: &str) -> Option<Bytes> {
        self.objects.lock().get(&key(container, name)).cloned()
    }

    pub fn has_object(&self, container: &str, name: &str) -> bool {
        self.object(container, name).is_some()
    }

    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

fn key(container: &str, name: &str) -> String {
    format!("{}/{}", container, name)
}

#[async_trait]
impl ObjectStore for MockBackend {
    async fn get(&self, container: &str, name: &str) -> Result<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.get_log {
            log.lock().push(self.name.clone());
        }
        if self.fail_get.load(Ordering::SeqCst) {
            bail!("injected get failure");
        }
        match self.object(container, name) {
            Some(data) => Ok(data),
            None => bail!("object '{}/{}' not found", container, name),
        }
    }

    async fn put(&self, container: &str, name: &str, data: Bytes) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        let transient = self
            .fail_next_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient || self.fail_put.load(Ordering::SeqCst) {
            bail!("injected put failure");
        }
        self.objects.lock().insert(key(container, name), data);
        Ok(())
    }

    async fn remove(&self, container: &str, name: &str) -> Result<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove.load(Ordering::SeqCst) {
            bail!("injected remove failure");
        }
        self.objects.lock().remove(&key(container, name));
        Ok(())
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool> {
        if self.fail_exists.load(Ordering::SeqCst) {
            bail!("injected exists failure");
        }
        Ok(self.has_object(container, name))
    }

    fn properties(&self) -> &ConnectionProperties {
        &self.properties
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn backend_type(&self) -> &str {
        "mock"
    }
}

/// Erase concrete mocks into the trait objects the client consumes
pub fn as_stores(mocks: &[Arc<MockBackend>]) -> Vec<Arc<dyn ObjectStore>> {
    mocks
        .iter()
        .map(|m| Arc::clone(m) as Arc<dyn ObjectStore>)
        .collect()
}
