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

// Bounded read-through object cache
//
// Entries are keyed globally by `container/name`, expire after a TTL,
// are bounded by item count (oldest evicted) and by per-object size
// (oversized payloads are never cached). An optional background task
// samples entries periodically and drops expired ones.

mod validation;

pub use validation::ValidationPolicy;

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub enabled: bool,
    /// Largest payload accepted, in megabytes
    pub max_size_mb: u64,
    pub ttl: Duration,
    pub max_items: usize,
    pub validation: ValidationPolicy,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size_mb: 1024,
            ttl: Duration::from_secs(10 * 60),
            max_items: 5,
            validation: ValidationPolicy::None,
        }
    }
}

impl CacheOptions {
    fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Cache key for an object
pub fn cache_key(container: &str, name: &str) -> String {
    format!("{}/{}", container, name)
}

#[derive(Clone)]
struct CacheEntry {
    data: Bytes,
    created_at: Instant,
}

/// Entry map and options, guarded together by one lock
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    options: CacheOptions,
}

struct ValidatorHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct ObjectCache {
    state: Arc<Mutex<CacheState>>,
    // Start/stop bookkeeping only; never held while `state` is needed
    validator: AsyncMutex<Option<ValidatorHandle>>,
}

impl ObjectCache {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                options,
            })),
            validator: AsyncMutex::new(None),
        }
    }

    pub fn options(&self) -> CacheOptions {
        self.state.lock().options.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().options.enabled
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Store a payload, overwriting (and re-timestamping) an existing entry.
    ///
    /// No-op when the cache is disabled, `max_items` is zero or the payload
    /// exceeds `max_size_mb`. Inserting past `max_items` evicts the oldest
    /// entry.
    pub fn store(&self, key: &str, data: Bytes) {
        let mut state = self.state.lock();
        if !state.options.enabled || state.options.max_items == 0 {
            return;
        }

        if data.len() as u64 > state.options.max_size_bytes() {
            debug!(
                "Not caching '{}': {} bytes exceeds the {} MB limit",
                key,
                data.len(),
                state.options.max_size_mb
            );
            return;
        }

        let now = Instant::now();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.data = data;
            entry.created_at = now;
            return;
        }

        state.entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                created_at: now,
            },
        );

        if state.entries.len() > state.options.max_items {
            let oldest = state
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone());

            if let Some(oldest) = oldest {
                debug!("Cache full, evicting oldest entry '{}'", oldest);
                state.entries.remove(&oldest);
            }
        }
    }

    /// Return a fresh entry; an expired entry is removed and reported as a miss
    pub fn lookup(&self, key: &str) -> Option<Bytes> {
        let mut state = self.state.lock();
        if !state.options.enabled {
            return None;
        }

        let ttl = state.options.ttl;
        let entry = state.entries.get(key)?;
        if entry.created_at.elapsed() <= ttl {
            return Some(entry.data.clone());
        }

        debug!("Cache entry '{}' expired", key);
        state.entries.remove(key);
        None
    }

    pub fn invalidate(&self, key: &str) {
        self.state.lock().entries.remove(key);
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Replace all options.
    ///
    /// The validation task is stopped first and restarted with the new
    /// policy when the cache is enabled. Existing entries are dropped.
    pub async fn configure(&self, options: CacheOptions) {
        self.stop_validation().await;
        {
            let mut state = self.state.lock();
            state.options = options;
            state.entries.clear();
        }
        self.start_validation().await;
    }

    pub async fn set_enabled(&self, enabled: bool) {
        self.state.lock().options.enabled = enabled;
        if enabled {
            self.start_validation().await;
        } else {
            self.stop_validation().await;
        }
    }

    /// Swap the validation policy, restarting the task with the new parameters
    pub async fn set_validation_policy(&self, policy: ValidationPolicy) {
        self.stop_validation().await;
        self.state.lock().options.validation = policy;
        self.start_validation().await;
    }

    pub async fn is_validation_running(&self) -> bool {
        self.validator.lock().await.is_some()
    }

    /// Start the background validation task.
    ///
    /// No-op when a task is already running, the cache is disabled, or the
    /// policy is `None`.
    pub async fn start_validation(&self) {
        let mut slot = self.validator.lock().await;
        if slot.is_some() {
            return;
        }

        let (enabled, policy) = {
            let state = self.state.lock();
            (state.options.enabled, state.options.validation)
        };

        let ValidationPolicy::Sampling { percent, interval } = policy else {
            return;
        };
        if !enabled {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(validation::run(
            Arc::clone(&self.state),
            percent,
            interval,
            stop_rx,
        ));

        info!(
            "Started cache sampling validation ({}% every {:?})",
            percent, interval
        );
        *slot = Some(ValidatorHandle {
            stop: stop_tx,
            task,
        });
    }

    /// Stop the validation task and wait until it has exited
    pub async fn stop_validation(&self) {
        let mut slot = self.validator.lock().await;
        let Some(handle) = slot.take() else {
            return;
        };

        let _ = handle.stop.send(true);
        if let Err(e) = handle.task.await {
            warn!("Cache validation task ended abnormally: {}", e);
        }
        info!("Stopped cache sampling validation");
    }
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}

impl Drop for ObjectCache {
    fn drop(&mut self) {
        if let Some(handle) = self.validator.get_mut().take() {
            let _ = handle.stop.send(true);
            handle.task.abort();
        }
    }
}
