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

// Background sampling validation of cache entries

use anyhow::{bail, Result};
use parking_lot::Mutex;
use rand::seq::index::sample;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::CacheState;

const DEFAULT_SAMPLING_PERCENT: u8 = 10;
const DEFAULT_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Strategy used by the background validation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Entries are only checked lazily, on lookup
    #[default]
    None,
    /// Every `interval`, check `percent`% of the entries (at least one)
    Sampling { percent: u8, interval: Duration },
}

impl ValidationPolicy {
    /// Sampling policy; percent is capped at 100, 0 falls back to 10 and a
    /// zero interval to 30 minutes.
    pub fn sampling(percent: u8, interval: Duration) -> Self {
        let percent = match percent {
            0 => DEFAULT_SAMPLING_PERCENT,
            p => p.min(100),
        };
        let interval = if interval.is_zero() {
            DEFAULT_INTERVAL
        } else {
            interval
        };
        ValidationPolicy::Sampling { percent, interval }
    }
}

/// Number of keys sampled out of `total`
pub(super) fn sample_size(total: usize, percent: u8) -> usize {
    if total == 0 {
        return 0;
    }
    let wanted = (total * percent as usize).div_ceil(100);
    wanted.clamp(1, total)
}

/// Expired entry as seen in a snapshot
#[derive(Debug, Clone)]
pub(super) struct Candidate {
    key: String,
    created_at: Instant,
}

/// Snapshot keys and timestamps under the lock, sample them without it, and
/// keep the sampled entries whose snapshot age already exceeds the TTL.
pub(super) fn expired_sample(state: &Mutex<CacheState>, percent: u8) -> Result<Vec<Candidate>> {
    let (snapshot, ttl) = {
        let state = state.lock();
        let snapshot: Vec<Candidate> = state
            .entries
            .iter()
            .map(|(key, entry)| Candidate {
                key: key.clone(),
                created_at: entry.created_at,
            })
            .collect();
        (snapshot, state.options.ttl)
    };

    if ttl.is_zero() {
        bail!("cache TTL must be greater than zero for sampling validation");
    }

    let count = sample_size(snapshot.len(), percent);
    if count == 0 {
        return Ok(Vec::new());
    }

    let picked = sample(&mut rand::thread_rng(), snapshot.len(), count);
    Ok(picked
        .iter()
        .map(|index| &snapshot[index])
        .filter(|candidate| candidate.created_at.elapsed() > ttl)
        .cloned()
        .collect())
}

/// Remove candidates whose live entry still carries the snapshotted
/// timestamp; entries refreshed since the snapshot are kept.
pub(super) fn prune(state: &Mutex<CacheState>, candidates: &[Candidate]) -> usize {
    let mut removed = 0;
    for candidate in candidates {
        let mut state = state.lock();
        let unchanged = state
            .entries
            .get(&candidate.key)
            .is_some_and(|entry| entry.created_at == candidate.created_at);
        if unchanged {
            state.entries.remove(&candidate.key);
            removed += 1;
        }
    }
    removed
}

/// One validation pass. Returns the number of entries removed.
pub(super) fn validate_once(state: &Mutex<CacheState>, percent: u8) -> Result<usize> {
    let candidates = expired_sample(state, percent)?;
    Ok(prune(state, &candidates))
}

/// Validation loop; exits once `stop` flips or its sender is dropped
pub(super) async fn run(
    state: Arc<Mutex<CacheState>>,
    percent: u8,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match validate_once(&state, percent) {
                    Ok(removed) if removed > 0 => {
                        debug!("Sampling validation removed {} expired entries", removed);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Cache sampling validation failed: {}", e),
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
}
