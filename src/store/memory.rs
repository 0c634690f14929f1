//! In-process window store.
//!
//! Runs the same evaluator as the Redis script natively, holding one lock for
//! the whole evaluation. Useful for single-process deployments and tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::script::window_script;
use super::{StoreError, WindowArgs, WindowStore};
use crate::clock::{Clock, SystemClock};

/// A scored set of event timestamps plus an optional expiry deadline.
#[derive(Debug, Default)]
struct WindowSet {
    scores: BTreeSet<i64>,
    expires_at: Option<i64>,
}

impl WindowSet {
    /// Equivalent of `ZCOUNT key min max`.
    fn count(&self, min: i64, max: i64) -> u64 {
        if min > max {
            return 0;
        }
        self.scores.range(min..=max).count() as u64
    }

    /// Equivalent of `ZREMRANGEBYSCORE key -inf max`.
    fn remove_up_to(&mut self, max: i64) {
        self.scores = self.scores.split_off(&max.saturating_add(1));
    }
}

/// An in-memory [`WindowStore`].
pub struct MemoryStore {
    sets: Mutex<HashMap<String, WindowSet>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a store on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store driven by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sets: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live events stored under `key`, without pruning.
    pub fn len(&self, key: &str) -> usize {
        let now = self.clock.now_micros();
        let mut sets = self.sets.lock();
        evict_if_expired(&mut sets, key, now);
        sets.get(key).map(|set| set.scores.len()).unwrap_or(0)
    }

    /// Whether `key` currently exists.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now_micros();
        let mut sets = self.sets.lock();
        evict_if_expired(&mut sets, key, now);
        sets.contains_key(key)
    }

    /// Remaining time to live of `key` in seconds, if it has one.
    pub fn ttl_secs(&self, key: &str) -> Option<u64> {
        let now = self.clock.now_micros();
        let mut sets = self.sets.lock();
        evict_if_expired(&mut sets, key, now);
        sets.get(key)
            .and_then(|set| set.expires_at)
            .map(|deadline| ((deadline - now).max(0) / 1_000_000) as u64)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn evict_if_expired(sets: &mut HashMap<String, WindowSet>, key: &str, now: i64) {
    let expired = sets
        .get(key)
        .and_then(|set| set.expires_at)
        .map_or(false, |deadline| deadline <= now);
    if expired {
        sets.remove(key);
    }
}

#[async_trait]
impl WindowStore for MemoryStore {
    async fn register_script(&self) -> Result<String, StoreError> {
        Ok(window_script().get_hash().to_string())
    }

    async fn eval_window(&self, key: &str, args: &WindowArgs) -> Result<i64, StoreError> {
        let ts = self.clock.now_micros();
        let mut sets = self.sets.lock();
        evict_if_expired(&mut sets, key, ts);

        let start_window = ts - args.period_secs as i64 * 1_000_000;
        if let Some(set) = sets.get_mut(key) {
            set.remove_up_to(start_window);
            if set.scores.is_empty() {
                sets.remove(key);
            }
        }

        let usage = sets.get(key).map_or(0, |set| set.count(1, ts));
        if usage >= args.limit {
            return Ok(-(usage as i64));
        }

        if !args.reserve {
            return Ok(usage as i64);
        }

        let set = sets.entry(key.to_string()).or_default();
        if set.count(ts - args.spacing_micros, ts) != 0 {
            return Err(StoreError::TooFast);
        }
        set.scores.insert(ts);
        set.expires_at = Some(ts + args.expire_secs as i64 * 1_000_000);

        let usage = set.count(0, ts);
        if usage > args.limit {
            return Ok(-(usage as i64));
        }
        Ok(usage as i64)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        let now = self.clock.now_micros();
        let mut sets = self.sets.lock();
        evict_if_expired(&mut sets, key, now);
        match sets.get_mut(key) {
            Some(set) => {
                set.expires_at = Some(now + seconds as i64 * 1_000_000);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.sets.lock().remove(key).is_some())
    }
}
