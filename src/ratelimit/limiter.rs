//! Distributed sliding-window limiter.
//!
//! The authoritative state is a sorted set in the store, updated by one atomic
//! evaluator call per check. The limiter keeps two advisory fields locally: the
//! last accepted timestamp, used to reject requests that come in too fast
//! without a round trip, and the last observed usage. Concurrent callers on the
//! same instance may see these slightly stale; that only costs an extra round
//! trip or a late local rejection, never an accept over the limit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::window::{burst_quantum, validate_period, WindowConfig};
use crate::clock::{Clock, SystemClock};
use crate::config::LimiterConfig;
use crate::error::{LimiterError, Result};
use crate::store::{WindowArgs, WindowReply, WindowStore};

/// Outcome of a single acquire or check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A slot was reserved.
    Accepted { usage: u64 },
    /// Check-only call; never denies, only reports usage.
    Checked { usage: u64, at_limit: bool },
    /// The reservation was denied because the window is full.
    LimitReached { usage: u64 },
    /// The reservation was denied locally for arriving too soon after the last one.
    TooFast,
}

impl Decision {
    /// Whether the caller may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Accepted { .. } | Decision::Checked { .. })
    }
}

/// Advisory local state.
#[derive(Debug)]
struct LocalState {
    /// Local time of the last successful reservation, microseconds
    last_accepted: i64,
    /// Last usage reported by the store
    usage: u64,
}

/// A rate limiter for one resource, shared through a remote store.
///
/// All methods take `&self`; wrap the limiter in an `Arc` to share it between tasks.
pub struct Limiter {
    key: String,
    remote_key: String,
    window: RwLock<WindowConfig>,
    state: Mutex<LocalState>,
    stop_burst: AtomicBool,
    debug: bool,
    script_hash: String,
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
}

impl Limiter {
    /// Create a limiter on the wall clock and register the evaluator with the store.
    pub async fn new(config: LimiterConfig, store: Arc<dyn WindowStore>) -> Result<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock)).await
    }

    /// Create a limiter driven by `clock`.
    pub async fn with_clock(
        config: LimiterConfig,
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.key.is_empty() {
            return Err(LimiterError::EmptyKey);
        }
        let window = WindowConfig::new(&config.key, config.limit, config.period_secs)?;
        let remote_key = config.resolved_remote_key();

        let script_hash = store
            .register_script()
            .await
            .map_err(LimiterError::ScriptLoad)?;

        info!(
            key = %config.key,
            remote_key = %remote_key,
            limit = window.limit,
            period_secs = window.period_secs,
            burst_quantum = window.burst_quantum,
            "Limiter created"
        );

        Ok(Self {
            key: config.key,
            remote_key,
            window: RwLock::new(window),
            state: Mutex::new(LocalState {
                last_accepted: clock.now_micros(),
                usage: 0,
            }),
            stop_burst: AtomicBool::new(config.stop_burst),
            debug: config.debug,
            script_hash,
            store,
            clock,
        })
    }

    /// Reserve one slot if the window allows it.
    ///
    /// Returns `false` when the limit is reached, the request comes too fast, or
    /// the store fails.
    pub async fn try_acquire(&self) -> bool {
        self.do_acquire(true)
            .await
            .map_or(false, |decision| decision.is_allowed())
    }

    /// Refresh `usage` without reserving a slot.
    ///
    /// Returns `true` even when the limit is reached; only store failures yield `false`.
    pub async fn check_limit(&self) -> bool {
        self.do_acquire(false)
            .await
            .map_or(false, |decision| decision.is_allowed())
    }

    /// Like [`Limiter::try_acquire`], but reports why a request was denied.
    pub async fn try_acquire_detailed(&self) -> Result<Decision> {
        self.do_acquire(true).await
    }

    /// Like [`Limiter::check_limit`], but surfaces store errors.
    pub async fn check_limit_detailed(&self) -> Result<Decision> {
        self.do_acquire(false).await
    }

    async fn do_acquire(&self, reserve: bool) -> Result<Decision> {
        let now = self.clock.now_micros();
        let window = *self.window.read();
        let start_window = now - window.period_micros();
        let strict = self.stop_burst.load(Ordering::Relaxed);
        let fast_spacing = window.fast_spacing();

        let mut last = self.state.lock().last_accepted;
        if last < start_window - 1 {
            last = start_window + 1;
        }
        let elapsed = now - last;

        if reserve && (elapsed < fast_spacing || (strict && elapsed < window.burst_quantum)) {
            if self.debug {
                debug!(key = %self.key, at = now, elapsed, "Too fast (local)");
            }
            return Ok(Decision::TooFast);
        }

        let args = WindowArgs {
            period_secs: window.period_secs,
            limit: window.limit,
            expire_secs: window.expire_secs,
            spacing_micros: if strict { window.burst_quantum } else { fast_spacing },
            reserve,
        };

        let raw = match self.store.eval_window(&self.remote_key, &args).await {
            Ok(raw) => raw,
            Err(e) => {
                if self.debug {
                    debug!(key = %self.key, error = %e, "Window script failed");
                }
                return Err(e.into());
            }
        };

        let decision = {
            let mut state = self.state.lock();
            match WindowReply::from_raw(raw) {
                WindowReply::LimitReached(usage) => {
                    state.usage = usage;
                    if reserve {
                        Decision::LimitReached { usage }
                    } else {
                        Decision::Checked {
                            usage,
                            at_limit: true,
                        }
                    }
                }
                WindowReply::Within(usage) => {
                    state.usage = usage;
                    if reserve {
                        state.last_accepted = now;
                        Decision::Accepted { usage }
                    } else {
                        Decision::Checked {
                            usage,
                            at_limit: usage >= window.limit,
                        }
                    }
                }
            }
        };

        if self.debug {
            if matches!(
                decision,
                Decision::LimitReached { .. } | Decision::Checked { at_limit: true, .. }
            ) {
                debug!(key = %self.key, limit = window.limit, "Limit reached");
            }
            debug!(key = %self.key, usage = self.usage(), "Current usage");
        }

        Ok(decision)
    }

    /// Switch on strict burst mode: every reservation must be a full quantum after the last.
    pub fn enable_strict_burst(&self) {
        self.stop_burst.store(true, Ordering::Relaxed);
    }

    /// Switch off strict burst mode: only pathologically fast requests are spaced out.
    pub fn disable_strict_burst(&self) {
        self.stop_burst.store(false, Ordering::Relaxed);
    }

    /// Change the window period, keeping recorded events.
    ///
    /// The burst quantum is revalidated against the current period and limit
    /// before anything changes. The remote set's TTL is then refreshed to twice
    /// the new period.
    pub async fn update_period(&self, new_period_secs: u64) -> Result<()> {
        validate_period(&self.key, new_period_secs)?;

        let expire_secs = {
            let mut window = self.window.write();
            let quantum = burst_quantum(window.period_secs, window.limit)?;
            window.burst_quantum = quantum;
            window.period_secs = new_period_secs;
            window.expire_secs = new_period_secs * 2;
            window.expire_secs
        };

        self.store.expire(&self.remote_key, expire_secs).await?;

        info!(key = %self.key, period_secs = new_period_secs, "Limiter period updated");
        Ok(())
    }

    /// Drop all recorded events and start a fresh window.
    pub async fn reset(&self) -> Result<()> {
        self.store.delete(&self.remote_key).await?;

        let period_micros = self.window.read().period_micros();
        let mut state = self.state.lock();
        state.last_accepted = self.clock.now_micros() - period_micros;
        state.usage = 0;

        debug!(key = %self.key, "Limiter reset");
        Ok(())
    }

    /// Last usage observed in the store.
    pub fn usage(&self) -> u64 {
        self.state.lock().usage
    }

    /// Logical key of the limited resource.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Name of the sorted set in the store.
    pub fn remote_key(&self) -> &str {
        &self.remote_key
    }

    /// Maximum events per period.
    pub fn limit(&self) -> u64 {
        self.window.read().limit
    }

    /// Current period in seconds.
    pub fn period_secs(&self) -> u64 {
        self.window.read().period_secs
    }

    /// Minimum spacing between events in strict mode, microseconds.
    pub fn burst_quantum(&self) -> i64 {
        self.window.read().burst_quantum
    }

    /// Whether strict burst mode is on.
    pub fn is_strict_burst(&self) -> bool {
        self.stop_burst.load(Ordering::Relaxed)
    }

    /// Content hash of the registered evaluator.
    pub fn script_hash(&self) -> &str {
        &self.script_hash
    }
}

impl std::fmt::Debug for Limiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Limiter")
            .field("key", &self.key)
            .field("remote_key", &self.remote_key)
            .field("window", &*self.window.read())
            .field("usage", &self.usage())
            .field("strict_burst", &self.is_strict_burst())
            .finish()
    }
}
