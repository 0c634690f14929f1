//! Remote store abstraction for the sliding-window evaluator.
//!
//! The limiter only needs four things from a store: register the evaluator,
//! run it atomically against one key, refresh a key's expiry and delete a key.

mod memory;
mod redis_store;
mod script;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;
pub use self::script::{window_script, TOO_FAST_CODE, WINDOW_SCRIPT};

/// Errors reported by a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport or command failure reported by Redis
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A reservation landed within the spacing window of an existing event
    #[error("too fast requests")]
    TooFast,

    /// The store answered with something the evaluator never returns
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Ordered parameters of one evaluator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowArgs {
    /// Window size in seconds
    pub period_secs: u64,
    /// Maximum events in the window
    pub limit: u64,
    /// TTL to apply to the set after an insertion
    pub expire_secs: u64,
    /// Minimum distance in microseconds to the newest event for an insertion
    pub spacing_micros: i64,
    /// Insert an event if allowed, instead of only counting
    pub reserve: bool,
}

/// Decoded evaluator reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowReply {
    /// Usage after the call; the limit was not hit.
    Within(u64),
    /// Usage at or above the limit, either before the call or because of its insertion.
    LimitReached(u64),
}

impl WindowReply {
    /// Decode the signed integer the evaluator returns.
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            WindowReply::LimitReached(raw.unsigned_abs())
        } else {
            WindowReply::Within(raw as u64)
        }
    }

    /// The usage carried by the reply.
    pub fn usage(&self) -> u64 {
        match self {
            WindowReply::Within(usage) | WindowReply::LimitReached(usage) => *usage,
        }
    }
}

/// A store that can run the sliding-window evaluator atomically.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Register the evaluator and return its content hash.
    async fn register_script(&self) -> Result<String, StoreError>;

    /// Run the evaluator against `key` as one indivisible operation.
    ///
    /// Returns the raw signed reply, see [`WindowReply::from_raw`].
    async fn eval_window(&self, key: &str, args: &WindowArgs) -> Result<i64, StoreError>;

    /// Set the TTL of `key`. Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError>;

    /// Delete `key`. Returns `false` if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}
