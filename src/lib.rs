//! Hivewindow - Distributed Sliding-Window Rate Limiting
//!
//! This crate implements a sliding-window rate limiter whose state lives in a
//! remote sorted set. Every check runs as one atomic script on the store, so any
//! number of processes can share a limit. A local timestamp guard spaces out
//! events and saves round trips for requests that arrive too fast.

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LimiterConfig, LimitsConfig, StoreConfig};
pub use error::{LimiterError, Result};
pub use ratelimit::{Decision, Limiter, LimiterRegistry};
pub use store::{MemoryStore, RedisStore, StoreError, WindowStore};
