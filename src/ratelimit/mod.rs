//! Rate limiting logic and state management.

mod limiter;
mod registry;
mod window;

pub use limiter::{Decision, Limiter};
pub use registry::LimiterRegistry;
pub use window::{
    burst_quantum, WindowConfig, FAST_SPACING_FLOOR, MAX_LIMIT, MAX_PERIOD_SECS,
    MIN_BURST_QUANTUM,
};
