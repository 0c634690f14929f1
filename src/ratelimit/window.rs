//! Window parameters and their validation.

use crate::error::{LimiterError, Result};

/// Longest allowed period: one year in seconds.
pub const MAX_PERIOD_SECS: u64 = 31_536_000;
/// Highest allowed limit.
pub const MAX_LIMIT: u64 = 1_000_000;
/// Smallest burst quantum, in microseconds, that can still be enforced.
pub const MIN_BURST_QUANTUM: i64 = 100;
/// Spacing used when the quantum is too small to derive a fast-path floor.
pub const FAST_SPACING_FLOOR: i64 = 10;

/// Share of the even per-event spacing enforced in strict burst mode.
const BURST_SPREAD: u64 = 850_000;

/// The current window parameters of a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Window size in seconds
    pub period_secs: u64,
    /// Maximum events in the window
    pub limit: u64,
    /// TTL of the remote set
    pub expire_secs: u64,
    /// Minimum spacing between two events in strict mode, microseconds
    pub burst_quantum: i64,
}

impl WindowConfig {
    /// Validate `limit` and `period_secs` and derive the remaining parameters.
    pub fn new(key: &str, limit: u64, period_secs: u64) -> Result<Self> {
        validate_period(key, period_secs)?;
        if limit < 1 || limit > MAX_LIMIT {
            return Err(LimiterError::InvalidLimit {
                key: key.to_string(),
                limit,
            });
        }

        Ok(Self {
            period_secs,
            limit,
            expire_secs: period_secs * 2,
            burst_quantum: burst_quantum(period_secs, limit)?,
        })
    }

    /// Period in microseconds.
    pub fn period_micros(&self) -> i64 {
        self.period_secs as i64 * 1_000_000
    }

    /// Spacing enforced outside strict mode: a thousandth of the quantum, never below the floor.
    pub fn fast_spacing(&self) -> i64 {
        let fast = self.burst_quantum / 1000;
        if fast <= 0 {
            FAST_SPACING_FLOOR
        } else {
            fast
        }
    }
}

/// Check that a period lies within `[1, MAX_PERIOD_SECS]`.
pub fn validate_period(key: &str, period_secs: u64) -> Result<()> {
    if period_secs < 1 || period_secs > MAX_PERIOD_SECS {
        return Err(LimiterError::InvalidPeriod {
            key: key.to_string(),
            period: period_secs,
        });
    }
    Ok(())
}

/// Derive the minimum microsecond spacing between events for a period and limit.
pub fn burst_quantum(period_secs: u64, limit: u64) -> Result<i64> {
    let quantum = (period_secs * BURST_SPREAD / limit) as i64;
    if quantum <= MIN_BURST_QUANTUM {
        return Err(LimiterError::BurstTooSmall {
            period: period_secs,
            limit,
            quantum,
        });
    }
    Ok(quantum)
}
