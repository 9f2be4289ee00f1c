//! Cache Configuration
//!
//! Construction-time settings for an [`ExpiringCache`](crate::ExpiringCache):
//! the default time-to-live applied to writes that don't name one, the sweep
//! cadence, the optional second-tier reaper and the shard count.

use crate::error::{CacheError, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default duration (in `default_unit`) applied to plain `put` calls.
pub const DEFAULT_DURATION: u64 = 30;

/// Default interval between two sweeps of the entry registry.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Number of shards for the store, the registry and the key locks.
/// More shards = less lock contention, but more memory overhead.
pub const DEFAULT_SHARDS: usize = 64;

/// Granularity for expressing a duration as an integer amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Converts `amount` of this unit into a [`Duration`].
    ///
    /// Zero and negative amounts map to [`Duration::ZERO`], which the entry
    /// registry treats as "expired on the very next check". Amounts too large
    /// to represent saturate to [`Duration::MAX`].
    pub fn to_duration(self, amount: i64) -> Duration {
        if amount <= 0 {
            return Duration::ZERO;
        }
        let amount = amount as u64;
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => secs_saturating(amount, 60),
            TimeUnit::Hours => secs_saturating(amount, 60 * 60),
            TimeUnit::Days => secs_saturating(amount, 24 * 60 * 60),
        }
    }

    /// Short suffix used when displaying durations (`ms`, `s`, ...).
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

fn secs_saturating(amount: u64, factor: u64) -> Duration {
    amount
        .checked_mul(factor)
        .map(Duration::from_secs)
        .unwrap_or(Duration::MAX)
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for TimeUnit {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ns" | "nanos" | "nanoseconds" => Ok(TimeUnit::Nanoseconds),
            "us" | "micros" | "microseconds" => Ok(TimeUnit::Microseconds),
            "ms" | "millis" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "s" | "secs" | "seconds" => Ok(TimeUnit::Seconds),
            "m" | "mins" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hours" => Ok(TimeUnit::Hours),
            "d" | "days" => Ok(TimeUnit::Days),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown time unit '{}'",
                other
            ))),
        }
    }
}

/// Configuration for an expiring cache.
///
/// Override single fields with struct-update syntax:
///
/// ```
/// use ttlmap::{CacheConfig, TimeUnit};
/// use std::time::Duration;
///
/// let config = CacheConfig {
///     default_duration: 5,
///     default_unit: TimeUnit::Seconds,
///     sweep_interval: Duration::from_millis(250),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default time-to-live amount for writes without an explicit one (must be > 0)
    pub default_duration: u64,

    /// Unit of `default_duration`
    pub default_unit: TimeUnit,

    /// Interval between sweeps (default: 1s)
    pub sweep_interval: Duration,

    /// When set, the sweeper also removes entries that have been expired for
    /// longer than this grace period. `None` keeps expired entries until read.
    pub reap_after: Option<Duration>,

    /// Number of shards (default: 64)
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_duration: DEFAULT_DURATION,
            default_unit: TimeUnit::Minutes,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            reap_after: None,
            shards: DEFAULT_SHARDS,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with the given default time-to-live.
    pub fn with_default_ttl(default_duration: u64, default_unit: TimeUnit) -> Self {
        Self {
            default_duration,
            default_unit,
            ..Default::default()
        }
    }

    /// The default time-to-live as a [`Duration`].
    pub fn default_ttl(&self) -> Duration {
        let amount = i64::try_from(self.default_duration).unwrap_or(i64::MAX);
        self.default_unit.to_duration(amount)
    }

    /// Checks that every field holds a usable value.
    pub fn validate(&self) -> Result<()> {
        if self.default_duration == 0 {
            return Err(CacheError::InvalidConfig(
                "default duration must be positive".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be non-zero".to_string(),
            ));
        }
        if self.shards == 0 {
            return Err(CacheError::InvalidConfig(
                "shard count must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
