//! Error Types
//!
//! The cache is an in-memory structure with no I/O on its hot path, so the
//! error surface is small: use after shutdown, construction outside a tokio
//! runtime, and invalid configuration.
//!
//! Listener failures are deliberately absent here. They are isolated by the
//! listener registry, logged, and counted in the cache statistics instead of
//! being surfaced to whichever caller happened to trigger the notification.

use thiserror::Error;

/// Errors returned by [`ExpiringCache`](crate::ExpiringCache) operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache has been shut down; no further operations are accepted.
    #[error("cache is closed")]
    Closed,

    /// The expiry sweeper needs a tokio runtime and none was found.
    #[error("no tokio runtime available to drive the expiry sweeper")]
    NoRuntime,

    /// A configuration value was rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;
