//! Expiry Records
//!
//! One [`ExpiryRecord`] exists per live key. It remembers when the entry was
//! written (or last touched), how long it may live, and whether it has been
//! observed as expired.
//!
//! ## The expired flag
//!
//! The flag is monotonic: once set it is never cleared while the record
//! exists. Setting it goes through a single `compare_exchange`, so among any
//! number of concurrent checkers (sweeper and readers) exactly one observes
//! the unexpired → expired transition. That one caller owns the expiration
//! notification. A touch updates the same word, so it can never revive a
//! record that a check has already flagged.
//!
//! ```text
//!   record()                         check(): elapsed > ttl
//!      │                                     │
//!      ▼                                     ▼
//!  ┌────────┐   compare_exchange(w, w | FLAG)   ┌─────────┐
//!  │  Live  │ ─────────────────────────────────>│ Expired │
//!  └────────┘      (exactly one winner)         └─────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of checking a record against the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryState {
    /// The time-to-live has not elapsed.
    Live,
    /// This check flipped the flag; the caller must notify listeners.
    Transitioned,
    /// The flag was already set by an earlier check.
    AlreadyExpired,
}

impl ExpiryState {
    /// Returns true for both expired states.
    #[inline]
    pub fn is_expired(self) -> bool {
        !matches!(self, ExpiryState::Live)
    }
}

/// High bit of the record word: the expired flag.
const FLAG: u64 = 1 << 63;
/// Low bits of the record word: nanoseconds since `origin`.
const OFFSET_MASK: u64 = FLAG - 1;

/// Expiration metadata for a single key.
///
/// The flag and the touch offset share one atomic word, so a touch and a
/// check racing on the same record are ordered by a single
/// `compare_exchange`: either the touch lands first and the check sees the
/// new clock, or the flag lands first and the touch fails.
#[derive(Debug)]
pub struct ExpiryRecord {
    /// When the record was created
    origin: Instant,
    /// Configured time-to-live
    ttl: Duration,
    /// Expired flag (high bit) and offset of the last write or touch
    word: AtomicU64,
}

impl ExpiryRecord {
    /// Creates a record whose clock starts now.
    pub fn new(ttl: Duration) -> Self {
        Self::starting_at(Instant::now(), ttl)
    }

    /// Creates a record whose clock started at `origin`.
    pub fn starting_at(origin: Instant, ttl: Duration) -> Self {
        Self {
            origin,
            ttl,
            word: AtomicU64::new(0),
        }
    }

    /// The configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[inline]
    fn touched_at_word(&self, word: u64) -> Instant {
        self.origin + Duration::from_nanos(word & OFFSET_MASK)
    }

    #[inline]
    fn elapsed_at_word(&self, word: u64, now: Instant) -> bool {
        self.ttl.is_zero()
            || now.saturating_duration_since(self.touched_at_word(word)) > self.ttl
    }

    /// When the entry was created or last touched.
    pub fn touched_at(&self) -> Instant {
        self.touched_at_word(self.word.load(Ordering::Acquire))
    }

    /// Returns true if the flag has been set.
    #[inline]
    pub fn is_flagged(&self) -> bool {
        self.word.load(Ordering::Acquire) & FLAG != 0
    }

    /// Returns true if the time-to-live has elapsed at `now`, without
    /// touching the flag.
    ///
    /// A zero ttl is elapsed at any `now`, regardless of clock resolution.
    #[inline]
    pub fn has_elapsed(&self, now: Instant) -> bool {
        self.elapsed_at_word(self.word.load(Ordering::Acquire), now)
    }

    /// Checks the record against `now`, setting the flag when the ttl has
    /// elapsed. Once flagged, later checks short-circuit on the flag.
    pub fn check(&self, now: Instant) -> ExpiryState {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            if current & FLAG != 0 {
                return ExpiryState::AlreadyExpired;
            }
            if !self.elapsed_at_word(current, now) {
                return ExpiryState::Live;
            }
            match self.word.compare_exchange_weak(
                current,
                current | FLAG,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return ExpiryState::Transitioned,
                // Flagged by someone else, or touched: decide again
                Err(actual) => current = actual,
            }
        }
    }

    /// Restarts the clock at `now`, keeping the ttl.
    ///
    /// Returns false (and does nothing) if the record is already flagged.
    pub fn touch(&self, now: Instant) -> bool {
        let offset = now.saturating_duration_since(self.origin).as_nanos();
        let offset = u64::try_from(offset).unwrap_or(OFFSET_MASK).min(OFFSET_MASK);

        let mut current = self.word.load(Ordering::Acquire);
        loop {
            if current & FLAG != 0 {
                return false;
            }
            if offset <= current {
                return true;
            }
            match self.word.compare_exchange_weak(
                current,
                offset,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Time left before the ttl elapses (zero once it has).
    pub fn remaining(&self, now: Instant) -> Duration {
        let word = self.word.load(Ordering::Acquire);
        if word & FLAG != 0 {
            return Duration::ZERO;
        }
        match self.touched_at_word(word).checked_add(self.ttl) {
            Some(deadline) => deadline.saturating_duration_since(now),
            None => Duration::MAX,
        }
    }
}
