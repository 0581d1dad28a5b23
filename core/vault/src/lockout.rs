//! Failed unlock attempt tracking.
//!
//! The counter lives for the lifetime of the process. Once it reaches the
//! configured maximum, open attempts are refused before any key derivation
//! runs until a cooldown has passed since the last failure. The cooldown
//! doubles with each failure past the maximum. A successful open resets it.

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use pwvault_common::{Error, Result};

/// Default maximum failed attempts before lockout.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base cooldown in seconds.
pub const DEFAULT_LOCKOUT_SECONDS: i64 = 60;

/// Largest accepted base cooldown in seconds.
pub const MAX_LOCKOUT_SECONDS: i64 = 24 * 60 * 60;

/// Cap on the backoff exponent.
const MAX_BACKOFF_EXPONENT: u32 = 10;

#[derive(Debug)]
pub struct LockoutPolicy {
    max_attempts: u32,
    lockout_seconds: i64,
    failed_attempts: AtomicU32,
    last_failure: Mutex<Option<DateTime<Utc>>>,
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, lockout_seconds: i64) -> Self {
        Self {
            max_attempts,
            lockout_seconds: lockout_seconds.clamp(0, MAX_LOCKOUT_SECONDS),
            failed_attempts: AtomicU32::new(0),
            last_failure: Mutex::new(None),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts.load(Ordering::SeqCst)
    }

    fn last_failure(&self) -> Option<DateTime<Utc>> {
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cooldown for `attempts` failures: `base * 2^(attempts - max)`.
    pub fn lockout_duration(&self, attempts: u32) -> Option<Duration> {
        if attempts < self.max_attempts {
            return None;
        }
        let exponent = (attempts - self.max_attempts).min(MAX_BACKOFF_EXPONENT);
        Duration::try_seconds(self.lockout_seconds * 2_i64.pow(exponent))
    }

    /// Time left before another attempt is allowed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let duration = self.lockout_duration(self.failed_attempts())?;
        let until = self.last_failure()?.checked_add_signed(duration)?;
        let remaining = until - now;
        (remaining > Duration::zero()).then_some(remaining)
    }

    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now).is_some()
    }

    /// Refuse the attempt while a cooldown is running.
    pub fn check(&self, now: DateTime<Utc>) -> Result<()> {
        match self.remaining(now) {
            Some(remaining) => {
                // Round up so a refusal never reports zero seconds.
                let retry_after_secs = (remaining + Duration::milliseconds(999)).num_seconds();
                Err(Error::TooManyFailedAttempts {
                    attempts: self.failed_attempts(),
                    retry_after_secs,
                })
            }
            None => Ok(()),
        }
    }

    /// Count a wrong password at `now`. Returns the new total.
    pub fn record_failure(&self, now: DateTime<Utc>) -> u32 {
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);
        self.failed_attempts.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    pub fn reset(&self) {
        self.failed_attempts.store(0, Ordering::SeqCst);
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_SECONDS)
    }
}
