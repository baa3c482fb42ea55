//! Per-user token bucket admission control
//!
//! Each user gets an independent bucket of `capacity` tokens refilled at
//! `refill_per_second`. Buckets are created full on first use and live only in
//! memory, so a restart hands every user a fresh burst.
//!
//! The user map is only locked long enough to find or insert a bucket; the
//! refill/consume step runs under that user's own mutex, so checks for
//! different users never contend on the same lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use crate::error::ConfigError;
use crate::model::UserId;

/// Token bucket parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Tokens added per second of wall-clock time
    pub refill_per_second: f64,
    /// Maximum tokens a bucket can hold (the burst size)
    pub capacity: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // One call every 10 seconds with a burst of 3.
        Self {
            refill_per_second: 0.1,
            capacity: 3.0,
        }
    }
}

impl RateLimitConfig {
    pub fn new(refill_per_second: f64, capacity: f64) -> Self {
        Self {
            refill_per_second,
            capacity,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.refill_per_second.is_finite() || self.refill_per_second <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "refill rate must be a positive number, got {}",
                self.refill_per_second
            )));
        }
        if !self.capacity.is_finite() || self.capacity < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "bucket capacity must be at least 1, got {}",
                self.capacity
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter keyed by user
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: RwLock<HashMap<UserId, Arc<Mutex<Bucket>>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            buckets: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Try to admit one call for `user_id` now
    pub fn try_consume(&self, user_id: UserId) -> bool {
        self.try_consume_at(user_id, 1.0, Instant::now())
    }

    /// Try to take `cost` tokens for `user_id` now
    pub fn try_consume_cost(&self, user_id: UserId, cost: f64) -> bool {
        self.try_consume_at(user_id, cost, Instant::now())
    }

    /// Refill the user's bucket up to `now`, then take `cost` tokens if available.
    ///
    /// The refilled level and timestamp are stored whether or not the call is
    /// admitted. A negative or non-finite cost is never admitted.
    pub fn try_consume_at(&self, user_id: UserId, cost: f64, now: Instant) -> bool {
        if !cost.is_finite() || cost < 0.0 {
            tracing::warn!(user_id = user_id, cost = cost, "Rejected invalid rate limit cost");
            return false;
        }

        let bucket = self.bucket(user_id, now);
        let mut state = bucket.lock().unwrap_or_else(PoisonError::into_inner);

        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        let refilled = (state.tokens + elapsed * self.config.refill_per_second)
            .min(self.config.capacity);
        // A caller holding an older instant must not move the refill clock backwards.
        state.last_refill = state.last_refill.max(now);

        if refilled >= cost {
            state.tokens = refilled - cost;
            true
        } else {
            state.tokens = refilled;
            tracing::debug!(
                user_id = user_id,
                tokens = refilled,
                cost = cost,
                "Rate limit bucket exhausted"
            );
            false
        }
    }

    /// Stored token level for a user (without applying pending refill)
    pub fn tokens(&self, user_id: UserId) -> Option<f64> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.get(&user_id).map(|bucket| {
            bucket
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .tokens
        })
    }

    /// Number of users with a live bucket
    pub fn tracked_users(&self) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn bucket(&self, user_id: UserId, now: Instant) -> Arc<Mutex<Bucket>> {
        {
            let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(bucket) = buckets.get(&user_id) {
                return Arc::clone(bucket);
            }
        }

        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets.entry(user_id).or_insert_with(|| {
            Arc::new(Mutex::new(Bucket {
                tokens: self.config.capacity,
                last_refill: now,
            }))
        });
        Arc::clone(bucket)
    }
}
