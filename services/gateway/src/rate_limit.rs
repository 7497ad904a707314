use crate::error::AppError;
use dashmap::DashMap;
use std::time::Instant;

/// Burst size and steady refill rate of one bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    pub capacity: u32,
    pub per_second: f64,
}

pub const ORDER_PLACEMENT: Quota = Quota {
    capacity: 20,
    per_second: 20.0,
};
pub const ORDER_CANCEL: Quota = Quota {
    capacity: 50,
    per_second: 50.0,
};
pub const QUERY: Quota = Quota {
    capacity: 60,
    per_second: 10.0,
};

#[derive(Clone)]
struct Bucket {
    quota: Quota,
    tokens: f64,
    last_update: Instant,
}

impl Bucket {
    fn new(quota: Quota, now: Instant) -> Self {
        Self {
            quota,
            tokens: quota.capacity as f64,
            last_update: now,
        }
    }

    fn allow_request(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = f64::min(
            self.quota.capacity as f64,
            self.tokens + elapsed * self.quota.per_second,
        );
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets keyed by `"{user}:{action}"`
#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_rate_limit(&self, key: &str, quota: Quota) -> Result<(), AppError> {
        self.check_at(key, quota, Instant::now())
    }

    fn check_at(&self, key: &str, quota: Quota, now: Instant) -> Result<(), AppError> {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(quota, now));

        if bucket.allow_request(now) {
            Ok(())
        } else {
            Err(AppError::RateLimitExceeded(format!("Rate limit for {}", key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TINY: Quota = Quota {
        capacity: 2,
        per_second: 1.0,
    };

    #[test]
    fn test_burst_then_refill() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        assert!(limiter.check_at("1:order", TINY, start).is_ok());
        assert!(limiter.check_at("1:order", TINY, start).is_ok());
        assert!(matches!(
            limiter.check_at("1:order", TINY, start),
            Err(AppError::RateLimitExceeded(_))
        ));

        assert!(limiter.check_at("1:order", TINY, start + Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..2 {
            limiter.check_at("1:order", TINY, now).unwrap();
        }
        assert!(limiter.check_at("2:order", TINY, now).is_ok());
    }
}
