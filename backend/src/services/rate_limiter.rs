use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Bucket key used when a request carries no session token, and for new
/// sessions once the table is full.
pub const ANONYMOUS_SESSION: &str = "anonymous";

pub const MAX_TRACKED_SESSIONS: usize = 10_000;

const IDLE_MINUTES: i64 = 5;

struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    last_refill: DateTime<Utc>,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    fn new(max_per_minute: u32, now: DateTime<Utc>) -> Self {
        Self {
            tokens: max_per_minute as f64,
            max_tokens: max_per_minute as f64,
            last_refill: now,
            refill_rate: max_per_minute as f64 / 60.0,
        }
    }

    fn try_consume(&mut self, now: DateTime<Utc>) -> Result<(), u64> {
        let elapsed = (now - self.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else if self.refill_rate <= 0.0 {
            Err(60)
        } else {
            let wait_secs = ((1.0 - self.tokens) / self.refill_rate).ceil() as u64;
            Err(wait_secs.max(1))
        }
    }
}

/// Per-session token buckets for the prediction endpoints.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    limit_per_minute: u32,
    max_sessions: usize,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self::with_max_sessions(limit_per_minute, MAX_TRACKED_SESSIONS)
    }

    pub fn with_max_sessions(limit_per_minute: u32, max_sessions: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            limit_per_minute,
            max_sessions,
        }
    }

    /// `Err` carries the number of seconds to wait before retrying.
    pub fn check(&self, session_token: Option<&str>) -> Result<(), u64> {
        self.check_at(session_token, Utc::now())
    }

    fn check_at(&self, session_token: Option<&str>, now: DateTime<Utc>) -> Result<(), u64> {
        let mut key = session_token
            .filter(|t| !t.is_empty())
            .unwrap_or(ANONYMOUS_SESSION);
        let mut buckets = self.buckets.lock();

        // Rotating tokens must not grow the table without bound.
        if !buckets.contains_key(key) && buckets.len() >= self.max_sessions {
            let cutoff = now - Duration::minutes(IDLE_MINUTES);
            buckets.retain(|_, b| b.last_refill > cutoff);
            if buckets.len() >= self.max_sessions {
                tracing::warn!(sessions = buckets.len(), "session table full, using shared bucket");
                key = ANONYMOUS_SESSION;
            }
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.limit_per_minute, now));
        bucket.try_consume(now)
    }

    /// Drops buckets idle for more than five minutes.
    pub fn cleanup(&self) {
        let mut buckets = self.buckets.lock();
        let cutoff = Utc::now() - Duration::minutes(IDLE_MINUTES);
        buckets.retain(|_, b| b.last_refill > cutoff);
    }

    pub fn tracked_sessions(&self) -> usize {
        self.buckets.lock().len()
    }
}
