use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use limitgate_policy::Policy;

/// Snapshot of one token bucket's state.
///
/// The bucket itself is pure data; [`try_consume`](TokenBucket::try_consume)
/// computes an updated snapshot and the store is responsible for persisting
/// it. Identity (which subject and pattern the bucket belongs to) lives in
/// the store key, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBucket {
    pub tokens: f64,
    pub max_tokens: f64,
    /// Tokens added per second; 0 means the bucket never replenishes within
    /// the observed horizon.
    pub refill_rate: f64,
    pub last_refill: DateTime<Utc>,
}

impl TokenBucket {
    /// Seed a full bucket for `policy` at time `now`.
    ///
    /// The refill rate is `floor(request_limit / window_seconds)`, so a
    /// window longer than the limit allows meaningful per-second refill
    /// yields rate 0. That is accepted behavior, not an error.
    pub fn for_policy(policy: &Policy, now: DateTime<Utc>) -> Self {
        let max_tokens = f64::from(policy.request_limit);
        let window_secs = policy.window_seconds().max(1);
        let refill_rate = (u64::from(policy.request_limit) / window_secs) as f64;

        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate,
            last_refill: now,
        }
    }

    /// Refill for the elapsed time and try to take one token.
    ///
    /// Returns whether a token was consumed and the updated snapshot. The
    /// updated snapshot's `last_refill` is `now` in either case; skipping the
    /// anchor on denial would grant back the denied interval on the next
    /// call. Elapsed time is clamped at zero so clock skew can never drain
    /// tokens.
    pub fn try_consume(&self, now: DateTime<Utc>) -> (bool, TokenBucket) {
        let elapsed_secs = (now - self.last_refill).num_seconds().max(0) as f64;
        let refilled = (self.tokens + self.refill_rate * elapsed_secs).min(self.max_tokens);

        let (allowed, tokens) = if refilled >= 1.0 {
            (true, refilled - 1.0)
        } else {
            (false, refilled)
        };

        (
            allowed,
            TokenBucket {
                tokens,
                max_tokens: self.max_tokens,
                refill_rate: self.refill_rate,
                last_refill: now,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limitgate_policy::{Priority, TimeWindow, UserScope};

    fn policy(request_limit: u32, window: &str) -> Policy {
        Policy {
            id: 1,
            name: "test".to_string(),
            description: None,
            endpoint_pattern: "/api/*".to_string(),
            request_limit,
            time_window: TimeWindow::new(window),
            burst_limit: request_limit,
            user_scope: UserScope::All,
            priority: Priority::Medium,
            is_active: true,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn starts_full_and_drains() {
        let bucket = TokenBucket::for_policy(&policy(2, "1m"), at(0));
        assert_eq!(bucket.tokens, 2.0);

        let (allowed, bucket) = bucket.try_consume(at(0));
        assert!(allowed);
        let (allowed, bucket) = bucket.try_consume(at(0));
        assert!(allowed);
        let (allowed, bucket) = bucket.try_consume(at(0));
        assert!(!allowed);
        assert_eq!(bucket.tokens, 0.0);
    }

    #[test]
    fn refills_at_derived_rate() {
        // 120 per minute => 2 tokens per second.
        let bucket = TokenBucket::for_policy(&policy(120, "1m"), at(0));
        assert_eq!(bucket.refill_rate, 2.0);

        let mut bucket = bucket;
        for _ in 0..120 {
            let (allowed, next) = bucket.try_consume(at(0));
            assert!(allowed);
            bucket = next;
        }
        let (allowed, bucket) = bucket.try_consume(at(0));
        assert!(!allowed);

        // Three seconds later six tokens have accrued.
        let (allowed, bucket) = bucket.try_consume(at(3));
        assert!(allowed);
        assert_eq!(bucket.tokens, 5.0);
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let bucket = TokenBucket::for_policy(&policy(120, "1m"), at(0));
        let (_, bucket) = bucket.try_consume(at(0));

        // A long idle period caps back at max, not beyond.
        let (allowed, bucket) = bucket.try_consume(at(3600));
        assert!(allowed);
        assert_eq!(bucket.tokens, bucket.max_tokens - 1.0);
    }

    #[test]
    fn zero_rate_bucket_never_replenishes() {
        // 1 request per day floors to a refill rate of 0.
        let bucket = TokenBucket::for_policy(&policy(1, "1d"), at(0));
        assert_eq!(bucket.refill_rate, 0.0);

        let (allowed, bucket) = bucket.try_consume(at(0));
        assert!(allowed);
        let (allowed, _) = bucket.try_consume(at(1));
        assert!(!allowed);
    }

    #[test]
    fn clock_skew_clamps_to_zero_elapsed() {
        let bucket = TokenBucket::for_policy(&policy(60, "1m"), at(100));
        let (_, drained) = bucket.try_consume(at(100));

        // `now` behind last_refill: no refund, no extra drain.
        let (allowed, skewed) = drained.try_consume(at(50));
        assert!(allowed);
        assert_eq!(skewed.tokens, drained.tokens - 1.0);
        assert_eq!(skewed.last_refill, at(50));
    }

    #[test]
    fn denial_still_anchors_last_refill() {
        let bucket = TokenBucket::for_policy(&policy(1, "1d"), at(0));
        let (_, bucket) = bucket.try_consume(at(0));

        let (allowed, bucket) = bucket.try_consume(at(42));
        assert!(!allowed);
        assert_eq!(bucket.last_refill, at(42));
    }

    #[test]
    fn same_second_requests_accrue_nothing() {
        // Integer-second elapsed: a caller hammering within one second gets
        // no partial refill even at rate 1/s.
        let bucket = TokenBucket::for_policy(&policy(60, "1m"), at(0));
        let mut bucket = bucket;
        for _ in 0..60 {
            let (_, next) = bucket.try_consume(at(0));
            bucket = next;
        }
        let (allowed, _) = bucket.try_consume(at(0));
        assert!(!allowed);
    }
}
