use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use limitgate_common::LimitgateResult;
use limitgate_policy::Policy;

use crate::token_bucket::TokenBucket;

/// Identity of one bucket: a subject paired with the owning policy's
/// endpoint pattern. Two concrete paths matched by the same pattern share a
/// bucket; two subjects never do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub subject_id: i64,
    pub endpoint_pattern: String,
}

impl BucketKey {
    pub fn new(subject_id: i64, endpoint_pattern: impl Into<String>) -> Self {
        Self {
            subject_id,
            endpoint_pattern: endpoint_pattern.into(),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_id, self.endpoint_pattern)
    }
}

/// Keyed, version-protected storage for token buckets.
///
/// Reads hand out a snapshot plus its version; writes go through
/// [`compare_and_swap`](BucketStore::compare_and_swap), which commits only if
/// the version is unchanged. Two concurrent consumers of the same bucket can
/// therefore never both act on a stale token count: the loser's swap fails
/// and it must re-fetch. Unrelated keys proceed fully in parallel.
///
/// This is the only operation in the admission path that may await I/O.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Fetch the bucket for `(subject_id, policy.endpoint_pattern)`, creating
    /// it full if it does not exist. Returns the snapshot and its version.
    async fn get_or_create(
        &self,
        subject_id: i64,
        policy: &Policy,
        now: DateTime<Utc>,
    ) -> LimitgateResult<(u64, TokenBucket)>;

    /// Replace the bucket state if its version still equals
    /// `expected_version`. Returns `false` (without writing) on a version
    /// mismatch or a concurrently evicted key.
    async fn compare_and_swap(
        &self,
        key: &BucketKey,
        expected_version: u64,
        updated: TokenBucket,
    ) -> LimitgateResult<bool>;
}

struct VersionedBucket {
    version: u64,
    bucket: TokenBucket,
}

/// In-process [`BucketStore`] backed by a concurrent map.
///
/// The version check and write happen under the key's shard lock, which
/// makes `compare_and_swap` atomic per key while leaving other keys
/// untouched.
pub struct MemoryBucketStore {
    buckets: DashMap<BucketKey, VersionedBucket>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Evict buckets whose last refill is older than `max_idle`.
    ///
    /// Call periodically to keep one-off subjects from growing the map
    /// without bound. An evicted bucket is lazily recreated full on the next
    /// request, the same state it would have refilled to after a long idle
    /// period -- except for zero-rate buckets, so `max_idle` should comfortably
    /// exceed the longest policy window in use.
    pub fn cleanup(&self, now: DateTime<Utc>, max_idle: Duration) {
        self.buckets
            .retain(|_key, entry| now - entry.bucket.last_refill < max_idle);

        tracing::debug!(remaining = self.buckets.len(), "bucket cleanup complete");
    }
}

impl Default for MemoryBucketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn get_or_create(
        &self,
        subject_id: i64,
        policy: &Policy,
        now: DateTime<Utc>,
    ) -> LimitgateResult<(u64, TokenBucket)> {
        let key = BucketKey::new(subject_id, policy.endpoint_pattern.clone());

        let entry = self.buckets.entry(key).or_insert_with(|| VersionedBucket {
            version: 0,
            bucket: TokenBucket::for_policy(policy, now),
        });

        Ok((entry.version, entry.bucket.clone()))
    }

    async fn compare_and_swap(
        &self,
        key: &BucketKey,
        expected_version: u64,
        updated: TokenBucket,
    ) -> LimitgateResult<bool> {
        match self.buckets.get_mut(key) {
            Some(mut entry) if entry.version == expected_version => {
                entry.version += 1;
                entry.bucket = updated;
                Ok(true)
            }
            // Lost the race, or the key was evicted under us; the caller
            // re-fetches and retries.
            _ => Ok(false),
        }
    }
}
