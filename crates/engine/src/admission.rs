use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::warn;

use limitgate_common::{LimitgateError, LimitgateResult};
use limitgate_policy::{matching_policies, Policy, PolicyStore};

use crate::audit::{AuditRecord, AuditSink};
use crate::bucket_store::{BucketKey, BucketStore};

/// How many times a lost compare-and-swap is retried before the policy is
/// treated as degraded. A swap only fails because another writer committed,
/// so the bound is reached solely under sustained contention on one bucket.
const CAS_RETRY_LIMIT: usize = 8;

/// Outcome of one admission check.
#[derive(Debug, Clone)]
pub enum AdmissionDecision {
    Allowed,
    Denied {
        /// The policy whose bucket ran dry.
        policy: Policy,
        /// Hint for the caller's `Retry-After` response field.
        retry_after_secs: u64,
    },
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionDecision::Allowed)
    }

    /// The HTTP status this decision maps to at the boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            AdmissionDecision::Allowed => 200,
            AdmissionDecision::Denied { .. } => 429,
        }
    }

    pub fn matched_policy_id(&self) -> Option<i64> {
        match self {
            AdmissionDecision::Allowed => None,
            AdmissionDecision::Denied { policy, .. } => Some(policy.id),
        }
    }
}

/// The admission engine: matches policies against a request, consumes from
/// the per-subject buckets, and reports every decision to the audit sink.
///
/// One controller instance is shared across all requests; all mutable state
/// lives in the bucket store. The controller is cheap to construct and holds
/// only `Arc`s to its collaborators.
pub struct AdmissionController {
    policy_store: Arc<dyn PolicyStore>,
    bucket_store: Arc<dyn BucketStore>,
    audit: Arc<dyn AuditSink>,
}

impl AdmissionController {
    pub fn new(
        policy_store: Arc<dyn PolicyStore>,
        bucket_store: Arc<dyn BucketStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            policy_store,
            bucket_store,
            audit,
        }
    }

    /// Decide whether `subject_id` may proceed with a request to `path`.
    ///
    /// Policies are evaluated in priority order and the first denial wins;
    /// lower-priority buckets are not touched after a denial. Internal
    /// failures fail open: a policy-lookup failure admits the request
    /// unconditionally, a bucket-store failure skips enforcement of that
    /// policy only. Either way the decision is reported to the audit sink
    /// exactly once, with `degraded` set when enforcement was incomplete.
    pub async fn admit(&self, subject_id: i64, path: &str, method: &str) -> AdmissionDecision {
        let start = Instant::now();
        let mut degraded = false;

        let policies = match self.policy_store.list_active().await {
            Ok(policies) => policies,
            Err(e) => {
                warn!(error = %e, path, "policy lookup failed, admitting without enforcement");
                degraded = true;
                Vec::new()
            }
        };

        let mut decision = AdmissionDecision::Allowed;

        for policy in matching_policies(&policies, path) {
            match self.consume_for_policy(subject_id, &policy).await {
                Ok(true) => {}
                Ok(false) => {
                    decision = AdmissionDecision::Denied {
                        retry_after_secs: policy.retry_after_secs(),
                        policy,
                    };
                    break;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        policy = %policy.name,
                        subject_id,
                        "bucket store failure, policy not enforced for this request"
                    );
                    degraded = true;
                }
            }
        }

        self.audit.record(AuditRecord {
            id: AuditRecord::new_id(),
            timestamp: Utc::now(),
            subject_id,
            path: path.to_string(),
            method: method.to_string(),
            status: decision.status_code(),
            allowed: decision.is_allowed(),
            policy_id: decision.matched_policy_id(),
            response_time_ms: start.elapsed().as_millis() as u64,
            degraded,
        });

        decision
    }

    /// Take one token from the subject's bucket for `policy`.
    ///
    /// The read-modify-write is retried on a lost swap with a fresh snapshot
    /// and a fresh timestamp, so the net effect of concurrent calls is some
    /// serial order of their consumptions.
    async fn consume_for_policy(&self, subject_id: i64, policy: &Policy) -> LimitgateResult<bool> {
        let key = BucketKey::new(subject_id, policy.endpoint_pattern.clone());

        for _ in 0..CAS_RETRY_LIMIT {
            let now = Utc::now();
            let (version, bucket) = self
                .bucket_store
                .get_or_create(subject_id, policy, now)
                .await?;
            let (allowed, updated) = bucket.try_consume(now);

            if self
                .bucket_store
                .compare_and_swap(&key, version, updated)
                .await?
            {
                return Ok(allowed);
            }
        }

        Err(LimitgateError::BucketConflict(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::bucket_store::MemoryBucketStore;
    use limitgate_policy::{Priority, StaticPolicyStore, TimeWindow, UserScope};

    fn policy(id: i64, pattern: &str, request_limit: u32, priority: Priority) -> Policy {
        Policy {
            id,
            name: format!("policy-{id}"),
            description: None,
            endpoint_pattern: pattern.to_string(),
            request_limit,
            time_window: TimeWindow::new("1m"),
            burst_limit: request_limit,
            user_scope: UserScope::All,
            priority,
            is_active: true,
        }
    }

    fn controller(
        policies: Vec<Policy>,
    ) -> (AdmissionController, Arc<MemoryBucketStore>, Arc<MemoryAuditSink>) {
        let buckets = Arc::new(MemoryBucketStore::new());
        let audit = Arc::new(MemoryAuditSink::new(100));
        let controller = AdmissionController::new(
            Arc::new(StaticPolicyStore::new(policies)),
            buckets.clone(),
            audit.clone(),
        );
        (controller, buckets, audit)
    }

    #[tokio::test]
    async fn allow_allow_deny_with_retry_hint() {
        let (controller, _, _) =
            controller(vec![policy(1, "/api/users/*", 2, Priority::High)]);

        assert!(controller.admit(42, "/api/users/7", "GET").await.is_allowed());
        assert!(controller.admit(42, "/api/users/7", "GET").await.is_allowed());

        match controller.admit(42, "/api/users/7", "GET").await {
            AdmissionDecision::Denied {
                policy,
                retry_after_secs,
            } => {
                assert_eq!(policy.id, 1);
                assert_eq!(retry_after_secs, 30);
            }
            AdmissionDecision::Allowed => panic!("third request should be denied"),
        }
    }

    #[tokio::test]
    async fn unmatched_path_admits_without_creating_buckets() {
        let (controller, buckets, _) =
            controller(vec![policy(1, "/api/users/*", 2, Priority::High)]);

        let decision = controller.admit(42, "/healthz", "GET").await;
        assert!(decision.is_allowed());
        assert!(buckets.is_empty());
    }

    #[tokio::test]
    async fn high_priority_denial_short_circuits_lower_buckets() {
        let (controller, buckets, _) = controller(vec![
            policy(1, "/api/*", 100, Priority::Low),
            policy(2, "/api/users/*", 1, Priority::High),
        ]);

        assert!(controller.admit(7, "/api/users/1", "GET").await.is_allowed());
        assert!(!controller.admit(7, "/api/users/1", "GET").await.is_allowed());

        // The low-priority bucket was only consumed by the first (allowed)
        // request; the denial stopped before reaching it.
        let low = policy(1, "/api/*", 100, Priority::Low);
        let (_, bucket) = buckets.get_or_create(7, &low, Utc::now()).await.unwrap();
        assert_eq!(bucket.tokens, 99.0);
    }

    #[tokio::test]
    async fn subjects_do_not_share_buckets() {
        let (controller, _, _) =
            controller(vec![policy(1, "/api/users/*", 1, Priority::Medium)]);

        assert!(controller.admit(1, "/api/users/7", "GET").await.is_allowed());
        assert!(!controller.admit(1, "/api/users/7", "GET").await.is_allowed());
        assert!(controller.admit(2, "/api/users/7", "GET").await.is_allowed());
    }

    #[tokio::test]
    async fn one_audit_record_per_admit() {
        let (controller, _, audit) =
            controller(vec![policy(1, "/api/users/*", 1, Priority::Medium)]);

        controller.admit(42, "/api/users/7", "GET").await;
        controller.admit(42, "/api/users/7", "GET").await;
        controller.admit(42, "/unmatched", "GET").await;

        assert_eq!(audit.len(), 3);

        let records = audit.recent(10, 0);
        assert!(records[0].allowed); // unmatched path
        assert!(!records[1].allowed);
        assert_eq!(records[1].status, 429);
        assert_eq!(records[1].policy_id, Some(1));
        assert!(records[2].allowed);
        assert_eq!(records[2].policy_id, None);
    }
}
