use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One admission decision as reported to the audit sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub subject_id: i64,
    pub path: String,
    pub method: String,
    pub status: u16,
    pub allowed: bool,
    /// The denying policy, when the request was denied.
    pub policy_id: Option<i64>,
    pub response_time_ms: u64,
    /// Set when an internal failure made the engine fail open for this
    /// request (policy lookup failure, bucket store failure, CAS exhaustion).
    pub degraded: bool,
}

impl AuditRecord {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Receives the outcome of every admission decision.
///
/// Sinks are fire-and-forget: `record` must not block on I/O and must never
/// fail the admission decision itself. The engine calls it exactly once per
/// `admit`, whatever the outcome.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Audit sink that emits structured log events.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        if record.degraded {
            tracing::warn!(
                subject_id = record.subject_id,
                path = %record.path,
                method = %record.method,
                status = record.status,
                allowed = record.allowed,
                response_time_ms = record.response_time_ms,
                "admission decision (degraded mode)"
            );
        } else {
            tracing::info!(
                subject_id = record.subject_id,
                path = %record.path,
                method = %record.method,
                status = record.status,
                allowed = record.allowed,
                policy_id = record.policy_id,
                response_time_ms = record.response_time_ms,
                "admission decision"
            );
        }
    }
}

/// Aggregates derived from the retained audit window.
#[derive(Debug, Clone, Serialize)]
pub struct AuditAggregate {
    pub avg_response_time_ms: u64,
    pub active_subjects: usize,
}

/// Capped in-memory audit log.
///
/// Keeps the most recent `capacity` records for the logs and stats endpoints;
/// older entries are dropped from the front.
pub struct MemoryAuditSink {
    entries: RwLock<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl MemoryAuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("audit log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All retained records in insertion order.
    pub fn snapshot(&self) -> Vec<AuditRecord> {
        self.entries
            .read()
            .expect("audit log lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// The most recent records, newest first, with pagination.
    pub fn recent(&self, limit: usize, offset: usize) -> Vec<AuditRecord> {
        let entries = self.entries.read().expect("audit log lock poisoned");
        entries
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn aggregate(&self) -> AuditAggregate {
        let entries = self.entries.read().expect("audit log lock poisoned");

        let total = entries.len() as u64;
        let avg_response_time_ms = if total > 0 {
            entries.iter().map(|e| e.response_time_ms).sum::<u64>() / total
        } else {
            0
        };

        let active_subjects = entries
            .iter()
            .map(|e| e.subject_id)
            .collect::<std::collections::HashSet<_>>()
            .len();

        AuditAggregate {
            avg_response_time_ms,
            active_subjects,
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        let mut entries = self.entries.write().expect("audit log lock poisoned");
        while entries.len() >= self.capacity.max(1) {
            entries.pop_front();
        }
        entries.push_back(record);
    }
}
