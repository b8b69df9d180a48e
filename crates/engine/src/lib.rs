//! Rate-limit admission engine.
//!
//! The engine decides, per request, whether a subject may proceed against
//! the configured rate-limit policies:
//!
//! - [`TokenBucket`] -- the pure refill/consume arithmetic over one bucket
//!   snapshot. Buckets start full, refill at a rate derived from the owning
//!   policy, and give up exactly one token per admitted request.
//!
//! - [`BucketStore`] -- keyed, version-protected storage for bucket state.
//!   The in-process [`MemoryBucketStore`] serializes writes per key through
//!   compare-and-swap while unrelated keys proceed in parallel.
//!
//! - [`AdmissionController`] -- the per-request orchestration: match
//!   policies to the path, consume from each bucket in priority order,
//!   short-circuit on the first denial, and report the decision to the
//!   [`AuditSink`].
//!
//! The controller is cheaply shareable across tasks and holds no mutable
//! state of its own; everything mutable lives behind the store traits.

pub mod admission;
pub mod audit;
pub mod bucket_store;
pub mod token_bucket;

pub use admission::{AdmissionController, AdmissionDecision};
pub use audit::{AuditAggregate, AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use bucket_store::{BucketKey, BucketStore, MemoryBucketStore};
pub use token_bucket::TokenBucket;
