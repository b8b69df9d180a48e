use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::info;

use limitgate_common::{LimitgateError, LimitgateResult};

use crate::{validate_policies, Policy};

/// Read-only source of rate-limit policies.
///
/// Implementations may be backed by anything from a fixed vector to a remote
/// database; the engine only ever asks for the currently-active set.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// The active policies, in the store's insertion order.
    async fn list_active(&self) -> LimitgateResult<Vec<Policy>>;
}

/// A fixed in-memory policy set, for embedding and tests.
pub struct StaticPolicyStore {
    policies: Vec<Policy>,
}

impl StaticPolicyStore {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }
}

#[async_trait]
impl PolicyStore for StaticPolicyStore {
    async fn list_active(&self) -> LimitgateResult<Vec<Policy>> {
        Ok(self
            .policies
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }
}

/// Policy store backed by a YAML file.
///
/// The parsed set is held behind `ArcSwap`, so request-path lookups are
/// lock-free and never touch the filesystem. Call [`reload`](Self::reload)
/// periodically (the server does this on a timer) to pick up edits; a file
/// that fails to parse or validate leaves the previous snapshot in place.
pub struct FilePolicyStore {
    path: PathBuf,
    snapshot: ArcSwap<Vec<Policy>>,
}

impl FilePolicyStore {
    /// Load the policy file at `path`. Fails if the file is missing or the
    /// policy set does not validate.
    pub fn load(path: impl Into<PathBuf>) -> LimitgateResult<Self> {
        let store = Self {
            path: path.into(),
            snapshot: ArcSwap::from_pointee(Vec::new()),
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-read the policy file and swap in the new snapshot.
    ///
    /// Returns the number of policies loaded.
    pub fn reload(&self) -> LimitgateResult<usize> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            LimitgateError::PolicyStore(format!("read {}: {e}", self.path.display()))
        })?;

        let policies: Vec<Policy> = serde_yaml::from_str(&content).map_err(|e| {
            LimitgateError::InvalidPolicy(format!("parse {}: {e}", self.path.display()))
        })?;

        validate_policies(&policies)?;

        let count = policies.len();
        self.snapshot.store(Arc::new(policies));
        info!(path = %self.path.display(), count, "loaded rate-limit policies");
        Ok(count)
    }
}

#[async_trait]
impl PolicyStore for FilePolicyStore {
    async fn list_active(&self) -> LimitgateResult<Vec<Policy>> {
        Ok(self
            .snapshot
            .load()
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }
}
