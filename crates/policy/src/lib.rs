//! Rate-limit policy model and policy stores.
//!
//! A [`Policy`] describes one rate-limit rule: which request paths it covers
//! (a glob-style [`endpoint pattern`](Policy::endpoint_pattern)), how many
//! requests are allowed per window, and its evaluation priority. Policies are
//! read-only inputs to the admission engine; creating and editing them is the
//! job of whatever tooling owns the policy file.
//!
//! Two [`PolicyStore`] implementations are provided:
//!
//! - [`StaticPolicyStore`] -- a fixed in-memory set, useful for embedding and
//!   tests.
//! - [`FilePolicyStore`] -- a YAML file snapshot behind
//!   [`ArcSwap`](arc_swap::ArcSwap), so lookups on the request path never
//!   touch the filesystem and a periodic [`reload`](FilePolicyStore::reload)
//!   converges on file changes within the configured interval.

pub mod matcher;
pub mod store;

use serde::{Deserialize, Serialize};

use limitgate_common::{LimitgateError, LimitgateResult};

pub use matcher::{matching_policies, pattern_matches};
pub use store::{FilePolicyStore, PolicyStore, StaticPolicyStore};

/// Evaluation priority. Higher priorities are checked first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Which callers a policy is meant to govern.
///
/// Matching currently applies every active policy to every subject, anonymous
/// included; the scope is carried on the record so an eligibility check has
/// an explicit seam without changing semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserScope {
    All,
    Authenticated,
    Specific,
}

impl Default for UserScope {
    fn default() -> Self {
        UserScope::All
    }
}

/// A time window spec such as `"1m"`, `"5m"`, `"1h"`, or `"1d"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeWindow(String);

impl TimeWindow {
    pub fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    /// Window length in seconds: `m` is minutes, `h` hours, `d` days.
    /// A spec that cannot be parsed falls back to 60 seconds.
    pub fn seconds(&self) -> u64 {
        let Some((idx, unit)) = self.0.char_indices().last() else {
            return 60;
        };
        let Ok(value) = self.0[..idx].parse::<u64>() else {
            return 60;
        };
        match unit {
            'm' => value * 60,
            'h' => value * 3600,
            'd' => value * 86400,
            _ => 60,
        }
    }

    /// Whether the spec is a positive integer followed by `m`, `h`, or `d`.
    pub fn is_well_formed(&self) -> bool {
        match self.0.char_indices().last() {
            Some((idx, 'm' | 'h' | 'd')) => {
                matches!(self.0[..idx].parse::<u64>(), Ok(v) if v > 0)
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One rate-limit policy record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub endpoint_pattern: String,
    /// Tokens per window; also the bucket capacity.
    pub request_limit: u32,
    pub time_window: TimeWindow,
    /// Stored and validated but not consulted by the consumption algorithm.
    pub burst_limit: u32,
    #[serde(default)]
    pub user_scope: UserScope,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Policy {
    /// Window length in seconds (see [`TimeWindow::seconds`]).
    pub fn window_seconds(&self) -> u64 {
        self.time_window.seconds()
    }

    /// Hint for how long a denied caller should wait before retrying:
    /// the average token interval, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        self.window_seconds().div_ceil(u64::from(self.request_limit))
    }

    fn validate(&self) -> Result<(), String> {
        if self.endpoint_pattern.is_empty() {
            return Err(format!("policy '{}': endpoint_pattern is empty", self.name));
        }
        if self.request_limit == 0 {
            return Err(format!("policy '{}': request_limit must be at least 1", self.name));
        }
        if self.burst_limit == 0 {
            return Err(format!("policy '{}': burst_limit must be at least 1", self.name));
        }
        if !self.time_window.is_well_formed() {
            return Err(format!(
                "policy '{}': time_window '{}' is not of the form <n>m|h|d",
                self.name,
                self.time_window.as_str()
            ));
        }
        Ok(())
    }
}

/// Validate a policy set before it is served to the engine.
///
/// Rejects malformed records and duplicate `endpoint_pattern`s among active
/// policies: bucket identity is keyed on the pattern, so two active policies
/// sharing one pattern would collide on the same bucket.
pub fn validate_policies(policies: &[Policy]) -> LimitgateResult<()> {
    let mut seen_patterns = std::collections::HashSet::new();

    for policy in policies {
        policy.validate().map_err(LimitgateError::InvalidPolicy)?;

        if policy.is_active && !seen_patterns.insert(policy.endpoint_pattern.as_str()) {
            return Err(LimitgateError::InvalidPolicy(format!(
                "duplicate endpoint_pattern '{}' among active policies",
                policy.endpoint_pattern
            )));
        }
    }

    Ok(())
}
