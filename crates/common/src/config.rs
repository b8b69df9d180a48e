use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level limitgate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub policies: PolicyFileConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Where rate-limit policies are read from and how often the snapshot is
/// refreshed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFileConfig {
    pub file: PathBuf,
    #[serde(default = "default_reload_secs")]
    pub reload_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Buckets idle longer than this are evicted by the cleanup task.
    #[serde(default = "default_bucket_idle_secs")]
    pub bucket_idle_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Capacity of the in-memory audit log exposed via /api/logs.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bucket_idle_secs: default_bucket_idle_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

// Default value helpers
fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_reload_secs() -> u64 {
    5
}
fn default_bucket_idle_secs() -> u64 {
    600
}
fn default_cleanup_interval_secs() -> u64 {
    60
}
fn default_audit_capacity() -> usize {
    10_000
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen.is_empty() {
            anyhow::bail!("server.listen must not be empty");
        }
        if self.policies.reload_secs == 0 {
            anyhow::bail!("policies.reload_secs must be at least 1");
        }
        if self.engine.cleanup_interval_secs == 0 {
            anyhow::bail!("engine.cleanup_interval_secs must be at least 1");
        }
        Ok(())
    }
}
