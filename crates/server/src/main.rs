mod routes;
mod state;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use limitgate_common::AppConfig;
use limitgate_engine::{AdmissionController, MemoryAuditSink, MemoryBucketStore};
use limitgate_policy::FilePolicyStore;

use crate::state::{AppState, FanoutAuditSink, GateMetrics, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    // Parse command-line args for config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/limitgate.yaml".to_string());

    info!(config_path = %config_path, "starting limitgate");

    let config = AppConfig::load(&config_path)?;

    // Wire the engine: policy snapshot, bucket state, audit fan-out.
    let policy_store = Arc::new(FilePolicyStore::load(config.policies.file.clone())?);
    let bucket_store = Arc::new(MemoryBucketStore::new());
    let audit_log = Arc::new(MemoryAuditSink::new(config.engine.audit_capacity));
    let metrics = GateMetrics::new();
    let audit = Arc::new(FanoutAuditSink::new(audit_log.clone(), &metrics));

    let controller =
        AdmissionController::new(policy_store.clone(), bucket_store.clone(), audit);

    spawn_policy_reload(policy_store, config.policies.reload_secs);
    spawn_bucket_cleanup(
        bucket_store,
        config.engine.cleanup_interval_secs,
        config.engine.bucket_idle_secs,
    );

    let listen = config.server.listen.clone();
    let state: SharedState = Arc::new(AppState {
        config,
        controller,
        audit_log,
        metrics,
        start_time: std::time::Instant::now(),
    });

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!(addr = %listen, "limitgate API listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Refresh the policy snapshot on a timer so file edits converge within the
/// configured interval. A failed reload keeps the previous snapshot.
fn spawn_policy_reload(store: Arc<FilePolicyStore>, reload_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(reload_secs));
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            if let Err(e) = store.reload() {
                warn!(error = %e, "policy reload failed, keeping previous snapshot");
            }
        }
    });
}

/// Evict buckets idle past the configured threshold.
fn spawn_bucket_cleanup(store: Arc<MemoryBucketStore>, interval_secs: u64, idle_secs: u64) {
    tokio::spawn(async move {
        let max_idle = chrono::Duration::seconds(idle_secs as i64);
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.cleanup(chrono::Utc::now(), max_idle);
        }
    });
}
