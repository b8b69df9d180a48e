use thiserror::Error;

#[derive(Debug, Error)]
pub enum LimitgateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("policy lookup failed: {0}")]
    PolicyStore(String),

    #[error("bucket store conflict for {0}")]
    BucketConflict(String),

    #[error("bucket store unavailable: {0}")]
    BucketUnavailable(String),

    #[error("invalid policy configuration: {0}")]
    InvalidPolicy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type LimitgateResult<T> = Result<T, LimitgateError>;
