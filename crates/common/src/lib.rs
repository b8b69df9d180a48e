pub mod config;
pub mod error;

pub use config::{AppConfig, EngineConfig, PolicyFileConfig, ServerConfig};
pub use error::{LimitgateError, LimitgateResult};
