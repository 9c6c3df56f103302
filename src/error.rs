use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PromoError>;

/// Failures that stop the process. Per-code failures never end up here,
/// they are `FetchOutcome` values counted by the orchestrator.
#[derive(Debug, Error)]
pub enum PromoError {
    #[error("results file {} is corrupt: {source}", path.display())]
    StoreCorruption {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid arguments: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not replace results file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("logger setup failed: {0}")]
    Logger(#[from] log::SetLoggerError),
}

impl PromoError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        PromoError::InvalidArgument(msg.into())
    }
}
