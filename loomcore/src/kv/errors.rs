use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}
