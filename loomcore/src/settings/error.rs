use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("storage error reading settings: {0}")]
    Storage(String),
}

impl From<crate::kv::KvError> for SettingsError {
    fn from(err: crate::kv::KvError) -> Self {
        Self::Storage(err.to_string())
    }
}
