use thiserror::Error;
use trafficguard_core_types::GuardError;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy store is not configured")]
    MissingStore,
    #[error("invalid server name: {0:?}")]
    InvalidServerName(String),
    #[error("decode policy document: {0}")]
    Decode(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl From<GuardError> for PolicyError {
    fn from(value: GuardError) -> Self {
        match value {
            GuardError::InvalidServerName(name) => PolicyError::InvalidServerName(name),
        }
    }
}

/// Failures reported by a [`crate::store::PolicyStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend error: {0}")]
    Backend(String),
}
