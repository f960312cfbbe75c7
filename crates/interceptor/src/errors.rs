use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterceptError {
    /// Rejected by the interception policy. Carries no policy details.
    #[error("request rejected")]
    Blocked,
}
