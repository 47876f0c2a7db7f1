use thiserror::Error;

pub type Result<T, E = ChatError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("model not configured: {0}")]
    NotConfigured(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("empty completion")]
    EmptyCompletion,
}
