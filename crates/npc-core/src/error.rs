use thiserror::Error;

pub type Result<T, E = NpcError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum NpcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unknown mode: {0}")]
    UnknownMode(String),
    #[error("device transport: {0}")]
    Transport(#[from] device_link::TransportError),
}
