use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device not connected")]
    NotConnected,
    #[error("port not found: {0}")]
    PortNotFound(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}
