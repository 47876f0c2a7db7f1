use thiserror::Error;

pub type Result<T, E = SpeechError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("synthesizer unavailable: {0}")]
    Unavailable(String),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
