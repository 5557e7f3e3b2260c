use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("stroke has no points")]
    EmptyStroke,
}
