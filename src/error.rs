// src/error.rs

#[derive(Debug, thiserror::Error)]
pub enum PostureError {
    #[error("Degenerate geometry: coincident points have no angle")]
    DegenerateGeometry,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed frame on line {line}: {message}")]
    MalformedFrame { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PostureResult<T> = Result<T, PostureError>;
