use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OutlineError>;

#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}
