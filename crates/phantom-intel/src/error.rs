//! Error types for the phantom-intel crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntelError {
    #[error("Signature file not found: {path}")]
    SignatureFileNotFound { path: String },

    #[error("Failed to parse signature document: {0}")]
    SignatureParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IntelError>;
