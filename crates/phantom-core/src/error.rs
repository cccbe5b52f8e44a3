use thiserror::Error;

/// Top-level error type for the shared Phantom types.
#[derive(Error, Debug)]
pub enum PhantomError {
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PhantomError>;
