//! Error types for WgPlane

use thiserror::Error;

/// Result type alias using WgPlane Error
pub type Result<T> = std::result::Result<T, Error>;

/// WgPlane error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid peer identity: {0}")]
    Validation(String),

    #[error("Peer already registered: {identity}")]
    DuplicateIdentity { identity: String },

    #[error("Peer not found: {identity}")]
    NotFound { identity: String },

    #[error("Address pool exhausted in {subnet}")]
    PoolExhausted { subnet: String },

    #[error("Server profile error: {0}")]
    Config(String),

    #[error("Interface sync error: {0}")]
    Sync(String),

    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Partial failure during {operation}: {cause}; rollback failed: {rollback}")]
    Partial {
        operation: String,
        cause: String,
        rollback: String,
    },

    #[error("Registry storage error: {0}")]
    Storage(String),
}
