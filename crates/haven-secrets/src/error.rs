//! Error types for the secrets subsystem.
//!
//! These are internal: public store operations convert every failure into an
//! [`Outcome`](crate::types::Outcome) instead of letting errors cross the
//! subsystem boundary.

use thiserror::Error;

/// Errors that can occur during secret operations.
#[derive(Debug, Error)]
pub enum SecretError {
    /// No master key has been established for the process. Fatal: encrypted
    /// reads and writes cannot be served without one.
    #[error("Master key not established: {0}")]
    KeyMissing(String),

    #[error("Invalid master key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;
