//! Encrypted secret-at-rest storage for Haven.
//!
//! Everything sensitive a Haven deployment persists — third-party plugin API
//! keys and generated-image payloads/prompts — goes through this crate and
//! never lands on disk in plaintext. One AES-256-GCM master key per
//! deployment, generated at first-admin setup, disclosed to the
//! administrator exactly once, and loaded from the environment on every
//! later boot.
//!
//! Public store operations never return errors: every failure mode
//! (missing row, uninitialized storage, ciphertext that no longer decrypts)
//! is an ordinary [`Outcome`](types::Outcome) variant for callers to match
//! on.

pub mod credentials;
pub mod crypto;
pub mod db;
pub mod encryption;
pub mod error;
pub mod images;
pub mod master_key;
pub mod types;

pub use credentials::CredentialStore;
pub use db::Database;
pub use encryption::EncryptionService;
pub use error::{Result, SecretError};
pub use images::ImageStore;
pub use master_key::{MasterKey, MasterKeyProvider, MASTER_KEY_ENV};
pub use types::{
    CredentialStatus, GeneratedImage, ImagePage, ListQuery, NewImage, Outcome, DEFAULT_OWNER,
};
