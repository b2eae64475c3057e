//! # haven-core
//!
//! Shared primitives used across the Haven crates:
//!
//! - **SecretString**: plaintext wrapper that never reaches logs and is
//!   zeroed on drop
//! - **id**: generated row identifiers
//! - **time**: the epoch-millisecond timestamp representation persisted by
//!   the stores

pub mod id;
pub mod secret;
pub mod time;

pub use secret::SecretString;
