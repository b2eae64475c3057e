//! Master key lifecycle.
//!
//! Exactly one symmetric key exists per deployment. It is generated during
//! first-run admin setup, disclosed to the administrator once, and from then
//! on supplied through the `HAVEN_MASTER_KEY` environment value on every
//! process start. The application never persists it in recoverable form;
//! losing it makes all previously encrypted rows permanently undecryptable,
//! which is a documented tradeoff rather than a recoverable failure.

use std::sync::atomic::{AtomicBool, Ordering};

use haven_core::SecretString;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto;
use crate::error::{Result, SecretError};

/// Environment variable holding the hex-encoded master key.
pub const MASTER_KEY_ENV: &str = "HAVEN_MASTER_KEY";

/// The process-wide symmetric master key (32 random bytes).
///
/// Zeroed on drop. `Debug` is redacted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: Vec<u8>,
}

impl MasterKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self {
            bytes: crypto::generate_master_key(),
        }
    }

    /// Parse a key from its external hex representation.
    ///
    /// Must decode to exactly 32 bytes.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| SecretError::InvalidKey(format!("invalid hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(SecretError::InvalidKey(format!(
                "must decode to exactly 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// External representation, for the disclosure ceremony and deployment
    /// configuration.
    pub fn to_hex(&self) -> SecretString {
        SecretString::new(hex::encode(&self.bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Resolves and holds the master key for the lifetime of the process.
///
/// Construct one at startup via [`MasterKeyProvider::resolve`] (normal boot)
/// or [`MasterKeyProvider::generate`] (first boot, no admin user yet), then
/// hand it to [`EncryptionService`](crate::encryption::EncryptionService).
/// There is no way to call into the encryption path without a provider, so
/// "encrypt before a key exists" is unrepresentable.
pub struct MasterKeyProvider {
    key: MasterKey,
    disclosed: AtomicBool,
}

impl MasterKeyProvider {
    /// Load the key from the `HAVEN_MASTER_KEY` environment value.
    ///
    /// Fails with [`SecretError::KeyMissing`] when the value is absent; the
    /// process must treat that as fatal rather than serve encrypted reads and
    /// writes with no key.
    pub fn resolve() -> Result<Self> {
        match std::env::var(MASTER_KEY_ENV) {
            Ok(hex_key) => {
                debug!("using master key from environment");
                Ok(Self::from_key(MasterKey::from_hex(&hex_key)?))
            }
            Err(_) => Err(SecretError::KeyMissing(format!(
                "{MASTER_KEY_ENV} is not set; run first-time setup or restore the key from your deployment configuration"
            ))),
        }
    }

    /// First-boot path: generate a fresh key for a deployment that has no
    /// admin user yet.
    ///
    /// The setup flow must call [`reveal_once`](Self::reveal_once) and show
    /// the result to the administrator, who is responsible for persisting it
    /// externally (typically as `HAVEN_MASTER_KEY`).
    pub fn generate() -> Self {
        warn!("generating new master key; it must be disclosed to the administrator and persisted externally");
        Self::from_key(MasterKey::generate())
    }

    /// Wrap an already-resolved key.
    pub fn from_key(key: MasterKey) -> Self {
        Self {
            key,
            disclosed: AtomicBool::new(false),
        }
    }

    /// The one-time disclosure ceremony.
    ///
    /// Returns the hex-encoded key on the first call and `None` on every call
    /// after that. Intended to be invoked exactly once, by the first-run
    /// setup screen.
    pub fn reveal_once(&self) -> Option<SecretString> {
        if self.disclosed.swap(true, Ordering::SeqCst) {
            warn!("master key disclosure requested more than once; refusing");
            return None;
        }
        Some(self.key.to_hex())
    }

    pub fn key(&self) -> &MasterKey {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_round_trip() {
        let key = MasterKey::generate();
        let hex_key = key.to_hex();

        let parsed = MasterKey::from_hex(hex_key.expose()).unwrap();
        assert_eq!(parsed.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(matches!(
            MasterKey::from_hex("not-valid-hex!"),
            Err(SecretError::InvalidKey(_))
        ));
        // 16 bytes instead of 32.
        assert!(matches!(
            MasterKey::from_hex(&hex::encode([0u8; 16])),
            Err(SecretError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = MasterKey::generate();
        assert_eq!(format!("{key:?}"), "[REDACTED]");
    }

    #[test]
    fn test_reveal_once_is_one_shot() {
        let provider = MasterKeyProvider::generate();

        let first = provider.reveal_once();
        assert!(first.is_some());
        assert_eq!(first.unwrap().expose().len(), 64);

        assert!(provider.reveal_once().is_none());
        assert!(provider.reveal_once().is_none());
    }

    /// The env-var path, exercised sequentially in one test to avoid racing
    /// on process-global state.
    #[test]
    fn test_resolve_from_environment() {
        let key = MasterKey::generate();

        std::env::set_var(MASTER_KEY_ENV, key.to_hex().expose());
        let provider = MasterKeyProvider::resolve().unwrap();
        assert_eq!(provider.key().as_bytes(), key.as_bytes());

        std::env::set_var(MASTER_KEY_ENV, "zz-not-hex");
        assert!(matches!(
            MasterKeyProvider::resolve(),
            Err(SecretError::InvalidKey(_))
        ));

        std::env::remove_var(MASTER_KEY_ENV);
        assert!(matches!(
            MasterKeyProvider::resolve(),
            Err(SecretError::KeyMissing(_))
        ));
    }
}
