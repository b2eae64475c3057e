//! The encrypt/decrypt contract shared by every secret-bearing store.
//!
//! Stateless over the master key: the service owns no rows and no
//! connections, it is a pure transformation over caller-supplied strings.
//! Decrypt is failure-tolerant by contract — rows encrypted under a
//! previous, now-lost key (or plain corruption) must degrade, not crash the
//! calling store.

use std::sync::Arc;

use tracing::warn;

use crate::crypto;
use crate::error::Result;
use crate::master_key::MasterKeyProvider;

/// Encrypts and decrypts opaque strings under the process master key.
///
/// Cheap to clone; both stores hold one. Constructing it requires a
/// [`MasterKeyProvider`], which enforces the startup ordering: no provider,
/// no encryption path.
#[derive(Clone)]
pub struct EncryptionService {
    provider: Arc<MasterKeyProvider>,
}

impl EncryptionService {
    pub fn new(provider: Arc<MasterKeyProvider>) -> Self {
        Self { provider }
    }

    /// Encrypt `plaintext` into an opaque string safe for a TEXT column.
    ///
    /// Does not fail for any valid UTF-8 input, including the empty string
    /// (which still produces a full ciphertext, keeping it distinguishable
    /// from a decryption failure).
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        crypto::encrypt(self.provider.key().as_bytes(), plaintext)
    }

    /// Decrypt a string produced by [`encrypt`](Self::encrypt).
    ///
    /// Returns `None` for anything that does not decode under the current
    /// master key: foreign or malformed ciphertext, tampered rows, rows
    /// written under a rotated key. Never panics, and a failure leaves the
    /// service fully usable. `None` is always "unavailable", never "the
    /// value is empty" — genuinely empty plaintext comes back as `Some("")`.
    pub fn decrypt(&self, ciphertext: &str) -> Option<String> {
        match crypto::decrypt(self.provider.key().as_bytes(), ciphertext) {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                warn!("decryption failed, treating value as unavailable: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> EncryptionService {
        EncryptionService::new(Arc::new(MasterKeyProvider::generate()))
    }

    #[test]
    fn test_round_trip() {
        let service = test_service();

        for plaintext in ["sk-abc123", "", "多字节 ✓", "line\nbreaks\tand tabs"] {
            let ciphertext = service.encrypt(plaintext).unwrap();
            assert_ne!(ciphertext, plaintext);
            assert_eq!(service.decrypt(&ciphertext).as_deref(), Some(plaintext));
        }
    }

    #[test]
    fn test_foreign_key_ciphertext_degrades() {
        let service_a = test_service();
        let service_b = test_service();

        let ciphertext = service_a.encrypt("secret").unwrap();
        assert_eq!(service_b.decrypt(&ciphertext), None);

        // A failed decrypt must not block subsequent calls.
        let again = service_b.encrypt("other").unwrap();
        assert_eq!(service_b.decrypt(&again).as_deref(), Some("other"));
    }

    #[test]
    fn test_garbage_ciphertext_degrades() {
        let service = test_service();

        assert_eq!(service.decrypt(""), None);
        assert_eq!(service.decrypt("never-encrypted"), None);
        assert_eq!(service.decrypt("hv1:AAAA"), None);
    }

    #[test]
    fn test_empty_plaintext_is_not_a_failure_signal() {
        let service = test_service();

        let ciphertext = service.encrypt("").unwrap();
        // Some("") and None must stay distinguishable.
        assert_eq!(service.decrypt(&ciphertext), Some(String::new()));
    }
}
