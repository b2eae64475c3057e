//! AES-256-GCM encryption with HKDF-SHA256 key derivation.
//!
//! Each secret gets a unique random salt; the master key is never used
//! directly as a cipher key. Salt and nonce are packed into the encoded
//! output, so a single opaque string is all the stores keep in their
//! encrypted TEXT columns: `hv1:` + base64(salt || nonce || ciphertext+tag).

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{Result, SecretError};

const NONCE_SIZE: usize = 12;
const SALT_SIZE: usize = 32;
const KEY_SIZE: usize = 32;
/// AES-GCM authentication tag length; even empty plaintext produces this much
/// ciphertext, which is what keeps "empty value" distinguishable from
/// "garbage row".
const TAG_SIZE: usize = 16;

/// Version prefix on every encoded ciphertext.
const PREFIX: &str = "hv1:";

/// HKDF info string used to domain-separate derived keys.
const HKDF_INFO: &[u8] = b"haven-secret-v1";

/// Derive a 256-bit encryption key from `master_key` and `salt` via HKDF-SHA256.
fn derive_key(master_key: &[u8], salt: &[u8]) -> [u8; KEY_SIZE] {
    let hk = Hkdf::<Sha256>::new(Some(salt), master_key);
    let mut okm = [0u8; KEY_SIZE];
    // expand cannot fail when output length <= 255 * hash-length
    hk.expand(HKDF_INFO, &mut okm)
        .expect("HKDF expand should not fail for 32-byte output");
    okm
}

/// Encrypt `plaintext` using a key derived from `master_key`.
///
/// The salt is randomly generated, so the same plaintext encrypted twice
/// produces different output. The result is safe to store in a TEXT column.
pub fn encrypt(master_key: &[u8], plaintext: &str) -> Result<String> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let key = derive_key(master_key, &salt);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

    let mut packed = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
    packed.extend_from_slice(&salt);
    packed.extend_from_slice(&nonce_bytes);
    packed.extend_from_slice(&ciphertext);

    Ok(format!("{PREFIX}{}", BASE64.encode(packed)))
}

/// Decrypt a string previously produced by [`encrypt`].
///
/// Format checks (prefix, base64, minimum length) run before any cipher work,
/// so rows that were never encrypted under this scheme fail early with a
/// clear error instead of a spurious authentication failure.
pub fn decrypt(master_key: &[u8], encoded: &str) -> Result<String> {
    let body = encoded
        .strip_prefix(PREFIX)
        .ok_or_else(|| SecretError::DecryptionFailed("missing version prefix".to_string()))?;

    let packed = BASE64
        .decode(body)
        .map_err(|e| SecretError::DecryptionFailed(format!("base64 decode failed: {e}")))?;

    if packed.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
        return Err(SecretError::DecryptionFailed(
            "ciphertext too short".to_string(),
        ));
    }

    let (salt, rest) = packed.split_at(SALT_SIZE);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

    let key = derive_key(master_key, salt);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| SecretError::DecryptionFailed(e.to_string()))?;

    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| SecretError::DecryptionFailed(e.to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|e| SecretError::DecryptionFailed(format!("invalid UTF-8: {e}")))
}

/// Generate a new random 256-bit master key.
pub fn generate_master_key() -> Vec<u8> {
    let mut key = vec![0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
