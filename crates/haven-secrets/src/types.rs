//! Public types for the secrets subsystem.
//!
//! The stores never expose key material through these types: listings carry
//! presence booleans, and decrypted values travel as
//! [`SecretString`](haven_core::SecretString) where they are sensitive.

use serde::Serialize;

/// Owner id used when a caller operates outside a multi-user context.
///
/// Single-tenant mode is a real tenant named `"default"`, not a special case
/// buried in query logic. Store methods taking `Option<&str>` owners resolve
/// `None` to this value.
pub const DEFAULT_OWNER: &str = "default";

/// Outcome of a store operation.
///
/// Nothing in this subsystem returns `Err` across its public boundary;
/// callers pattern-match on this instead of checking null/false by
/// convention. "Does not exist" and "storage is down" are expected, common
/// results on the hot paths, not exceptional conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation succeeded with a value.
    Found(T),
    /// No row matched the lookup or delete.
    NotFound,
    /// The backing storage is not available; the operation degraded instead
    /// of failing the caller.
    Unavailable,
    /// The row exists but its sensitive payload does not decrypt under the
    /// current master key (rotated/lost key or corruption).
    DecryptFailed,
}

impl<T> Outcome<T> {
    /// Convert to `Option`, discarding the failure distinction.
    pub fn found(self) -> Option<T> {
        match self {
            Outcome::Found(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the operation produced a value.
    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }
}

/// Presence information for one stored plugin credential.
///
/// Safe to hand to the UI layer: contains no key material, encrypted or
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub plugin_id: String,
    pub has_api_key: bool,
    /// Last update time, epoch milliseconds.
    pub updated_at: i64,
}

/// A generated image with its sensitive fields decrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedImage {
    pub id: String,
    pub owner_id: String,
    /// The prompt the image was generated from. Empty when the stored
    /// ciphertext no longer decrypts.
    pub prompt: String,
    pub model_id: String,
    /// Image payload (base64 image data as produced by the generation
    /// plugin). Empty when the stored ciphertext no longer decrypts.
    pub data: String,
    pub size: Option<String>,
    pub quality: Option<String>,
    /// Creation time, epoch milliseconds. Set by the store.
    pub created_at: i64,
}

/// Parameters for persisting a newly generated image.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub prompt: String,
    pub model_id: String,
    pub data: String,
    pub size: Option<String>,
    pub quality: Option<String>,
}

/// Pagination parameters for [`ImageStore::list`](crate::images::ImageStore::list).
#[derive(Debug, Clone, Copy)]
pub struct ListQuery {
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

/// One page of a gallery listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagePage {
    /// Newest-first slice of the owner's images.
    pub items: Vec<GeneratedImage>,
    /// Total number of images for the owner, independent of the slice.
    pub total: u64,
}
