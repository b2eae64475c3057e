//! Encrypted storage for generated images.
//!
//! Each row carries two independent ciphertexts (prompt and image payload)
//! plus plaintext metadata. Rows are created fully formed on a successful
//! generation event and never updated; deletion is the only mutation.
//! Ownership is checked on every single-row read and delete, so an id alone
//! never crosses owners.

use std::sync::Arc;

use haven_core::{id, time::now_ms};
use sqlx::FromRow;
use tracing::{debug, warn};

use crate::db::Database;
use crate::encryption::EncryptionService;
use crate::types::{GeneratedImage, ImagePage, ListQuery, NewImage, Outcome};

/// Store for user-owned generated images.
pub struct ImageStore {
    db: Arc<Database>,
    crypto: EncryptionService,
}

#[derive(FromRow)]
struct ImageRow {
    id: String,
    owner_id: String,
    encrypted_prompt: String,
    model_id: String,
    encrypted_image_data: String,
    size: Option<String>,
    quality: Option<String>,
    created_at: i64,
}

impl ImageStore {
    pub fn new(db: Arc<Database>, crypto: EncryptionService) -> Self {
        Self { db, crypto }
    }

    /// Persist a newly generated image.
    ///
    /// The store generates the id and creation timestamp. Prompt and payload
    /// are encrypted independently, so either can later fail to decrypt
    /// without taking the other with it. The returned value carries the
    /// plaintext the caller already holds; nothing is re-decrypted on the
    /// write path.
    pub async fn save(&self, owner_id: &str, image: NewImage) -> Outcome<GeneratedImage> {
        let Some(pool) = self.db.pool() else {
            warn!(owner = owner_id, "cannot save image: storage unavailable");
            return Outcome::Unavailable;
        };

        let (encrypted_prompt, encrypted_data) = match (
            self.crypto.encrypt(&image.prompt),
            self.crypto.encrypt(&image.data),
        ) {
            (Ok(prompt), Ok(data)) => (prompt, data),
            (Err(e), _) | (_, Err(e)) => {
                warn!(owner = owner_id, "image encryption failed: {e}");
                return Outcome::Unavailable;
            }
        };

        let row_id = id::uuid();
        let created_at = now_ms();

        let inserted = sqlx::query(
            "INSERT INTO generated_images
                (id, owner_id, encrypted_prompt, model_id, encrypted_image_data,
                 size, quality, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row_id)
        .bind(owner_id)
        .bind(&encrypted_prompt)
        .bind(&image.model_id)
        .bind(&encrypted_data)
        .bind(image.size.as_deref())
        .bind(image.quality.as_deref())
        .bind(created_at)
        .execute(pool)
        .await;

        match inserted {
            Ok(_) => {
                debug!(image_id = %row_id, owner = owner_id, "saved generated image");
                Outcome::Found(GeneratedImage {
                    id: row_id,
                    owner_id: owner_id.to_string(),
                    prompt: image.prompt,
                    model_id: image.model_id,
                    data: image.data,
                    size: image.size,
                    quality: image.quality,
                    created_at,
                })
            }
            Err(e) => {
                warn!(owner = owner_id, "saving image failed: {e}");
                Outcome::Unavailable
            }
        }
    }

    /// One page of an owner's gallery, newest first.
    ///
    /// `total` counts all of the owner's images regardless of the slice. A
    /// row whose ciphertext no longer decrypts surfaces with empty
    /// placeholder fields instead of sinking the whole page.
    pub async fn list(&self, owner_id: &str, query: ListQuery) -> Outcome<ImagePage> {
        let Some(pool) = self.db.pool() else {
            return Outcome::Unavailable;
        };

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM generated_images WHERE owner_id = ?",
        )
        .bind(owner_id)
        .fetch_one(pool)
        .await;

        let total = match total {
            Ok(total) => total as u64,
            Err(e) => {
                warn!(owner = owner_id, "image count failed: {e}");
                return Outcome::Unavailable;
            }
        };

        // rowid breaks created_at ties so consecutive pages never overlap.
        let rows = sqlx::query_as::<_, ImageRow>(
            "SELECT id, owner_id, encrypted_prompt, model_id, encrypted_image_data,
                    size, quality, created_at
             FROM generated_images
             WHERE owner_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?",
        )
        .bind(owner_id)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(pool)
        .await;

        match rows {
            Ok(rows) => Outcome::Found(ImagePage {
                items: rows.into_iter().map(|row| self.decrypt_row(row)).collect(),
                total,
            }),
            Err(e) => {
                warn!(owner = owner_id, "image listing failed: {e}");
                Outcome::Unavailable
            }
        }
    }

    /// Ownership-checked single fetch: both id and owner must match.
    ///
    /// A payload that no longer decrypts returns
    /// [`Outcome::DecryptFailed`] — a gallery fetch without image bytes is
    /// not a found artifact. A failed prompt alone degrades to an empty
    /// placeholder, as on the list path.
    pub async fn get(&self, image_id: &str, owner_id: &str) -> Outcome<GeneratedImage> {
        let Some(pool) = self.db.pool() else {
            return Outcome::Unavailable;
        };

        let row = sqlx::query_as::<_, ImageRow>(
            "SELECT id, owner_id, encrypted_prompt, model_id, encrypted_image_data,
                    size, quality, created_at
             FROM generated_images
             WHERE id = ? AND owner_id = ?",
        )
        .bind(image_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await;

        match row {
            Ok(Some(row)) => {
                let Some(data) = self.crypto.decrypt(&row.encrypted_image_data) else {
                    warn!(image_id, owner = owner_id, "image payload does not decrypt");
                    return Outcome::DecryptFailed;
                };
                let prompt = self.crypto.decrypt(&row.encrypted_prompt).unwrap_or_else(|| {
                    warn!(image_id, owner = owner_id, "image prompt does not decrypt; returning placeholder");
                    String::new()
                });
                Outcome::Found(GeneratedImage {
                    id: row.id,
                    owner_id: row.owner_id,
                    prompt,
                    model_id: row.model_id,
                    data,
                    size: row.size,
                    quality: row.quality,
                    created_at: row.created_at,
                })
            }
            Ok(None) => Outcome::NotFound,
            Err(e) => {
                warn!(image_id, owner = owner_id, "image fetch failed: {e}");
                Outcome::Unavailable
            }
        }
    }

    /// Ownership-checked delete. `Found(())` only when a row matching both
    /// id and owner was removed.
    pub async fn delete_one(&self, image_id: &str, owner_id: &str) -> Outcome<()> {
        let Some(pool) = self.db.pool() else {
            return Outcome::Unavailable;
        };

        let result = sqlx::query("DELETE FROM generated_images WHERE id = ? AND owner_id = ?")
            .bind(image_id)
            .bind(owner_id)
            .execute(pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                debug!(image_id, owner = owner_id, "deleted generated image");
                Outcome::Found(())
            }
            Ok(_) => Outcome::NotFound,
            Err(e) => {
                warn!(image_id, owner = owner_id, "deleting image failed: {e}");
                Outcome::Unavailable
            }
        }
    }

    /// Remove every image belonging to an owner. Used for account cleanup;
    /// zero rows removed is still success.
    pub async fn delete_all(&self, owner_id: &str) -> Outcome<u64> {
        let Some(pool) = self.db.pool() else {
            warn!(owner = owner_id, "image cleanup skipped: storage unavailable");
            return Outcome::Unavailable;
        };

        match sqlx::query("DELETE FROM generated_images WHERE owner_id = ?")
            .bind(owner_id)
            .execute(pool)
            .await
        {
            Ok(done) => {
                debug!(
                    owner = owner_id,
                    removed = done.rows_affected(),
                    "deleted owner images"
                );
                Outcome::Found(done.rows_affected())
            }
            Err(e) => {
                warn!(owner = owner_id, "owner image cleanup failed: {e}");
                Outcome::Unavailable
            }
        }
    }

    fn decrypt_row(&self, row: ImageRow) -> GeneratedImage {
        let prompt = self.crypto.decrypt(&row.encrypted_prompt).unwrap_or_else(|| {
            warn!(image_id = %row.id, "image prompt does not decrypt; returning placeholder");
            String::new()
        });
        let data = self.crypto.decrypt(&row.encrypted_image_data).unwrap_or_else(|| {
            warn!(image_id = %row.id, "image payload does not decrypt; returning placeholder");
            String::new()
        });

        GeneratedImage {
            id: row.id,
            owner_id: row.owner_id,
            prompt,
            model_id: row.model_id,
            data,
            size: row.size,
            quality: row.quality,
            created_at: row.created_at,
        }
    }
}
