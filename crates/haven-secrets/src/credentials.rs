//! Per-(owner, plugin) API key storage with environment fallback.
//!
//! One encrypted key per `(owner_id, plugin_id)` pair, upsert semantics.
//! Lookups sit on the hot path of every plugin invocation, so every
//! operation treats "storage unavailable" and "not found" as ordinary
//! outcomes and never propagates an error to the caller.

use std::sync::Arc;

use haven_core::{id, time::now_ms, SecretString};
use sqlx::FromRow;
use tracing::{debug, warn};

use crate::db::Database;
use crate::encryption::EncryptionService;
use crate::types::{CredentialStatus, Outcome, DEFAULT_OWNER};

/// Store for third-party plugin API keys.
pub struct CredentialStore {
    db: Arc<Database>,
    crypto: EncryptionService,
}

#[derive(FromRow)]
struct StatusRow {
    plugin_id: String,
    encrypted_api_key: String,
    updated_at: i64,
}

impl CredentialStore {
    pub fn new(db: Arc<Database>, crypto: EncryptionService) -> Self {
        Self { db, crypto }
    }

    /// Resolve the API key for a plugin.
    ///
    /// Fallback chain: the stored per-owner key first (decrypted, non-empty),
    /// then the named process environment variable. The environment lets a
    /// deployment bootstrap a plugin before anyone configures it in the UI;
    /// a per-user key silently takes precedence once set. A stored row that
    /// no longer decrypts logs a warning and falls through to the
    /// environment.
    ///
    /// `owner_id: None` means the [`DEFAULT_OWNER`] tenant.
    pub async fn get_api_key(
        &self,
        plugin_id: &str,
        env_var: &str,
        owner_id: Option<&str>,
    ) -> Outcome<SecretString> {
        let owner = owner_id.unwrap_or(DEFAULT_OWNER);

        let mut storage_ok = false;
        if let Some(pool) = self.db.pool() {
            let lookup = sqlx::query_scalar::<_, String>(
                "SELECT encrypted_api_key FROM plugin_credentials
                 WHERE owner_id = ? AND plugin_id = ?",
            )
            .bind(owner)
            .bind(plugin_id)
            .fetch_optional(pool)
            .await;

            match lookup {
                Ok(Some(ciphertext)) => {
                    storage_ok = true;
                    match self.crypto.decrypt(&ciphertext) {
                        Some(key) if !key.is_empty() => {
                            return Outcome::Found(SecretString::new(key));
                        }
                        Some(_) => {
                            debug!(plugin_id, owner, "stored credential is empty");
                        }
                        None => {
                            warn!(
                                plugin_id,
                                owner,
                                "stored credential does not decrypt; falling back to environment"
                            );
                        }
                    }
                }
                Ok(None) => storage_ok = true,
                Err(e) => warn!(plugin_id, owner, "credential lookup failed: {e}"),
            }
        }

        match env_value(env_var) {
            Some(value) => Outcome::Found(SecretString::new(value)),
            None if storage_ok => Outcome::NotFound,
            None => Outcome::Unavailable,
        }
    }

    /// Whether a key resolves for the plugin, through either link of the
    /// fallback chain.
    pub async fn has_api_key(
        &self,
        plugin_id: &str,
        env_var: &str,
        owner_id: Option<&str>,
    ) -> bool {
        self.get_api_key(plugin_id, env_var, owner_id)
            .await
            .is_found()
    }

    /// List stored credentials for an owner: presence and freshness only,
    /// never key material.
    pub async fn get_credentials(&self, owner_id: Option<&str>) -> Outcome<Vec<CredentialStatus>> {
        let owner = owner_id.unwrap_or(DEFAULT_OWNER);
        let Some(pool) = self.db.pool() else {
            return Outcome::Unavailable;
        };

        let rows = sqlx::query_as::<_, StatusRow>(
            "SELECT plugin_id, encrypted_api_key, updated_at FROM plugin_credentials
             WHERE owner_id = ? ORDER BY plugin_id",
        )
        .bind(owner)
        .fetch_all(pool)
        .await;

        match rows {
            Ok(rows) => Outcome::Found(
                rows.into_iter()
                    .map(|row| CredentialStatus {
                        plugin_id: row.plugin_id,
                        has_api_key: !row.encrypted_api_key.is_empty(),
                        updated_at: row.updated_at,
                    })
                    .collect(),
            ),
            Err(e) => {
                warn!(owner, "credential listing failed: {e}");
                Outcome::Unavailable
            }
        }
    }

    /// Store (or replace) the API key for `(owner, plugin)`.
    ///
    /// Read-before-write upsert: at most one row per pair. Concurrent writes
    /// to the same pair resolve last-write-wins, which is acceptable for
    /// rare, user-initiated credential updates.
    pub async fn set_api_key(
        &self,
        plugin_id: &str,
        api_key: &str,
        owner_id: Option<&str>,
    ) -> Outcome<()> {
        let owner = owner_id.unwrap_or(DEFAULT_OWNER);
        let Some(pool) = self.db.pool() else {
            warn!(plugin_id, owner, "cannot store credential: storage unavailable");
            return Outcome::Unavailable;
        };

        let encrypted = match self.crypto.encrypt(api_key) {
            Ok(ciphertext) => ciphertext,
            Err(e) => {
                warn!(plugin_id, owner, "credential encryption failed: {e}");
                return Outcome::Unavailable;
            }
        };
        let now = now_ms();

        let existing = sqlx::query_scalar::<_, String>(
            "SELECT id FROM plugin_credentials WHERE owner_id = ? AND plugin_id = ?",
        )
        .bind(owner)
        .bind(plugin_id)
        .fetch_optional(pool)
        .await;

        let written = match existing {
            Ok(Some(row_id)) => {
                sqlx::query(
                    "UPDATE plugin_credentials SET encrypted_api_key = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(&encrypted)
                .bind(now)
                .bind(&row_id)
                .execute(pool)
                .await
                .map(|_| ())
            }
            Ok(None) => {
                sqlx::query(
                    "INSERT INTO plugin_credentials
                        (id, owner_id, plugin_id, encrypted_api_key, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(id::uuid())
                .bind(owner)
                .bind(plugin_id)
                .bind(&encrypted)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map(|_| ())
            }
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                debug!(plugin_id, owner, "stored plugin credential");
                Outcome::Found(())
            }
            Err(e) => {
                warn!(plugin_id, owner, "storing credential failed: {e}");
                Outcome::Unavailable
            }
        }
    }

    /// Delete the stored key for `(owner, plugin)`.
    ///
    /// `Found(())` only when a row was actually removed, so callers can tell
    /// "deleted" from "nothing to delete".
    pub async fn delete_api_key(&self, plugin_id: &str, owner_id: Option<&str>) -> Outcome<()> {
        let owner = owner_id.unwrap_or(DEFAULT_OWNER);
        let Some(pool) = self.db.pool() else {
            return Outcome::Unavailable;
        };

        let result =
            sqlx::query("DELETE FROM plugin_credentials WHERE owner_id = ? AND plugin_id = ?")
                .bind(owner)
                .bind(plugin_id)
                .execute(pool)
                .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                debug!(plugin_id, owner, "deleted plugin credential");
                Outcome::Found(())
            }
            Ok(_) => Outcome::NotFound,
            Err(e) => {
                warn!(plugin_id, owner, "deleting credential failed: {e}");
                Outcome::Unavailable
            }
        }
    }

    /// Remove every credential belonging to an owner. Invoked by the
    /// account-deletion workflow; best-effort, reports rather than throws.
    /// Zero rows removed is still success.
    pub async fn delete_all_for_owner(&self, owner_id: &str) -> Outcome<u64> {
        let Some(pool) = self.db.pool() else {
            warn!(owner = owner_id, "credential cleanup skipped: storage unavailable");
            return Outcome::Unavailable;
        };

        match sqlx::query("DELETE FROM plugin_credentials WHERE owner_id = ?")
            .bind(owner_id)
            .execute(pool)
            .await
        {
            Ok(done) => {
                debug!(
                    owner = owner_id,
                    removed = done.rows_affected(),
                    "deleted owner credentials"
                );
                Outcome::Found(done.rows_affected())
            }
            Err(e) => {
                warn!(owner = owner_id, "owner credential cleanup failed: {e}");
                Outcome::Unavailable
            }
        }
    }

    /// Remove every credential for a plugin across all owners. Invoked by
    /// the plugin-uninstall workflow; same best-effort posture as
    /// [`delete_all_for_owner`](Self::delete_all_for_owner).
    pub async fn delete_all_for_plugin(&self, plugin_id: &str) -> Outcome<u64> {
        let Some(pool) = self.db.pool() else {
            warn!(plugin_id, "credential cleanup skipped: storage unavailable");
            return Outcome::Unavailable;
        };

        match sqlx::query("DELETE FROM plugin_credentials WHERE plugin_id = ?")
            .bind(plugin_id)
            .execute(pool)
            .await
        {
            Ok(done) => {
                debug!(
                    plugin_id,
                    removed = done.rows_affected(),
                    "deleted plugin credentials"
                );
                Outcome::Found(done.rows_affected())
            }
            Err(e) => {
                warn!(plugin_id, "plugin credential cleanup failed: {e}");
                Outcome::Unavailable
            }
        }
    }
}

/// Non-empty environment value, if any.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
