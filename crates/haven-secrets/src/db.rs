//! SQLite persistence handle shared by the secret-bearing stores.
//!
//! "Storage not yet initialized" is a first-class state: a [`Database`] can
//! exist without a pool, and every store operation checks [`Database::pool`]
//! first and degrades to `Outcome::Unavailable` instead of crashing. The
//! pool attaches at most once, matching the single shared connection the
//! stores are specified against.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::OnceCell;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::Result;

/// Shared handle to the secrets database.
pub struct Database {
    pool: OnceCell<SqlitePool>,
}

impl Database {
    /// A handle with no storage behind it yet.
    ///
    /// Stores built over a detached handle stay functional and report
    /// `Unavailable` until [`attach`](Self::attach) is called.
    pub fn detached() -> Self {
        Self {
            pool: OnceCell::new(),
        }
    }

    /// Open (creating if missing) the database file at `path` and run
    /// migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connect_file(path.as_ref()).await?;
        migrate(&pool).await?;
        Ok(Self {
            pool: OnceCell::with_value(pool),
        })
    }

    /// Open a private in-memory database. Used by tests.
    pub async fn open_in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // A single connection that never expires, or the in-memory database
        // vanishes with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        migrate(&pool).await?;
        Ok(Self {
            pool: OnceCell::with_value(pool),
        })
    }

    /// Connect a previously detached handle. First attach wins; later calls
    /// are ignored with a warning.
    pub async fn attach(&self, path: impl AsRef<Path>) -> Result<()> {
        let pool = connect_file(path.as_ref()).await?;
        migrate(&pool).await?;
        if self.pool.set(pool).is_err() {
            warn!("database handle already attached; ignoring");
        }
        Ok(())
    }

    /// The connection pool, if storage has been initialized.
    pub fn pool(&self) -> Option<&SqlitePool> {
        self.pool.get()
    }
}

async fn connect_file(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        // Prevent transient "database is locked" errors under concurrent access.
        .busy_timeout(Duration::from_secs(5));

    // SQLite permits limited write concurrency; a single connection avoids
    // persistent "database is locked" failures.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await?;

    debug!(path = %path.display(), "opened secrets database");
    Ok(pool)
}

/// Create the schema. Every statement is idempotent, so this runs on every
/// open.
async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS plugin_credentials (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            plugin_id TEXT NOT NULL,
            encrypted_api_key TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    // Documents the one-row-per-pair intent; the store still upserts via
    // read-before-write and treats a violation like unavailable storage.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_plugin_credentials_owner_plugin
            ON plugin_credentials(owner_id, plugin_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS generated_images (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            encrypted_prompt TEXT NOT NULL,
            model_id TEXT NOT NULL,
            encrypted_image_data TEXT NOT NULL,
            size TEXT,
            quality TEXT,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_generated_images_owner_created
            ON generated_images(owner_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
