//! Bookmark ("pin") persistence.
//!
//! Pins are stored as one ordered list of offsets (seconds) per episode,
//! under the key built by [`pin_key`].

use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, params};
use tracing::debug;

/// Default key prefix for episode pins.
pub const DEFAULT_PIN_KEY_PREFIX: &str = "pins_";

/// Builds the storage key of an episode's pin list, e.g. `pins_A`.
pub fn pin_key(prefix: &str, episode_id: &str) -> String {
    format!("{}{}", prefix, episode_id)
}

/// Synchronous key/value persistence for pin lists.
pub trait BookmarkStore: Send + Sync {
    /// Returns the list stored under `key`, empty when absent.
    fn get(&self, key: &str) -> Result<Vec<f64>>;

    /// Replaces the list stored under `key`.
    fn put(&self, key: &str, pins: &[f64]) -> Result<()>;
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryBookmarkStore {
    entries: RwLock<HashMap<String, Vec<f64>>>,
}

impl MemoryBookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BookmarkStore for MemoryBookmarkStore {
    fn get(&self, key: &str) -> Result<Vec<f64>> {
        Ok(self.entries.read().get(key).cloned().unwrap_or_default())
    }

    fn put(&self, key: &str, pins: &[f64]) -> Result<()> {
        self.entries.write().insert(key.to_string(), pins.to_vec());
        Ok(())
    }
}

/// SQLite backed store (one table for every episode).
pub struct SqliteBookmarkStore {
    conn: Mutex<Connection>,
}

impl SqliteBookmarkStore {
    /// Opens (or creates) the database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Créer le répertoire parent si nécessaire
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create bookmark directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open bookmark database {}", db_path.display()))?;
        Self::with_connection(conn)
    }

    /// Opens a transient database, mostly useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS bookmarks (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )
        .context("Failed to create bookmarks table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl BookmarkStore for SqliteBookmarkStore {
    fn get(&self, key: &str) -> Result<Vec<f64>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT value FROM bookmarks WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        let raw = match result {
            Ok(raw) => raw,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(Vec::new()),
            Err(e) => return Err(e).context(format!("Failed to load bookmarks for {}", key)),
        };

        serde_json::from_str(&raw).with_context(|| format!("Corrupted bookmark list for {}", key))
    }

    fn put(&self, key: &str, pins: &[f64]) -> Result<()> {
        let value = serde_json::to_string(pins).context("Failed to encode bookmark list")?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO bookmarks (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )
        .with_context(|| format!("Failed to save bookmarks for {}", key))?;

        debug!(key, count = pins.len(), "Bookmarks saved");
        Ok(())
    }
}
