//! SQLite-backed key/value store.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::KeyValueStore;

/// Schema for the key/value table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, key)
);
"#;

/// Key/value store persisted in a SQLite database.
///
/// Several stores can share one database file; each one only sees the keys
/// of its own namespace.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  namespace: String,
}

impl SqliteStore {
  /// Open (or create) the database at `path` and scope the store to `namespace`.
  pub fn open(path: &Path, namespace: &str) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open storage database at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
      namespace: namespace.to_string(),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("xg").join("storage.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run storage migrations: {}", e))?;

    Ok(())
  }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
  async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT value FROM kv_store WHERE namespace = ? AND key = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let mut values = HashMap::new();
    for key in keys {
      let value: Option<String> = stmt
        .query_row(params![self.namespace, key], |row| row.get(0))
        .optional()
        .map_err(|e| eyre!("Failed to read key {}: {}", key, e))?;

      if let Some(value) = value {
        values.insert(key.to_string(), value);
      }
    }

    Ok(values)
  }

  async fn set(&self, values: HashMap<String, String>) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (key, value) in &values {
      tx.execute(
        "INSERT OR REPLACE INTO kv_store (namespace, key, value, updated_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![self.namespace, key, value],
      )
      .map_err(|e| eyre!("Failed to store key {}: {}", key, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }
}
