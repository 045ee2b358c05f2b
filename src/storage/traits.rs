//! Storage facade trait.

use async_trait::async_trait;
use color_eyre::Result;
use std::collections::HashMap;

/// Async key/value store.
///
/// A successful `set` must be durable; nothing else is promised. Keys missing
/// from the store are simply absent from the map returned by `get`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
  /// Read the given keys. Absent keys are omitted from the result.
  async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>>;

  /// Write every pair in `values`, replacing existing values.
  async fn set(&self, values: HashMap<String, String>) -> Result<()>;

  /// Read a single key.
  async fn get_one(&self, key: &str) -> Result<Option<String>> {
    let mut values = self.get(&[key]).await?;
    Ok(values.remove(key))
  }

  /// Write a single key.
  async fn set_one(&self, key: &str, value: String) -> Result<()> {
    self.set(HashMap::from([(key.to_string(), value)])).await
  }
}
