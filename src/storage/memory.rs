use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::traits::KeyValueStore;

/// Store that keeps everything in process memory.
/// Used for tests and when no storage path can be determined.
#[derive(Debug, Default)]
pub struct MemoryStore {
  values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a store pre-populated with the given pairs.
  #[cfg(test)]
  pub fn with_values<I, K, V>(values: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      values: Mutex::new(
        values
          .into_iter()
          .map(|(k, v)| (k.into(), v.into()))
          .collect(),
      ),
    }
  }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
  async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
    let values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      keys
        .iter()
        .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect(),
    )
  }

  async fn set(&self, new_values: HashMap<String, String>) -> Result<()> {
    let mut values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    values.extend(new_values);
    Ok(())
  }
}
