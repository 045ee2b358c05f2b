use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::vk::Counters;

/// Entries this many whole days old or older are treated as absent
const MAX_AGE_DAYS: i64 = 3;

/// Partial group data kept in the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedGroupData {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub counters: Option<Counters>,
}

/// A cached snapshot and the moment it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  #[serde(rename = "date")]
  pub timestamp: DateTime<Utc>,
  pub data: CachedGroupData,
}

impl CacheEntry {
  fn is_expired(&self, now: DateTime<Utc>) -> bool {
    (now - self.timestamp).num_days() >= MAX_AGE_DAYS
  }
}

/// Group id -> cached data, serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TtlCache {
  entries: BTreeMap<u64, CacheEntry>,
}

impl TtlCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Look up an entry, evicting it first if it has expired.
  pub fn get(&mut self, id: u64) -> Option<&CachedGroupData> {
    self.get_at(id, Utc::now())
  }

  pub fn get_at(&mut self, id: u64, now: DateTime<Utc>) -> Option<&CachedGroupData> {
    if self.entries.get(&id).is_some_and(|entry| entry.is_expired(now)) {
      tracing::debug!(id, "evicting expired cache entry");
      self.entries.remove(&id);
    }
    self.entries.get(&id).map(|entry| &entry.data)
  }

  /// Store data for `id`, stamped with the current time.
  pub fn put(&mut self, id: u64, data: CachedGroupData) {
    self.entries.insert(
      id,
      CacheEntry {
        timestamp: Utc::now(),
        data,
      },
    );
  }

  #[cfg(test)]
  pub fn insert_entry(&mut self, id: u64, entry: CacheEntry) {
    self.entries.insert(id, entry);
  }

  /// Whether an entry is stored, without evaluating expiry.
  pub fn contains(&self, id: u64) -> bool {
    self.entries.contains_key(&id)
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use std::collections::BTreeMap;

  fn counters(n: u64) -> CachedGroupData {
    CachedGroupData {
      counters: Some(Counters(BTreeMap::from([("photos".to_string(), n)]))),
    }
  }

  fn cache_with_entry_at(timestamp: DateTime<Utc>) -> TtlCache {
    let mut cache = TtlCache::new();
    cache.insert_entry(
      42,
      CacheEntry {
        timestamp,
        data: counters(7),
      },
    );
    cache
  }

  #[test]
  fn test_fresh_entry_is_returned() {
    let mut cache = TtlCache::new();
    cache.put(1, counters(5));
    assert_eq!(cache.get(1), Some(&counters(5)));
  }

  #[test]
  fn test_entry_survives_until_just_before_three_days() {
    let stored = Utc::now();
    let mut cache = cache_with_entry_at(stored);

    let now = stored + Duration::days(3) - Duration::seconds(1);
    assert_eq!(cache.get_at(42, now), Some(&counters(7)));
    assert!(cache.contains(42));
  }

  #[test]
  fn test_entry_expires_just_after_three_days() {
    let stored = Utc::now();
    let mut cache = cache_with_entry_at(stored);

    let now = stored + Duration::days(3) + Duration::seconds(1);
    assert_eq!(cache.get_at(42, now), None);
    assert!(!cache.contains(42));
  }

  #[test]
  fn test_entry_is_expired_at_exactly_three_days() {
    let stored = Utc::now();
    let mut cache = cache_with_entry_at(stored);

    assert_eq!(cache.get_at(42, stored + Duration::days(3)), None);
    assert!(cache.is_empty());
  }

  #[test]
  fn test_four_day_old_entry_is_evicted_on_access() {
    let mut cache = cache_with_entry_at(Utc::now() - Duration::days(4));
    assert!(cache.contains(42));

    assert_eq!(cache.get(42), None);
    assert!(!cache.contains(42));
    assert!(cache.is_empty());
  }

  #[test]
  fn test_expired_entries_are_not_swept_without_access() {
    let mut cache = cache_with_entry_at(Utc::now() - Duration::days(10));
    cache.put(1, counters(1));

    assert_eq!(cache.get(1), Some(&counters(1)));
    assert_eq!(cache.len(), 2);
  }

  #[test]
  fn test_serialized_shape() {
    let cache = cache_with_entry_at("2024-01-02T03:04:05Z".parse().unwrap());
    let json = serde_json::to_value(&cache).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "42": { "date": "2024-01-02T03:04:05Z", "data": { "counters": { "photos": 7 } } }
      })
    );

    let back: TtlCache = serde_json::from_value(json).unwrap();
    assert_eq!(back, cache);
  }
}
