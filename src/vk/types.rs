use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Auxiliary per-group numbers (photos, albums, videos, ...).
///
/// An empty map is a valid value: it is what a failed fetch degrades to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counters(pub BTreeMap<String, u64>);

impl Counters {
  #[cfg(test)]
  pub fn get(&self, name: &str) -> Option<u64> {
    self.0.get(name).copied()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// A resolved group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
  pub id: u64,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub screen_name: String,
  /// 0 = open, 1 = closed, 2 = private
  #[serde(default)]
  pub is_closed: u8,
  /// 1 when the current user is a member
  #[serde(default)]
  pub is_member: u8,
  pub activity: Option<String>,
  pub members_count: Option<u64>,
  pub photo_100: Option<String>,
  pub photo_200: Option<String>,
  pub photo_max_orig: Option<String>,
  /// Set to "deleted" or "banned" for deactivated groups
  pub deactivated: Option<String>,
  pub ban_info: Option<serde_json::Value>,
  pub counters: Option<Counters>,
}

impl Group {
  /// Banned or deleted groups have no counters to load.
  pub fn is_banned(&self) -> bool {
    self.deactivated.is_some() || self.ban_info.is_some()
  }

  pub fn is_open(&self) -> bool {
    self.is_closed == 0
  }

  /// Content is reachable either because the group is open or the user is in it.
  pub fn has_access(&self) -> bool {
    self.is_open() || self.is_member == 1
  }

  /// Photo url, preferring the original size when asked for.
  pub fn photo(&self, original_size: bool) -> Option<&str> {
    let preferred = if original_size {
      self.photo_max_orig.as_deref()
    } else {
      None
    };
    preferred
      .or(self.photo_200.as_deref())
      .or(self.photo_100.as_deref())
  }
}

/// Photo album summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
  pub id: i64,
  pub owner_id: i64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub size: u64,
  pub thumb_src: Option<String>,
  pub description: Option<String>,
}

/// One page of a remote listing plus the total size of the listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
  #[serde(default)]
  pub count: usize,
  #[serde(default = "Vec::new")]
  pub items: Vec<T>,
}
