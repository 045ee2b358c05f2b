use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::snapshot::FolderGroups;

/// The user's decision to keep a group inside a named folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMembership {
  pub id: u64,
  pub folder: String,
}

/// Insertion-ordered memberships with at most one entry per group id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memberships {
  items: Vec<LocalMembership>,
}

impl Memberships {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert or replace the membership of `id`.
  ///
  /// An existing entry is removed first, so the group always ends up last.
  pub fn upsert(&mut self, id: u64, folder: &str) {
    self.remove(id);
    self.items.push(LocalMembership {
      id,
      folder: folder.to_string(),
    });
  }

  /// Returns whether anything was removed.
  pub fn remove(&mut self, id: u64) -> bool {
    let before = self.items.len();
    self.items.retain(|m| m.id != id);
    self.items.len() != before
  }

  /// Returns how many memberships were removed.
  pub fn remove_many(&mut self, ids: &HashSet<u64>) -> usize {
    let before = self.items.len();
    self.items.retain(|m| !ids.contains(&m.id));
    before - self.items.len()
  }

  pub fn clear(&mut self) {
    self.items.clear();
  }

  pub fn get(&self, id: u64) -> Option<&LocalMembership> {
    self.items.iter().find(|m| m.id == id)
  }

  pub fn contains(&self, id: u64) -> bool {
    self.get(id).is_some()
  }

  pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LocalMembership> {
    self.items.iter()
  }

  pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
    self.items.iter().map(|m| m.id)
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Distinct folder names in order of first appearance.
  pub fn folders(&self) -> Vec<&str> {
    let mut seen = HashSet::new();
    self
      .items
      .iter()
      .map(|m| m.folder.as_str())
      .filter(|folder| seen.insert(*folder))
      .collect()
  }

  /// Memberships keyed by group id. Later entries win.
  pub fn by_id(&self) -> HashMap<u64, &LocalMembership> {
    self.items.iter().map(|m| (m.id, m)).collect()
  }

  /// Group ids per folder, keeping relative insertion order.
  pub fn to_folder_groups(&self) -> FolderGroups {
    self
      .items
      .iter()
      .map(|m| (m.folder.clone(), m.id))
      .collect()
  }

  /// Build memberships from a dump, in dump order.
  pub fn from_folder_groups(dump: &FolderGroups) -> Self {
    let mut memberships = Self::new();
    for (folder, id) in dump.pairs() {
      memberships.upsert(id, folder);
    }
    memberships
  }
}
