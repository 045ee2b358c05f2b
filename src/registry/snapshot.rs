//! Folder -> ids dumps used for storage and for backup files.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Default file name for exported backups
pub const BACKUP_FILE_NAME: &str = "xg-backup.json";

/// Ordered mapping of folder name to group ids.
///
/// Serializes as a JSON object whose keys keep their insertion order, so a
/// dump written and read back yields the memberships in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderGroups {
  folders: Vec<(String, Vec<u64>)>,
}

impl FolderGroups {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append `id` to `folder`, creating the folder at the end if needed.
  pub fn push(&mut self, folder: &str, id: u64) {
    self.folder_mut(folder).push(id);
  }

  fn folder_mut(&mut self, folder: &str) -> &mut Vec<u64> {
    let index = match self.folders.iter().position(|(name, _)| name == folder) {
      Some(index) => index,
      None => {
        self.folders.push((folder.to_string(), Vec::new()));
        self.folders.len() - 1
      }
    };
    &mut self.folders[index].1
  }

  #[cfg(test)]
  pub fn get(&self, folder: &str) -> Option<&[u64]> {
    self
      .folders
      .iter()
      .find(|(name, _)| name == folder)
      .map(|(_, ids)| ids.as_slice())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &[u64])> {
    self
      .folders
      .iter()
      .map(|(name, ids)| (name.as_str(), ids.as_slice()))
  }

  /// Every (folder, id) pair in order.
  pub fn pairs(&self) -> impl Iterator<Item = (&str, u64)> {
    self
      .iter()
      .flat_map(|(folder, ids)| ids.iter().map(move |id| (folder, *id)))
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.folders.is_empty()
  }

  /// Parse stored data, skipping whatever does not have the expected shape.
  ///
  /// Anything that is not a JSON object yields an empty dump; folders whose
  /// value is not an array of ids are dropped with a warning.
  pub fn parse_lenient(raw: &str) -> Self {
    let value: serde_json::Value = match serde_json::from_str(raw) {
      Ok(value) => value,
      Err(e) => {
        tracing::warn!("stored groups are not valid JSON: {}", e);
        return Self::new();
      }
    };

    let Some(object) = value.as_object() else {
      tracing::warn!("stored groups are not an object");
      return Self::new();
    };

    let mut dump = Self::new();
    for (folder, value) in object {
      let Some(values) = value.as_array() else {
        tracing::warn!(folder = %folder, "stored folder is not an array of ids, skipping");
        continue;
      };
      let ids = dump.folder_mut(folder);
      for value in values {
        match value.as_u64() {
          Some(id) => ids.push(id),
          None => tracing::warn!(folder = %folder, "skipping invalid group id {}", value),
        }
      }
    }
    dump
  }
}

impl FromIterator<(String, u64)> for FolderGroups {
  fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
    let mut dump = Self::new();
    for (folder, id) in iter {
      dump.push(&folder, id);
    }
    dump
  }
}

impl Serialize for FolderGroups {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.folders.len()))?;
    for (folder, ids) in &self.folders {
      map.serialize_entry(folder, ids)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for FolderGroups {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct FolderGroupsVisitor;

    impl<'de> Visitor<'de> for FolderGroupsVisitor {
      type Value = FolderGroups;

      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping folder names to arrays of group ids")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut dump = FolderGroups::new();
        while let Some((folder, ids)) = access.next_entry::<String, Vec<u64>>()? {
          dump.folder_mut(&folder).extend(ids);
        }
        Ok(dump)
      }
    }

    deserializer.deserialize_map(FolderGroupsVisitor)
  }
}

/// Backup file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupsExport {
  #[serde(rename = "groupIdsDictByFolderName")]
  pub group_ids_by_folder: FolderGroups,
}
