use std::collections::HashMap;

use crate::vk::Group;

/// Resolved groups by id, iterated in the order they were first resolved.
#[derive(Debug, Clone, Default)]
pub struct GroupMap {
  groups: Vec<Group>,
  index: HashMap<u64, usize>,
}

impl GroupMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a group, or replace a previously resolved one in place.
  ///
  /// The fresh copy replaces the old one whole, counters included.
  pub fn insert(&mut self, group: Group) -> &mut Group {
    match self.index.get(&group.id).copied() {
      Some(position) => {
        let existing = &mut self.groups[position];
        *existing = group;
        existing
      }
      None => {
        let position = self.groups.len();
        self.index.insert(group.id, position);
        self.groups.push(group);
        &mut self.groups[position]
      }
    }
  }

  pub fn get(&self, id: u64) -> Option<&Group> {
    self.index.get(&id).map(|&position| &self.groups[position])
  }

  pub fn get_mut(&mut self, id: u64) -> Option<&mut Group> {
    self
      .index
      .get(&id)
      .map(|&position| &mut self.groups[position])
  }

  pub fn contains(&self, id: u64) -> bool {
    self.index.contains_key(&id)
  }

  pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Group> {
    self.groups.iter()
  }

  pub fn len(&self) -> usize {
    self.groups.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vk::fake::group;
  use crate::vk::Counters;

  #[test]
  fn test_update_in_place_keeps_position_and_replaces_counters() {
    let mut map = GroupMap::new();
    map.insert(group(1, "one"));
    map.insert(group(2, "two"));
    map.get_mut(1).unwrap().counters = Some(Counters::default());

    map.insert(group(1, "one renamed"));

    let names: Vec<&str> = map.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["one renamed", "two"]);
    assert!(map.get(1).unwrap().counters.is_none());
    assert_eq!(map.len(), 2);
  }
}
