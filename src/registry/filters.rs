//! View filters over the resolved groups.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use color_eyre::{eyre::eyre, Report};

use super::memberships::Memberships;
use crate::vk::Group;

/// Which groups to keep depending on whether their content is reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessFilter {
  #[default]
  None,
  Access,
  NoAccess,
  Open,
  Close,
}

impl AccessFilter {
  fn matches(&self, group: &Group) -> bool {
    match self {
      AccessFilter::None => true,
      AccessFilter::Access => group.has_access(),
      AccessFilter::NoAccess => !group.has_access(),
      AccessFilter::Open => group.is_open(),
      AccessFilter::Close => !group.is_open(),
    }
  }
}

impl FromStr for AccessFilter {
  type Err = Report;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "none" | "all" => Ok(AccessFilter::None),
      "access" => Ok(AccessFilter::Access),
      "noaccess" | "no-access" => Ok(AccessFilter::NoAccess),
      "open" => Ok(AccessFilter::Open),
      "close" | "closed" => Ok(AccessFilter::Close),
      _ => Err(eyre!("Unknown access filter: {}", s)),
    }
  }
}

/// Display order relative to when groups were added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
  Newest,
  Oldest,
  Random,
}

impl FromStr for SortOrder {
  type Err = Report;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "newest" => Ok(SortOrder::Newest),
      "oldest" => Ok(SortOrder::Oldest),
      "random" => Ok(SortOrder::Random),
      _ => Err(eyre!("Unknown sort order: {}", s)),
    }
  }
}

/// Filter and sort state of the group list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
  /// Empty means every folder
  #[serde(default)]
  pub folder: String,
  #[serde(default)]
  pub search: String,
  #[serde(default)]
  pub access: AccessFilter,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sort: Option<SortOrder>,
}

impl Default for FilterState {
  fn default() -> Self {
    Self {
      folder: String::new(),
      search: String::new(),
      access: AccessFilter::None,
      sort: Some(SortOrder::Newest),
    }
  }
}

impl FilterState {
  /// Keep the groups matching every filter, then order them.
  pub fn apply<'a>(&self, groups: Vec<&'a Group>, memberships: &Memberships) -> Vec<&'a Group> {
    let by_id = memberships.by_id();
    let search = self.search.trim().to_lowercase();

    let mut result: Vec<&Group> = groups
      .into_iter()
      .filter(|group| {
        self.folder.is_empty()
          || by_id
            .get(&group.id)
            .is_some_and(|m| m.folder == self.folder)
      })
      .filter(|group| search.is_empty() || matches_search(group, &search))
      .filter(|group| self.access.matches(group))
      .collect();

    match self.sort {
      Some(SortOrder::Newest) | Some(SortOrder::Oldest) => {
        let position: HashMap<u64, usize> = memberships
          .ids()
          .enumerate()
          .map(|(index, id)| (id, index))
          .collect();
        result.sort_by_key(|group| position.get(&group.id).copied().unwrap_or(usize::MAX));
        if self.sort == Some(SortOrder::Newest) {
          result.reverse();
        }
      }
      Some(SortOrder::Random) => result.shuffle(&mut rand::thread_rng()),
      None => {}
    }

    result
  }
}

/// `search` must already be lowercased.
fn matches_search(group: &Group, search: &str) -> bool {
  group.name.to_lowercase().contains(search)
    || group.screen_name.to_lowercase().contains(search)
    || group.id.to_string() == search
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vk::fake::group;

  fn fixture() -> (Vec<Group>, Memberships) {
    let mut closed = group(2, "Closed Club");
    closed.is_closed = 1;
    let mut member_closed = group(3, "Secret Cats");
    member_closed.is_closed = 2;
    member_closed.is_member = 1;

    let groups = vec![group(1, "Open Cats"), closed, member_closed];
    let mut memberships = Memberships::new();
    memberships.upsert(3, "pets");
    memberships.upsert(1, "pets");
    memberships.upsert(2, "work");
    (groups, memberships)
  }

  fn ids(groups: &[&Group]) -> Vec<u64> {
    groups.iter().map(|g| g.id).collect()
  }

  fn state() -> FilterState {
    FilterState {
      sort: None,
      ..Default::default()
    }
  }

  #[test]
  fn test_folder_and_search() {
    let (groups, memberships) = fixture();

    let filter = FilterState {
      folder: "pets".to_string(),
      ..state()
    };
    assert_eq!(ids(&filter.apply(groups.iter().collect(), &memberships)), vec![1, 3]);

    let filter = FilterState {
      search: "  CATS ".to_string(),
      ..state()
    };
    assert_eq!(ids(&filter.apply(groups.iter().collect(), &memberships)), vec![1, 3]);

    let filter = FilterState {
      search: "2".to_string(),
      ..state()
    };
    assert_eq!(ids(&filter.apply(groups.iter().collect(), &memberships)), vec![2]);
  }

  #[test]
  fn test_access_filters() {
    let (groups, memberships) = fixture();
    let run = |access| {
      let filter = FilterState { access, ..state() };
      ids(&filter.apply(groups.iter().collect(), &memberships))
    };

    assert_eq!(run(AccessFilter::None), vec![1, 2, 3]);
    assert_eq!(run(AccessFilter::Access), vec![1, 3]);
    assert_eq!(run(AccessFilter::NoAccess), vec![2]);
    assert_eq!(run(AccessFilter::Open), vec![1]);
    assert_eq!(run(AccessFilter::Close), vec![2, 3]);
  }

  #[test]
  fn test_sort_by_membership_order() {
    let (groups, memberships) = fixture();

    let newest = FilterState::default();
    assert_eq!(ids(&newest.apply(groups.iter().collect(), &memberships)), vec![2, 1, 3]);

    let oldest = FilterState {
      sort: Some(SortOrder::Oldest),
      ..state()
    };
    assert_eq!(ids(&oldest.apply(groups.iter().collect(), &memberships)), vec![3, 1, 2]);

    let random = FilterState {
      sort: Some(SortOrder::Random),
      ..state()
    };
    let mut shuffled = ids(&random.apply(groups.iter().collect(), &memberships));
    shuffled.sort();
    assert_eq!(shuffled, vec![1, 2, 3]);
  }

  #[test]
  fn test_parse_names() {
    assert_eq!("noAccess".parse::<AccessFilter>().unwrap(), AccessFilter::NoAccess);
    assert_eq!("Random".parse::<SortOrder>().unwrap(), SortOrder::Random);
    assert!("sideways".parse::<SortOrder>().is_err());
  }
}
