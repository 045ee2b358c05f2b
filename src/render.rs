//! Plain-text rendering of groups and albums for the command line.

use crate::registry::LocalMembership;
use crate::vk::{Album, Counters, Group};

const NAME_WIDTH: usize = 40;
const FOLDER_WIDTH: usize = 16;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Short access label of a group
pub fn access_label(group: &Group) -> &'static str {
  if group.is_banned() {
    "banned"
  } else if group.is_open() {
    "open"
  } else if group.has_access() {
    "member"
  } else {
    "closed"
  }
}

pub fn counters_summary(counters: &Counters) -> String {
  counters
    .0
    .iter()
    .filter(|(_, count)| **count > 0)
    .map(|(name, count)| format!("{} {}", name, count))
    .collect::<Vec<_>>()
    .join(", ")
}

/// One line of the group list
pub fn group_row(group: &Group, membership: Option<&LocalMembership>, show_counters: bool) -> String {
  let folder = membership.map(|m| m.folder.as_str()).unwrap_or("-");
  let mut row = format!(
    "{:>10}  {:<folder_width$}  {:<name_width$}  {:<6}",
    group.id,
    truncate(folder, FOLDER_WIDTH),
    truncate(&group.name, NAME_WIDTH),
    access_label(group),
    folder_width = FOLDER_WIDTH,
    name_width = NAME_WIDTH,
  );

  if show_counters {
    if let Some(counters) = &group.counters {
      row.push_str("  ");
      row.push_str(&counters_summary(counters));
    }
  }
  row.trim_end().to_string()
}

pub fn album_row(album: &Album) -> String {
  format!(
    "{:>10}  {:<name_width$}  {:>6}",
    album.id,
    truncate(&album.title, NAME_WIDTH),
    album.size,
    name_width = NAME_WIDTH,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vk::fake::group;
  use std::collections::BTreeMap;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("привет мир", 8), "приве...");
  }

  #[test]
  fn test_access_label() {
    let mut g = group(1, "g");
    assert_eq!(access_label(&g), "open");
    g.is_closed = 1;
    assert_eq!(access_label(&g), "closed");
    g.is_member = 1;
    assert_eq!(access_label(&g), "member");
    g.deactivated = Some("deleted".to_string());
    assert_eq!(access_label(&g), "banned");
  }

  #[test]
  fn test_group_row_with_counters() {
    let mut g = group(42, "Cats");
    g.counters = Some(Counters(BTreeMap::from([
      ("albums".to_string(), 2),
      ("photos".to_string(), 10),
      ("videos".to_string(), 0),
    ])));
    let membership = LocalMembership {
      id: 42,
      folder: "pets".to_string(),
    };

    let row = group_row(&g, Some(&membership), true);
    assert!(row.starts_with("        42  pets"));
    assert!(row.ends_with("albums 2, photos 10"));
    assert!(!group_row(&g, None, false).contains("photos"));
  }
}
