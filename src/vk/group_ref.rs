//! Parsing of user-supplied group references (ids, club links, screen names).

use color_eyre::{eyre::eyre, Report, Result};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Something that identifies a group: a numeric id or a screen name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupRef {
  Id(u64),
  ScreenName(String),
}

impl GroupRef {
  pub fn id(&self) -> Option<u64> {
    match self {
      GroupRef::Id(id) => Some(*id),
      GroupRef::ScreenName(_) => None,
    }
  }
}

impl fmt::Display for GroupRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GroupRef::Id(id) => write!(f, "{}", id),
      GroupRef::ScreenName(name) => write!(f, "{}", name),
    }
  }
}

impl From<u64> for GroupRef {
  fn from(id: u64) -> Self {
    GroupRef::Id(id)
  }
}

impl FromStr for GroupRef {
  type Err = Report;

  /// Accepts `123`, `-123`, `club123`, `public123`, `event123`, `@name`,
  /// `vk.com/name` and full `https://vk.com/name` links.
  fn from_str(input: &str) -> Result<Self> {
    let token = last_path_token(input.trim())?;

    if let Some(digits) = numeric_part(&token) {
      return digits
        .parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .map(GroupRef::Id)
        .ok_or_else(|| eyre!("Invalid group id: {}", input));
    }

    if token
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
      Ok(GroupRef::ScreenName(token))
    } else {
      Err(eyre!("Not a group id or link: {}", input))
    }
  }
}

/// Reduce a link to the part that names the group.
fn last_path_token(input: &str) -> Result<String> {
  let token = if input.contains("://") {
    let url = Url::parse(input).map_err(|e| eyre!("Invalid link {}: {}", input, e))?;
    url
      .path_segments()
      .and_then(|mut segments| segments.find(|s| !s.is_empty()))
      .map(String::from)
      .unwrap_or_default()
  } else {
    let without_host = ["vk.com/", "m.vk.com/", "www.vk.com/", "vk.ru/"]
      .iter()
      .find_map(|host| input.strip_prefix(host))
      .unwrap_or(input);
    let without_at = without_host.strip_prefix('@').unwrap_or(without_host);
    without_at
      .split(['/', '?', '#'])
      .next()
      .unwrap_or_default()
      .to_string()
  };

  if token.is_empty() {
    return Err(eyre!("No group reference in {:?}", input));
  }
  Ok(token)
}

/// The digit run of `123`, `-123`, `club123`, `public123` or `event123`.
fn numeric_part(token: &str) -> Option<&str> {
  let digits = ["club", "public", "event", "-"]
    .iter()
    .find_map(|prefix| token.strip_prefix(prefix))
    .unwrap_or(token);

  (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(s: &str) -> GroupRef {
    s.parse().unwrap()
  }

  #[test]
  fn test_numeric_forms() {
    assert_eq!(parse("123"), GroupRef::Id(123));
    assert_eq!(parse("-123"), GroupRef::Id(123));
    assert_eq!(parse("club123"), GroupRef::Id(123));
    assert_eq!(parse("public7"), GroupRef::Id(7));
    assert_eq!(parse("event99"), GroupRef::Id(99));
  }

  #[test]
  fn test_links() {
    assert_eq!(parse("https://vk.com/club55"), GroupRef::Id(55));
    assert_eq!(
      parse("https://vk.com/apiclub?w=wall"),
      GroupRef::ScreenName("apiclub".to_string())
    );
    assert_eq!(
      parse("vk.com/apiclub/"),
      GroupRef::ScreenName("apiclub".to_string())
    );
    assert_eq!(parse("@cats"), GroupRef::ScreenName("cats".to_string()));
  }

  #[test]
  fn test_clubname_is_screen_name() {
    // Only digits after the prefix make it an id
    assert_eq!(parse("clubhouse"), GroupRef::ScreenName("clubhouse".to_string()));
  }

  #[test]
  fn test_rejects_garbage() {
    assert!("".parse::<GroupRef>().is_err());
    assert!("https://vk.com/".parse::<GroupRef>().is_err());
    assert!("not a link".parse::<GroupRef>().is_err());
    assert!("0".parse::<GroupRef>().is_err());
  }
}
