use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User-tunable behavior of the registry, kept in the storage facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsConfig {
  pub auto_save: bool,
  pub show_counters: bool,
  /// Verbose diagnostics
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub eruda: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub original_size_photo: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reverse_order: Option<bool>,
}

impl Default for GroupsConfig {
  fn default() -> Self {
    Self {
      auto_save: true,
      show_counters: true,
      eruda: None,
      original_size_photo: None,
      reverse_order: None,
    }
  }
}

impl GroupsConfig {
  /// Parse a stored profile.
  ///
  /// Returns `None` unless `autoSave` and `showCounters` are both booleans;
  /// legacy or corrupt profiles are ignored rather than half-applied. The
  /// optional flags are read leniently and a value of the wrong type counts
  /// as unset.
  pub fn parse_stored(raw: &str) -> Option<Self> {
    let value: Value = match serde_json::from_str(raw) {
      Ok(value) => value,
      Err(e) => {
        tracing::warn!("ignoring stored config: {}", e);
        return None;
      }
    };

    let flag = |key: &str| value.get(key).and_then(Value::as_bool);
    match (flag("autoSave"), flag("showCounters")) {
      (Some(auto_save), Some(show_counters)) => Some(Self {
        auto_save,
        show_counters,
        eruda: flag("eruda"),
        original_size_photo: flag("originalSizePhoto"),
        reverse_order: flag("reverseOrder"),
      }),
      _ => {
        tracing::warn!("ignoring stored config without autoSave and showCounters flags");
        None
      }
    }
  }

  pub fn diagnostics_enabled(&self) -> bool {
    self.eruda.unwrap_or(false)
  }
}
