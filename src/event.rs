use tokio::sync::mpsc;

use crate::cache::TtlCache;
use crate::registry::{FilterState, FolderGroups, GroupsConfig};

/// Changes the registry reports to its observers
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
  /// Memberships changed while auto-save is on
  MembershipsChanged(FolderGroups),
  /// The stored profile changed
  ConfigChanged(GroupsConfig),
  /// The counters cache or the filters changed
  ViewStateChanged { cache: TtlCache, filters: FilterState },
  /// The diagnostics flag flipped (or is on at startup)
  DiagnosticsToggled(bool),
}

pub type EventSender = mpsc::UnboundedSender<RegistryEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<RegistryEvent>;

/// Create the channel connecting a registry to its observers
pub fn channel() -> (EventSender, EventReceiver) {
  mpsc::unbounded_channel()
}
