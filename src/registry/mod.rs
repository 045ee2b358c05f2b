//! The group registry: the user's foldered group collection and everything
//! derived from it.
//!
//! The registry owns
//! - the canonical, insertion-ordered memberships (group id + folder)
//! - the groups resolved from the remote directory
//! - the TTL cache of per-group counters and the list filters
//! - the stored behavior profile ([`GroupsConfig`])
//!
//! Collaborators are injected: a storage facade for memberships and config,
//! a local store for the derived view state, and an optional remote
//! directory. Without a remote directory the registry works offline and all
//! network-backed operations degrade to no-ops.
//!
//! Mutations never write to storage directly. They emit [`RegistryEvent`]s
//! which [`crate::persist::AutoSaver`] turns into debounced writes.

mod filters;
mod group_map;
mod groups_config;
mod loading;
mod memberships;
mod snapshot;

pub use filters::{AccessFilter, FilterState, SortOrder};
pub use group_map::GroupMap;
pub use groups_config::GroupsConfig;
pub use loading::LoadingCounter;
pub use memberships::{LocalMembership, Memberships};
pub use snapshot::{FolderGroups, GroupsExport, BACKUP_FILE_NAME};

use color_eyre::{eyre::eyre, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;

use crate::cache::{CachedGroupData, TtlCache};
use crate::event::{EventSender, RegistryEvent};
use crate::persist::{self, CACHE_KEY, CONFIG_KEY, FILTERS_KEY, GROUPS_KEY};
use crate::storage::KeyValueStore;
use crate::vk::{Counters, Group, GroupRef, RemoteDirectory};

/// Lifecycle of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
  Uninitialized,
  Initializing,
  Ready,
}

pub struct GroupRegistry {
  state: watch::Sender<RegistryState>,
  memberships: Memberships,
  groups: GroupMap,
  cache: TtlCache,
  filters: FilterState,
  config: GroupsConfig,
  storage: Arc<dyn KeyValueStore>,
  local: Arc<dyn KeyValueStore>,
  remote: Option<Arc<dyn RemoteDirectory>>,
  loading: LoadingCounter,
  events: Option<EventSender>,
}

impl GroupRegistry {
  pub fn new(
    storage: Arc<dyn KeyValueStore>,
    local: Arc<dyn KeyValueStore>,
    remote: Option<Arc<dyn RemoteDirectory>>,
  ) -> Self {
    let (state, _) = watch::channel(RegistryState::Uninitialized);

    Self {
      state,
      memberships: Memberships::new(),
      groups: GroupMap::new(),
      cache: TtlCache::new(),
      filters: FilterState::default(),
      config: GroupsConfig::default(),
      storage,
      local,
      remote,
      loading: LoadingCounter::new(),
      events: None,
    }
  }

  /// Report mutations on `events`
  pub fn with_events(mut self, events: EventSender) -> Self {
    self.events = Some(events);
    self
  }

  /// Share a loading indicator with other components
  pub fn with_loading(mut self, loading: LoadingCounter) -> Self {
    self.loading = loading;
    self
  }

  // ==========================================================================
  // Lifecycle
  // ==========================================================================

  /// Load config, memberships and view state, then resolve missing groups.
  ///
  /// A failing step is logged and skipped; the registry always ends up
  /// `Ready`.
  pub async fn init(&mut self) {
    self.state.send_replace(RegistryState::Initializing);

    if let Err(e) = self.load_config().await {
      tracing::error!("init groups: loading config failed: {:#}", e);
    }
    if let Err(e) = self.load_memberships().await {
      tracing::error!("init groups: loading groups failed: {:#}", e);
    }
    if let Err(e) = self.restore_view_state().await {
      tracing::error!("init groups: restoring view state failed: {:#}", e);
    }
    if let Err(e) = self.resolve_missing().await {
      tracing::error!("init groups: resolving groups failed: {:#}", e);
    }

    self.state.send_replace(RegistryState::Ready);
    if self.config.diagnostics_enabled() {
      self.emit(RegistryEvent::DiagnosticsToggled(true));
    }

    tracing::info!(
      memberships = self.memberships.len(),
      resolved = self.groups.len(),
      "groups registry initialized"
    );
  }

  pub fn state(&self) -> RegistryState {
    *self.state.borrow()
  }

  pub fn is_ready(&self) -> bool {
    self.state() == RegistryState::Ready
  }

  /// Watch lifecycle transitions
  #[cfg(test)]
  pub fn subscribe(&self) -> watch::Receiver<RegistryState> {
    self.state.subscribe()
  }

  pub fn is_loading(&self) -> bool {
    self.loading.is_loading()
  }

  pub fn has_remote(&self) -> bool {
    self.remote.is_some()
  }

  // ==========================================================================
  // Memberships
  // ==========================================================================

  /// Track `id` in `folder`. Re-adding an id moves it to the end.
  pub fn add_membership(&mut self, id: u64, folder: &str) {
    self.memberships.upsert(id, folder);
    self.memberships_changed();
  }

  pub fn remove_membership(&mut self, id: u64) {
    if self.memberships.remove(id) {
      self.memberships_changed();
    }
  }

  pub fn remove_memberships(&mut self, ids: &HashSet<u64>) {
    if self.memberships.remove_many(ids) > 0 {
      self.memberships_changed();
    }
  }

  pub fn clear_memberships(&mut self) {
    self.memberships.clear();
    self.memberships_changed();
  }

  fn memberships_changed(&mut self) {
    if self.is_ready() && self.config.auto_save {
      self.emit(RegistryEvent::MembershipsChanged(
        self.memberships.to_folder_groups(),
      ));
    }
  }

  // ==========================================================================
  // Resolution
  // ==========================================================================

  /// Resolve every membership that has no group yet, in one batched call.
  ///
  /// Returns how many groups were resolved. Without a remote directory, or
  /// with nothing missing, no call is made.
  pub async fn resolve_missing(&mut self) -> Result<usize> {
    let missing: Vec<GroupRef> = self
      .memberships
      .ids()
      .filter(|id| !self.groups.contains(*id))
      .map(GroupRef::Id)
      .collect();

    let Some(remote) = self.remote.clone() else {
      return Ok(0);
    };
    if missing.is_empty() {
      return Ok(0);
    }

    tracing::debug!(count = missing.len(), "resolving missing groups");
    let _loading = self.loading.start();
    let resolved = remote.groups_by_refs(&missing).await?;

    let count = resolved.len();
    for group in resolved {
      self.groups.insert(group);
    }
    Ok(count)
  }

  /// Resolve user-supplied references to group ids.
  ///
  /// Numeric ids are accepted as-is when offline. Online, every reference
  /// not resolved yet is looked up in one call; references the remote does
  /// not know are skipped with a warning.
  pub async fn resolve_refs(&mut self, refs: &[GroupRef]) -> Result<Vec<u64>> {
    let Some(remote) = self.remote.clone() else {
      return refs
        .iter()
        .map(|r| {
          r.id()
            .ok_or_else(|| eyre!("Cannot resolve {} without an access token", r))
        })
        .collect();
    };

    let unresolved: Vec<GroupRef> = refs
      .iter()
      .filter(|r| r.id().map_or(true, |id| !self.groups.contains(id)))
      .cloned()
      .collect();

    let mut by_screen_name = HashMap::new();
    if !unresolved.is_empty() {
      let _loading = self.loading.start();
      for group in remote.groups_by_refs(&unresolved).await? {
        by_screen_name.insert(group.screen_name.to_lowercase(), group.id);
        self.groups.insert(group);
      }
    }

    let mut ids = Vec::with_capacity(refs.len());
    for r in refs {
      let id = match r {
        GroupRef::Id(id) => Some(*id).filter(|id| self.groups.contains(*id)),
        GroupRef::ScreenName(name) => by_screen_name.get(&name.to_lowercase()).copied(),
      };
      match id {
        Some(id) => ids.push(id),
        None => tracing::warn!("group {} not found", r),
      }
    }
    Ok(ids)
  }

  pub fn get_by_id(&self, id: u64) -> Option<&Group> {
    self.groups.get(id)
  }

  /// Return the resolved group, resolving it on demand.
  pub async fn get_by_id_or_resolve(&mut self, id: u64) -> Result<&Group> {
    if self.groups.contains(id) {
      return self
        .groups
        .get(id)
        .ok_or_else(|| eyre!("Group {} not found", id));
    }

    let remote = self
      .remote
      .clone()
      .ok_or_else(|| eyre!("Cannot load group {} without an access token", id))?;

    let group = {
      let _loading = self.loading.start();
      remote
        .groups_by_refs(&[GroupRef::Id(id)])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| eyre!("Group {} not found", id))?
    };

    let group = self.groups.insert(group);
    Ok(&*group)
  }

  // ==========================================================================
  // Counters
  // ==========================================================================

  /// Make sure the group carries counters.
  ///
  /// Nothing happens for groups that already have counters, for banned
  /// groups, or when offline. Fresh counters come from the TTL cache when
  /// possible; a failed fetch yields empty counters instead of an error.
  pub async fn load_counters(&mut self, id: u64) -> Option<&Group> {
    let needs_counters = {
      let group = self.groups.get(id)?;
      group.counters.is_none() && !group.is_banned()
    };
    if !needs_counters {
      return self.groups.get(id);
    }

    let had_entry = self.cache.contains(id);
    let cached = self.cache.get(id).and_then(|data| data.counters.clone());
    let mut cache_changed = had_entry && !self.cache.contains(id);

    let counters = match cached {
      Some(counters) => Some(counters),
      None => {
        let fetched = self.fetch_counters(id).await;
        if let Some(counters) = &fetched {
          self.cache.put(
            id,
            CachedGroupData {
              counters: Some(counters.clone()),
            },
          );
          cache_changed = true;
        }
        fetched
      }
    };

    if cache_changed {
      self.view_state_changed();
    }

    let group = self.groups.get_mut(id)?;
    if counters.is_some() {
      group.counters = counters;
    }
    Some(&*group)
  }

  async fn fetch_counters(&self, id: u64) -> Option<Counters> {
    let remote = self.remote.as_ref()?;
    let _loading = self.loading.start();

    Some(remote.group_counters(id).await.unwrap_or_else(|e| {
      tracing::warn!(id, "loading counters failed: {:#}", e);
      Counters::default()
    }))
  }

  /// Load counters for every visible group that needs them, one at a time.
  pub async fn load_visible_counters(&mut self) {
    let ids: Vec<u64> = self.visible_groups().iter().map(|g| g.id).collect();
    for id in ids {
      self.load_counters(id).await;
    }
  }

  // ==========================================================================
  // Derived views
  // ==========================================================================

  pub fn memberships(&self) -> &Memberships {
    &self.memberships
  }

  /// Distinct folders in order of first appearance
  pub fn folders(&self) -> Vec<&str> {
    self.memberships.folders()
  }

  /// Resolved groups that still have a membership, in resolution order
  pub fn visible_groups(&self) -> Vec<&Group> {
    let tracked: HashSet<u64> = self.memberships.ids().collect();
    self
      .groups
      .iter()
      .filter(|group| tracked.contains(&group.id))
      .collect()
  }

  pub fn visible_groups_reversed(&self) -> Vec<&Group> {
    let mut groups = self.visible_groups();
    groups.reverse();
    groups
  }

  pub fn memberships_by_id(&self) -> HashMap<u64, &LocalMembership> {
    self.memberships.by_id()
  }

  pub fn group_ids_by_folder(&self) -> FolderGroups {
    self.memberships.to_folder_groups()
  }

  /// Visible groups after applying the current filters and display order
  pub fn filtered_groups(&self) -> Vec<&Group> {
    let reverse = self.config.reverse_order.unwrap_or(false);
    let visible = if reverse {
      self.visible_groups_reversed()
    } else {
      self.visible_groups()
    };

    let mut groups = self.filters.apply(visible, &self.memberships);
    // Sorting discards the input order
    if reverse && self.filters.sort.is_some() {
      groups.reverse();
    }
    groups
  }

  pub fn filters(&self) -> &FilterState {
    &self.filters
  }

  pub fn set_filters(&mut self, filters: FilterState) {
    if self.filters != filters {
      self.filters = filters;
      self.view_state_changed();
    }
  }

  #[cfg(test)]
  pub fn cache(&self) -> &TtlCache {
    &self.cache
  }

  fn view_state_changed(&self) {
    self.emit(RegistryEvent::ViewStateChanged {
      cache: self.cache.clone(),
      filters: self.filters.clone(),
    });
  }

  // ==========================================================================
  // Import / export
  // ==========================================================================

  pub fn export_snapshot(&self) -> GroupsExport {
    GroupsExport {
      group_ids_by_folder: self.group_ids_by_folder(),
    }
  }

  /// Merge a backup into the memberships. Existing memberships that are not
  /// in the backup are left untouched.
  pub fn import_snapshot(&mut self, snapshot: &GroupsExport) {
    for (folder, id) in snapshot.group_ids_by_folder.pairs() {
      self.memberships.upsert(id, folder);
    }
    self.memberships_changed();
  }

  // ==========================================================================
  // Persistence
  // ==========================================================================

  /// Write the memberships to storage now.
  pub async fn save_memberships(&self) -> Result<()> {
    let _loading = self.loading.start();
    persist::store_memberships(self.storage.as_ref(), &self.group_ids_by_folder()).await
  }

  /// Replace the memberships with the stored ones.
  ///
  /// Missing or malformed stored data yields an empty collection.
  pub async fn load_memberships(&mut self) -> Result<()> {
    let stored = self.storage.get_one(GROUPS_KEY).await?;
    let dump = stored
      .as_deref()
      .map(FolderGroups::parse_lenient)
      .unwrap_or_default();

    self.memberships = Memberships::from_folder_groups(&dump);
    tracing::debug!(count = self.memberships.len(), "groups loaded");
    Ok(())
  }

  pub fn config(&self) -> &GroupsConfig {
    &self.config
  }

  /// Change the profile. Once ready, changes are saved and a flipped
  /// diagnostics flag is reported.
  pub fn update_config(&mut self, update: impl FnOnce(&mut GroupsConfig)) {
    let before = self.config.clone();
    update(&mut self.config);

    if !self.is_ready() || before == self.config {
      return;
    }
    self.emit(RegistryEvent::ConfigChanged(self.config.clone()));
    if before.diagnostics_enabled() != self.config.diagnostics_enabled() {
      self.emit(RegistryEvent::DiagnosticsToggled(
        self.config.diagnostics_enabled(),
      ));
    }
  }

  pub async fn save_config(&self) -> Result<()> {
    persist::store_config(self.storage.as_ref(), &self.config).await
  }

  /// Load the stored profile. Returns whether it was valid and applied.
  pub async fn load_config(&mut self) -> Result<bool> {
    let stored = self.storage.get_one(CONFIG_KEY).await?;

    match stored.as_deref().and_then(GroupsConfig::parse_stored) {
      Some(config) => {
        self.config = config;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  /// Restore the counters cache and filters from the local store.
  async fn restore_view_state(&mut self) -> Result<()> {
    let mut stored = self.local.get(&[CACHE_KEY, FILTERS_KEY]).await?;

    if let Some(raw) = stored.remove(CACHE_KEY) {
      match serde_json::from_str(&raw) {
        Ok(cache) => self.cache = cache,
        Err(e) => tracing::warn!("ignoring stored counters cache: {}", e),
      }
    }
    if let Some(raw) = stored.remove(FILTERS_KEY) {
      match serde_json::from_str(&raw) {
        Ok(filters) => self.filters = filters,
        Err(e) => tracing::warn!("ignoring stored filters: {}", e),
      }
    }
    Ok(())
  }

  fn emit(&self, event: RegistryEvent) {
    if let Some(events) = &self.events {
      if events.send(event).is_err() {
        tracing::debug!("registry event dropped, no observer");
      }
    }
  }
}
