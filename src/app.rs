use crate::browse::{self, AlbumsView};
use crate::commands::Command;
use crate::config::Config;
use crate::event;
use crate::logging::Diagnostics;
use crate::persist::AutoSaver;
use crate::registry::{
  AccessFilter, FilterState, GroupRegistry, GroupsExport, LoadingCounter, SortOrder,
  BACKUP_FILE_NAME,
};
use crate::render;
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore};
use crate::vk::{GroupRef, RemoteDirectory, VkClient};
use color_eyre::{eyre::eyre, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Storage namespace of the memberships and the profile
const STORAGE_NAMESPACE: &str = "remote";
/// Storage namespace of the derived view state
const LOCAL_NAMESPACE: &str = "local";

/// Main application state
pub struct App {
  registry: GroupRegistry,
  remote: Option<Arc<dyn RemoteDirectory>>,
  loading: LoadingCounter,
  saver: JoinHandle<()>,
}

impl App {
  pub async fn new(config: &Config, diagnostics: Option<Diagnostics>) -> Result<Self> {
    let (storage, local) = open_stores(config);

    let remote: Option<Arc<dyn RemoteDirectory>> = match VkClient::new(&config.api) {
      Ok(client) => Some(Arc::new(client)),
      Err(e) => {
        tracing::info!("running offline: {}", e);
        None
      }
    };

    let loading = LoadingCounter::new();
    let (tx, rx) = event::channel();
    let saver = AutoSaver::new(storage.clone(), local.clone())
      .with_debounce(config.autosave_debounce())
      .on_diagnostics(move |enabled| {
        if let Some(diagnostics) = &diagnostics {
          if let Err(e) = diagnostics.set_enabled(enabled) {
            tracing::warn!("{:#}", e);
          }
        }
      })
      .spawn(rx);

    let mut registry = GroupRegistry::new(storage, local, remote.clone())
      .with_events(tx)
      .with_loading(loading.clone());
    registry.init().await;

    Ok(Self {
      registry,
      remote,
      loading,
      saver,
    })
  }

  /// Execute `command`, then wait for pending writes.
  pub async fn run(mut self, command: Command) -> Result<()> {
    let result = self.execute(command).await;
    if self.registry.is_loading() {
      tracing::debug!("command finished with loads in flight");
    }

    // Dropping the registry closes the event channel; the saver flushes and exits
    let Self { registry, saver, .. } = self;
    drop(registry);
    if let Err(e) = saver.await {
      tracing::error!("auto-save task failed: {}", e);
    }

    result
  }

  async fn execute(&mut self, command: Command) -> Result<()> {
    match command {
      Command::List {
        folder,
        search,
        access,
        sort,
        no_counters,
      } => self.list(folder, search, access, sort, no_counters).await,
      Command::Folders => {
        self.folders();
        Ok(())
      }
      Command::Add { folder, groups } => self.add(&folder, &groups).await,
      Command::Remove { groups } => self.remove(&groups).await,
      Command::Move { folder, groups } => self.move_to(&folder, &groups).await,
      Command::Clear { yes } => self.clear(yes),
      Command::Save => {
        self.registry.save_memberships().await?;
        self.registry.save_config().await?;
        println!("saved {} groups", self.registry.memberships().len());
        Ok(())
      }
      Command::Export { path } => self.export(path).await,
      Command::Import { path } => self.import(&path).await,
      Command::Counters { group } => self.counters(&group).await,
      Command::Albums { owner, limit } => self.albums(owner, limit).await,
      Command::Discover { limit, add } => self.discover(limit, add).await,
      Command::Config {
        auto_save,
        show_counters,
        diagnostics,
        original_size_photo,
        reverse_order,
      } => {
        self.registry.update_config(|config| {
          if let Some(v) = auto_save {
            config.auto_save = v;
          }
          if let Some(v) = show_counters {
            config.show_counters = v;
          }
          if let Some(v) = diagnostics {
            config.eruda = Some(v);
          }
          if let Some(v) = original_size_photo {
            config.original_size_photo = Some(v);
          }
          if let Some(v) = reverse_order {
            config.reverse_order = Some(v);
          }
        });
        let json = serde_json::to_string_pretty(self.registry.config())
          .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        println!("{}", json);
        Ok(())
      }
    }
  }

  fn remote(&self) -> Result<Arc<dyn RemoteDirectory>> {
    self
      .remote
      .clone()
      .ok_or_else(|| eyre!("This command needs an access token. Set XG_VK_TOKEN."))
  }

  async fn resolve(&mut self, inputs: &[String]) -> Result<Vec<u64>> {
    let refs = inputs
      .iter()
      .map(|input| input.parse::<GroupRef>())
      .collect::<Result<Vec<_>>>()?;
    self.registry.resolve_refs(&refs).await
  }

  /// Like `resolve`, but numeric ids are taken as-is so groups the remote
  /// no longer returns can still be untracked.
  async fn tracked_ids(&mut self, inputs: &[String]) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    let mut names = Vec::new();
    for input in inputs {
      match input.parse::<GroupRef>()? {
        GroupRef::Id(id) => ids.push(id),
        name => names.push(name),
      }
    }
    if !names.is_empty() {
      ids.extend(self.registry.resolve_refs(&names).await?);
    }
    Ok(ids)
  }

  // ==========================================================================
  // Memberships
  // ==========================================================================

  async fn list(
    &mut self,
    folder: Option<String>,
    search: Option<String>,
    access: Option<String>,
    sort: Option<String>,
    no_counters: bool,
  ) -> Result<()> {
    if self.registry.memberships().is_empty() {
      println!("no groups tracked");
      return Ok(());
    }

    let current = self.registry.filters().clone();
    let filters = FilterState {
      folder: folder.unwrap_or(current.folder),
      search: search.unwrap_or(current.search),
      access: access.map(|a| a.parse::<AccessFilter>()).transpose()?.unwrap_or(current.access),
      sort: sort.map(|s| s.parse::<SortOrder>()).transpose()?.or(current.sort),
    };
    self.registry.set_filters(filters);

    let show_counters = self.registry.config().show_counters && !no_counters;
    if show_counters && self.registry.has_remote() {
      self.registry.load_visible_counters().await;
    }

    let unresolved = self.registry.memberships().len() - self.registry.visible_groups().len();
    let memberships = self.registry.memberships_by_id();
    for group in self.registry.filtered_groups() {
      println!(
        "{}",
        render::group_row(group, memberships.get(&group.id).copied(), show_counters)
      );
    }
    if unresolved > 0 {
      println!("({} groups not resolved)", unresolved);
    }
    Ok(())
  }

  fn folders(&self) {
    let memberships = self.registry.memberships();
    for folder in self.registry.folders() {
      let count = memberships.iter().filter(|m| m.folder == folder).count();
      println!("{:<24} {}", render::truncate(folder, 24), count);
    }
  }

  async fn add(&mut self, folder: &str, inputs: &[String]) -> Result<()> {
    let ids = self.resolve(inputs).await?;
    for id in &ids {
      self.registry.add_membership(*id, folder);
    }
    println!("added {} groups to {}", ids.len(), folder);
    Ok(())
  }

  async fn remove(&mut self, inputs: &[String]) -> Result<()> {
    let ids: HashSet<u64> = self.tracked_ids(inputs).await?.into_iter().collect();
    for id in &ids {
      if let Some(group) = self.registry.get_by_id(*id) {
        tracing::info!(id, name = %group.name, "untracking group");
      }
    }
    let before = self.registry.memberships().len();
    self.registry.remove_memberships(&ids);
    println!("removed {} groups", before - self.registry.memberships().len());
    Ok(())
  }

  async fn move_to(&mut self, folder: &str, inputs: &[String]) -> Result<()> {
    let mut moved = 0;
    for id in self.tracked_ids(inputs).await? {
      if self.registry.memberships().contains(id) {
        self.registry.remove_membership(id);
        self.registry.add_membership(id, folder);
        moved += 1;
      } else {
        tracing::warn!(id, "group is not tracked, not moving");
      }
    }
    println!("moved {} groups to {}", moved, folder);
    Ok(())
  }

  fn clear(&mut self, yes: bool) -> Result<()> {
    if !yes {
      return Err(eyre!("Refusing to remove every group without --yes"));
    }
    self.registry.clear_memberships();
    println!("cleared");
    Ok(())
  }

  // ==========================================================================
  // Backup
  // ==========================================================================

  async fn export(&self, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(BACKUP_FILE_NAME));
    let json = serde_json::to_string_pretty(&self.registry.export_snapshot())
      .map_err(|e| eyre!("Failed to serialize backup: {}", e))?;

    tokio::fs::write(&path, json)
      .await
      .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
    println!("exported {} groups to {}", self.registry.memberships().len(), path.display());
    Ok(())
  }

  async fn import(&mut self, path: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(path)
      .await
      .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
    let snapshot: GroupsExport = serde_json::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse backup {}: {}", path.display(), e))?;

    self.registry.import_snapshot(&snapshot);
    if let Err(e) = self.registry.resolve_missing().await {
      tracing::warn!("resolving imported groups failed: {:#}", e);
    }
    println!("imported, now tracking {} groups", self.registry.memberships().len());
    Ok(())
  }

  // ==========================================================================
  // Remote listings
  // ==========================================================================

  async fn counters(&mut self, input: &str) -> Result<()> {
    let id = self
      .resolve(&[input.to_string()])
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| eyre!("Group {} not found", input))?;

    let original_size = self.registry.config().original_size_photo.unwrap_or(false);
    let membership = self.registry.memberships_by_id().get(&id).map(|m| (*m).clone());
    self.registry.get_by_id_or_resolve(id).await?;
    let group = self
      .registry
      .load_counters(id)
      .await
      .ok_or_else(|| eyre!("Group {} not found", id))?;

    println!("{}", render::group_row(group, membership.as_ref(), false));
    if let Some(photo) = group.photo(original_size) {
      println!("photo: {}", photo);
    }
    match &group.counters {
      Some(counters) if !counters.is_empty() => println!("{}", render::counters_summary(counters)),
      _ => println!("no counters"),
    }
    Ok(())
  }

  async fn albums(&mut self, owner: i64, limit: usize) -> Result<()> {
    let mut view = AlbumsView::new(self.remote()?).with_loading(self.loading.clone());
    view.open(owner, &mut self.registry).await;
    view.wait().await;
    if !view.is_initialized() {
      tracing::warn!(owner, "album listing did not settle");
    }

    while view.albums().len() < limit && view.has_more() && view.error().is_none() {
      let before = view.albums().len();
      view.on_range_change(0, before.saturating_sub(1));
      view.wait().await;
      if view.albums().len() == before {
        break;
      }
    }

    match view.group() {
      Some(group) => println!("{} ({})", group.name, group.id),
      None => println!("owner {}", view.owner_id()),
    }
    if let Some(e) = view.error() {
      return Err(eyre!("Failed to load albums: {}", e));
    }
    for album in view.albums().iter().take(limit) {
      println!("{}", render::album_row(album));
    }
    Ok(())
  }

  async fn discover(&mut self, limit: usize, add: Option<String>) -> Result<()> {
    let mut loader = browse::user_groups_loader(self.remote()?).with_loading(self.loading.clone());
    let groups = browse::load_user_groups(&mut loader, limit).await?;

    let mut added = 0;
    for group in &groups {
      let tracked = self.registry.memberships().contains(group.id);
      let membership = self.registry.memberships_by_id().get(&group.id).map(|m| (*m).clone());
      println!("{}", render::group_row(group, membership.as_ref(), false));

      if let (Some(folder), false) = (&add, tracked) {
        self.registry.add_membership(group.id, folder);
        added += 1;
      }
    }

    if add.is_some() {
      self.registry.resolve_missing().await?;
      println!("added {} groups", added);
    }
    Ok(())
  }
}

/// Open the two SQLite-backed stores, falling back to memory.
fn open_stores(config: &Config) -> (Arc<dyn KeyValueStore>, Arc<dyn KeyValueStore>) {
  let opened = config.storage_path().and_then(|path| {
    let storage = SqliteStore::open(&path, STORAGE_NAMESPACE)?;
    let local = SqliteStore::open(&path, LOCAL_NAMESPACE)?;
    Ok((storage, local))
  });

  match opened {
    Ok((storage, local)) => (Arc::new(storage), Arc::new(local)),
    Err(e) => {
      tracing::error!("storage unavailable, changes will not persist: {:#}", e);
      (Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }
  }
}
