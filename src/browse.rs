//! Paged views over remote listings: the albums of one owner and the groups
//! the current user belongs to.

use color_eyre::{eyre::eyre, Result};
use futures::FutureExt;
use std::sync::Arc;

use crate::loader::IncrementalLoader;
use crate::registry::{GroupRegistry, LoadingCounter};
use crate::vk::{Album, Group, RemoteDirectory};

/// Albums fetched per page
pub const ALBUMS_BATCH: usize = 200;
/// User groups fetched per page
pub const DISCOVER_BATCH: usize = 100;

/// Service albums every owner has, listed ahead of the regular ones.
///
/// "Saved photos" only exists for users (positive owner ids).
pub fn service_albums(owner_id: i64) -> Vec<Album> {
  let mut albums = vec![
    (-6, "Profile photos"),
    (-7, "Wall photos"),
  ];
  if owner_id > 0 {
    albums.push((-15, "Saved photos"));
  }

  albums
    .into_iter()
    .map(|(id, title)| Album {
      id,
      owner_id,
      title: title.to_string(),
      size: 0,
      thumb_src: None,
      description: None,
    })
    .collect()
}

// ============================================================================
// Albums
// ============================================================================

/// Album listing of one user or group
pub struct AlbumsView {
  loader: IncrementalLoader<i64, Album>,
  group: Option<Group>,
  initialized: bool,
}

impl AlbumsView {
  pub fn new(remote: Arc<dyn RemoteDirectory>) -> Self {
    let loader = IncrementalLoader::new(0, ALBUMS_BATCH, move |owner, offset, count| {
      let remote = remote.clone();
      async move { remote.albums(owner, offset, count).await }.boxed()
    });

    Self {
      loader,
      group: None,
      initialized: false,
    }
  }

  pub fn with_loading(mut self, loading: LoadingCounter) -> Self {
    self.loader = self.loader.with_loading(loading);
    self
  }

  /// Switch to `owner_id` and start loading its first page.
  ///
  /// For groups (negative ids) the owning group is looked up through the
  /// registry first; failing to find it does not stop the album listing.
  pub async fn open(&mut self, owner_id: i64, registry: &mut GroupRegistry) {
    self.loader.set_key(owner_id);
    self.loader.set_static(service_albums(owner_id));
    self.group = None;
    self.initialized = false;

    if owner_id < 0 {
      match registry.get_by_id_or_resolve(owner_id.unsigned_abs()).await {
        Ok(group) => self.group = Some(group.clone()),
        Err(e) => tracing::debug!(owner_id, "owner group not available: {:#}", e),
      }
    }

    self.loader.grow();
  }

  pub fn owner_id(&self) -> i64 {
    *self.loader.key()
  }

  pub fn albums(&self) -> &[Album] {
    self.loader.items()
  }

  /// Owning group, when the owner is a group and could be resolved
  pub fn group(&self) -> Option<&Group> {
    self.group.as_ref()
  }

  /// True once the first page has settled, successfully or not
  pub fn is_initialized(&self) -> bool {
    self.initialized
  }

  pub fn error(&self) -> Option<&str> {
    self.loader.error()
  }

  pub fn has_more(&self) -> bool {
    self.loader.has_more()
  }

  pub fn on_range_change(&mut self, start: usize, end: usize) {
    self.loader.on_range_change(start, end);
  }

  pub async fn wait(&mut self) -> bool {
    let changed = self.loader.wait().await;
    self.initialized |= changed;
    changed
  }
}

// ============================================================================
// Discover
// ============================================================================

/// Loader over the groups the current user is a member of
pub fn user_groups_loader(remote: Arc<dyn RemoteDirectory>) -> IncrementalLoader<(), Group> {
  IncrementalLoader::new((), DISCOVER_BATCH, move |(), offset, count| {
    let remote = remote.clone();
    async move { remote.user_groups(offset, count).await }.boxed()
  })
}

/// Load up to `limit` of the user's groups, one batch at a time.
pub async fn load_user_groups(
  loader: &mut IncrementalLoader<(), Group>,
  limit: usize,
) -> Result<Vec<Group>> {
  while loader.items().len() < limit && loader.has_more() {
    let before = loader.items().len();
    loader.grow();
    loader.wait().await;

    if let Some(e) = loader.error() {
      return Err(eyre!("Failed to load groups: {}", e));
    }
    if loader.items().len() == before {
      break;
    }
  }

  Ok(loader.items().iter().take(limit).cloned().collect())
}
