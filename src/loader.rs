//! Incremental paginated loading of a large remote listing.
//!
//! An [`IncrementalLoader`] grows a window over a remote collection one batch
//! at a time. The consumer reports which rows it is showing through
//! [`IncrementalLoader::on_range_change`]; once the visible end gets within a
//! third of a batch of the current target, the target grows by one batch and
//! a page is fetched.
//!
//! Fetches run on tokio and report back over a channel; call
//! [`IncrementalLoader::wait`] to block until the pending page arrives.
//!
//! ```ignore
//! let remote = directory.clone();
//! let mut albums = IncrementalLoader::new(owner_id, 200, move |owner, offset, count| {
//!   let remote = remote.clone();
//!   async move { remote.albums(owner, offset, count).await }.boxed()
//! });
//! albums.set_static(service_albums(owner_id));
//!
//! albums.on_range_change(0, 0);
//! albums.wait().await;
//! ```

use color_eyre::Result;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::registry::LoadingCounter;
use crate::vk::Page;

/// Whether a page is being fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
  Idle,
  Loading,
}

type FetcherFn<K, T> = Box<dyn Fn(K, usize, usize) -> BoxFuture<'static, Result<Page<T>>> + Send + Sync>;

/// A fetched page, tagged with what it was fetched for
struct Loaded<K, T> {
  key: K,
  generation: u64,
  result: Result<Page<T>, String>,
}

pub struct IncrementalLoader<K, T> {
  key: K,
  generation: u64,
  batch_size: usize,
  static_items: Vec<T>,
  items: Vec<T>,
  target: usize,
  total: Option<usize>,
  state: LoadState,
  error: Option<String>,
  fetcher: FetcherFn<K, T>,
  loading: LoadingCounter,
  tx: mpsc::UnboundedSender<Loaded<K, T>>,
  rx: mpsc::UnboundedReceiver<Loaded<K, T>>,
}

impl<K, T> IncrementalLoader<K, T>
where
  K: Clone + PartialEq + Send + 'static,
  T: Clone + Send + 'static,
{
  /// Create a loader for `key`.
  ///
  /// `fetcher(key, offset, count)` returns one page of the remote listing.
  /// Nothing is fetched until the target grows.
  pub fn new<F>(key: K, batch_size: usize, fetcher: F) -> Self
  where
    F: Fn(K, usize, usize) -> BoxFuture<'static, Result<Page<T>>> + Send + Sync + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();

    Self {
      key,
      generation: 0,
      batch_size: batch_size.max(1),
      static_items: Vec::new(),
      items: Vec::new(),
      target: 0,
      total: None,
      state: LoadState::Idle,
      error: None,
      fetcher: Box::new(fetcher),
      loading: LoadingCounter::new(),
      tx,
      rx,
    }
  }

  /// Locally known items shown ahead of the remote ones
  #[cfg(test)]
  pub fn with_static(mut self, items: Vec<T>) -> Self {
    self.static_items = items;
    self
  }

  /// Replace the static prefix. Takes effect once the loader is empty again.
  pub fn set_static(&mut self, items: Vec<T>) {
    self.static_items = items;
  }

  pub fn with_loading(mut self, loading: LoadingCounter) -> Self {
    self.loading = loading;
    self
  }

  pub fn key(&self) -> &K {
    &self.key
  }

  /// Loaded items, static prefix first
  pub fn items(&self) -> &[T] {
    &self.items
  }

  #[cfg(test)]
  pub fn target(&self) -> usize {
    self.target
  }

  #[cfg(test)]
  pub fn state(&self) -> LoadState {
    self.state
  }

  #[cfg(test)]
  pub fn is_loading(&self) -> bool {
    self.state == LoadState::Loading
  }

  /// Error of the last failed fetch, cleared by the next success
  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  /// Size of the remote listing as reported by the last page
  #[cfg(test)]
  pub fn total(&self) -> Option<usize> {
    self.total
  }

  fn remote_loaded(&self) -> usize {
    self.items.len().saturating_sub(self.static_items.len())
  }

  /// Whether the remote listing may have more items than are loaded
  pub fn has_more(&self) -> bool {
    self.total.map_or(true, |total| self.remote_loaded() < total)
  }

  /// Visibility callback: rows `start..=end` are on screen.
  pub fn on_range_change(&mut self, _start: usize, end: usize) {
    if end + self.batch_size / 3 < self.target {
      return;
    }
    self.grow();
  }

  /// Ask for one more batch
  pub fn grow(&mut self) {
    self.set_target(self.target + self.batch_size);
  }

  /// Raise the target. Lowering it has no effect; a raise while a page is
  /// loading is recorded but does not start another fetch.
  fn set_target(&mut self, target: usize) {
    if target <= self.target {
      return;
    }
    self.target = target;

    if self.state == LoadState::Loading {
      tracing::debug!(target, "load in flight, not starting another");
      return;
    }
    self.start_load();
  }

  /// Start over for another key. A page still in flight for the old key is
  /// discarded when it arrives.
  pub fn set_key(&mut self, key: K) {
    self.key = key;
    self.reset();
  }

  /// Drop everything loaded and return to `Idle` with a zero target.
  pub fn reset(&mut self) {
    self.generation += 1;
    self.items.clear();
    self.target = 0;
    self.total = None;
    self.state = LoadState::Idle;
    self.error = None;
  }

  /// Wait for the page in flight, if any, and apply it.
  pub async fn wait(&mut self) -> bool {
    while self.state == LoadState::Loading {
      match self.rx.recv().await {
        Some(loaded) => {
          if self.apply(loaded) {
            return true;
          }
        }
        None => return false,
      }
    }
    false
  }

  fn apply(&mut self, loaded: Loaded<K, T>) -> bool {
    if loaded.generation != self.generation || loaded.key != self.key {
      tracing::debug!("discarding page fetched for a previous key");
      return false;
    }

    match loaded.result {
      Ok(page) => {
        self.items.extend(page.items);
        self.total = Some(page.count);
        self.error = None;
      }
      Err(e) => {
        tracing::warn!("page load failed: {}", e);
        if self.remote_loaded() == 0 {
          self.items.clear();
        }
        self.error = Some(e);
      }
    }
    self.state = LoadState::Idle;
    true
  }

  fn start_load(&mut self) {
    if self.items.is_empty() {
      self.items.extend(self.static_items.iter().cloned());
    }

    let offset = self.remote_loaded();
    let count = self.target.saturating_sub(offset);
    if count == 0 || !self.has_more() {
      return;
    }

    self.state = LoadState::Loading;
    tracing::debug!(offset, count, "loading page");

    let key = self.key.clone();
    let generation = self.generation;
    let future = (self.fetcher)(key.clone(), offset, count);
    let guard = self.loading.start();
    let tx = self.tx.clone();

    tokio::spawn(async move {
      let result = future.await.map_err(|e| format!("{:#}", e));
      drop(guard);
      // The loader may be gone already
      let _ = tx.send(Loaded {
        key,
        generation,
        result,
      });
    });
  }
}

impl<K: std::fmt::Debug, T> std::fmt::Debug for IncrementalLoader<K, T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("IncrementalLoader")
      .field("key", &self.key)
      .field("items", &self.items.len())
      .field("target", &self.target)
      .field("state", &self.state)
      .field("error", &self.error)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vk::fake::FakeDirectory;
  use crate::vk::{Album, RemoteDirectory};
  use futures::FutureExt;
  use std::sync::atomic::Ordering;
  use std::sync::Arc;
  use tokio::sync::Semaphore;

  fn static_album(id: i64) -> Album {
    Album {
      id,
      owner_id: -1,
      title: "service".to_string(),
      size: 0,
      thumb_src: None,
      description: None,
    }
  }

  fn loader(remote: Arc<FakeDirectory>, owner: i64) -> IncrementalLoader<i64, Album> {
    IncrementalLoader::new(owner, 200, move |owner, offset, count| {
      let remote = remote.clone();
      async move { remote.albums(owner, offset, count).await }.boxed()
    })
    .with_static(vec![static_album(-7), static_album(-6)])
  }

  #[tokio::test]
  async fn test_first_trigger_loads_static_prefix_and_one_batch() {
    let remote = Arc::new(FakeDirectory::new().with_albums(500));
    let mut albums = loader(remote.clone(), -1);
    assert_eq!(albums.state(), LoadState::Idle);

    albums.on_range_change(0, 0);
    assert!(albums.is_loading());
    assert_eq!(albums.items().len(), 2);

    assert!(albums.wait().await);
    assert_eq!(albums.items().len(), 202);
    assert_eq!(albums.items()[2].id, 1);
    assert_eq!(albums.total(), Some(500));
    assert!(albums.has_more());
  }

  #[tokio::test]
  async fn test_range_far_from_target_does_not_grow() {
    let remote = Arc::new(FakeDirectory::new().with_albums(500));
    let mut albums = loader(remote.clone(), -1);
    albums.grow();
    albums.wait().await;

    albums.on_range_change(0, 100);
    assert_eq!(albums.target(), 200);
    assert!(!albums.is_loading());

    albums.on_range_change(90, 140);
    assert_eq!(albums.target(), 400);
    albums.wait().await;
    assert_eq!(albums.items().len(), 402);
    assert_eq!(FakeDirectory::calls(&remote.album_calls), 2);
  }

  #[tokio::test]
  async fn test_second_trigger_while_loading_does_not_fetch() {
    let gate = Arc::new(Semaphore::new(0));
    let remote = Arc::new(
      FakeDirectory::new()
        .with_albums(500)
        .with_album_gate(gate.clone()),
    );
    let mut albums = loader(remote.clone(), -1);

    albums.on_range_change(0, 0);
    albums.on_range_change(0, 190);
    assert_eq!(albums.target(), 400);

    gate.add_permits(1);
    albums.wait().await;

    assert_eq!(FakeDirectory::calls(&remote.album_calls), 1);
    // The in-flight load only covered the target it started with
    assert_eq!(albums.items().len(), 202);
    assert!(!albums.is_loading());
  }

  #[tokio::test]
  async fn test_failure_before_any_page_rolls_back() {
    let remote = Arc::new(FakeDirectory::new().with_albums(10));
    remote.fail_albums.store(true, Ordering::SeqCst);
    let mut albums = loader(remote.clone(), -1);

    albums.grow();
    albums.wait().await;
    assert!(albums.items().is_empty());
    assert_eq!(albums.error(), Some("albums failed"));

    remote.fail_albums.store(false, Ordering::SeqCst);
    albums.grow();
    albums.wait().await;
    assert_eq!(albums.items().len(), 12);
    assert!(albums.error().is_none());
    assert!(!albums.has_more());
  }

  #[tokio::test]
  async fn test_failure_after_partial_success_keeps_items() {
    let remote = Arc::new(FakeDirectory::new().with_albums(500));
    let mut albums = loader(remote.clone(), -1);
    albums.grow();
    albums.wait().await;

    remote.fail_albums.store(true, Ordering::SeqCst);
    albums.grow();
    albums.wait().await;

    assert_eq!(albums.items().len(), 202);
    assert!(albums.error().is_some());
  }

  #[tokio::test]
  async fn test_page_for_previous_key_is_discarded() {
    let gate = Arc::new(Semaphore::new(0));
    let remote = Arc::new(
      FakeDirectory::new()
        .with_albums(5)
        .with_album_gate(gate.clone()),
    );
    let mut albums = loader(remote.clone(), -1);

    albums.grow();
    albums.set_key(-2);
    assert!(albums.items().is_empty());
    albums.grow();

    gate.add_permits(2);
    albums.wait().await;

    assert_eq!(albums.items().len(), 7);
    assert!(albums.items()[2..].iter().all(|album| album.owner_id == -2));
    assert_eq!(FakeDirectory::calls(&remote.album_calls), 2);
  }

  #[tokio::test]
  async fn test_exhausted_listing_is_not_refetched() {
    let remote = Arc::new(FakeDirectory::new().with_albums(3));
    let mut albums = loader(remote.clone(), -1);
    albums.grow();
    albums.wait().await;

    albums.grow();
    assert!(!albums.is_loading());
    assert_eq!(FakeDirectory::calls(&remote.album_calls), 1);
  }

  #[tokio::test]
  async fn test_loading_indicator_is_held_during_fetch() {
    let gate = Arc::new(Semaphore::new(0));
    let remote = Arc::new(
      FakeDirectory::new()
        .with_albums(5)
        .with_album_gate(gate.clone()),
    );
    let loading = LoadingCounter::new();
    let mut albums = loader(remote, -1).with_loading(loading.clone());

    albums.grow();
    assert!(loading.is_loading());

    gate.add_permits(1);
    albums.wait().await;
    assert!(!loading.is_loading());
  }
}
