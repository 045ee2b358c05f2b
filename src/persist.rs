//! Debounced persistence of registry state.
//!
//! The registry never writes to storage on its own after a mutation; it emits
//! a [`RegistryEvent`] instead. [`AutoSaver`] drains those events on a tokio
//! task, keeps only the latest value of each kind, and writes once the
//! channel has been quiet for the debounce period. Bursts of mutations turn
//! into a single write per key.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cache::TtlCache;
use crate::event::{EventReceiver, RegistryEvent};
use crate::registry::{FilterState, FolderGroups, GroupsConfig};
use crate::storage::KeyValueStore;

/// Storage key of the membership dump
pub const GROUPS_KEY: &str = "groups";
/// Storage key of the config profile
pub const CONFIG_KEY: &str = "config";
/// Local key of the counters cache
pub const CACHE_KEY: &str = "cachedGroupsData";
/// Local key of the list filters
pub const FILTERS_KEY: &str = "filters";

pub async fn store_memberships(store: &dyn KeyValueStore, dump: &FolderGroups) -> Result<()> {
  let json =
    serde_json::to_string(dump).map_err(|e| eyre!("Failed to serialize groups: {}", e))?;
  store.set_one(GROUPS_KEY, json).await
}

pub async fn store_config(store: &dyn KeyValueStore, config: &GroupsConfig) -> Result<()> {
  let json =
    serde_json::to_string(config).map_err(|e| eyre!("Failed to serialize config: {}", e))?;
  store.set_one(CONFIG_KEY, json).await
}

pub async fn store_view_state(
  store: &dyn KeyValueStore,
  cache: &TtlCache,
  filters: &FilterState,
) -> Result<()> {
  let cache = serde_json::to_string(cache).map_err(|e| eyre!("Failed to serialize cache: {}", e))?;
  let filters =
    serde_json::to_string(filters).map_err(|e| eyre!("Failed to serialize filters: {}", e))?;

  store
    .set(HashMap::from([
      (CACHE_KEY.to_string(), cache),
      (FILTERS_KEY.to_string(), filters),
    ]))
    .await
}

/// Latest not-yet-written value of each kind
#[derive(Default)]
struct Pending {
  memberships: Option<FolderGroups>,
  config: Option<GroupsConfig>,
  view_state: Option<(TtlCache, FilterState)>,
}

impl Pending {
  fn is_empty(&self) -> bool {
    self.memberships.is_none() && self.config.is_none() && self.view_state.is_none()
  }
}

/// Background writer for registry events.
pub struct AutoSaver {
  storage: Arc<dyn KeyValueStore>,
  local: Arc<dyn KeyValueStore>,
  debounce: Duration,
  on_diagnostics: Box<dyn Fn(bool) + Send + Sync>,
}

impl AutoSaver {
  pub fn new(storage: Arc<dyn KeyValueStore>, local: Arc<dyn KeyValueStore>) -> Self {
    Self {
      storage,
      local,
      debounce: Duration::from_millis(500),
      on_diagnostics: Box::new(|_| {}),
    }
  }

  pub fn with_debounce(mut self, debounce: Duration) -> Self {
    self.debounce = debounce;
    self
  }

  /// Side effect run whenever the diagnostics flag changes
  pub fn on_diagnostics(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
    self.on_diagnostics = Box::new(f);
    self
  }

  /// Start draining `events`. The task ends, after a final flush, once every
  /// sender has been dropped.
  pub fn spawn(self, events: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(self.run(events))
  }

  async fn run(self, mut events: EventReceiver) {
    let mut pending = Pending::default();

    loop {
      let event = if pending.is_empty() {
        events.recv().await
      } else {
        match tokio::time::timeout(self.debounce, events.recv()).await {
          Ok(event) => event,
          Err(_) => {
            self.flush(&mut pending).await;
            continue;
          }
        }
      };

      match event {
        Some(RegistryEvent::MembershipsChanged(dump)) => pending.memberships = Some(dump),
        Some(RegistryEvent::ConfigChanged(config)) => pending.config = Some(config),
        Some(RegistryEvent::ViewStateChanged { cache, filters }) => {
          pending.view_state = Some((cache, filters))
        }
        Some(RegistryEvent::DiagnosticsToggled(enabled)) => (self.on_diagnostics)(enabled),
        None => {
          self.flush(&mut pending).await;
          tracing::debug!("auto-save stopped");
          return;
        }
      }
    }
  }

  async fn flush(&self, pending: &mut Pending) {
    if let Some(dump) = pending.memberships.take() {
      match store_memberships(self.storage.as_ref(), &dump).await {
        Ok(()) => tracing::debug!("groups saved"),
        Err(e) => tracing::error!("auto-save of groups failed: {:#}", e),
      }
    }

    if let Some(config) = pending.config.take() {
      if let Err(e) = store_config(self.storage.as_ref(), &config).await {
        tracing::error!("auto-save of config failed: {:#}", e);
      }
    }

    if let Some((cache, filters)) = pending.view_state.take() {
      if let Err(e) = store_view_state(self.local.as_ref(), &cache, &filters).await {
        tracing::error!("auto-save of view state failed: {:#}", e);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event;
  use crate::storage::MemoryStore;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  /// Store that counts writes
  #[derive(Default)]
  struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
  }

  #[async_trait::async_trait]
  impl KeyValueStore for CountingStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
      self.inner.get(keys).await
    }

    async fn set(&self, values: HashMap<String, String>) -> Result<()> {
      self.writes.fetch_add(1, Ordering::SeqCst);
      self.inner.set(values).await
    }
  }

  fn dump(ids: &[u64]) -> FolderGroups {
    ids.iter().map(|id| ("f".to_string(), *id)).collect()
  }

  #[tokio::test(start_paused = true)]
  async fn test_burst_is_coalesced_into_one_write() {
    let storage = Arc::new(CountingStore::default());
    let local = Arc::new(MemoryStore::new());
    let (tx, rx) = event::channel();
    let handle = AutoSaver::new(storage.clone(), local)
      .with_debounce(Duration::from_millis(100))
      .spawn(rx);

    for n in 1..=5 {
      tx.send(RegistryEvent::MembershipsChanged(dump(&(1..=n).collect::<Vec<_>>())))
        .unwrap();
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
    assert_eq!(
      storage.get_one(GROUPS_KEY).await.unwrap().as_deref(),
      Some(r#"{"f":[1,2,3,4,5]}"#)
    );

    drop(tx);
    handle.await.unwrap();
  }

  #[tokio::test]
  async fn test_pending_writes_are_flushed_on_shutdown() {
    let storage = Arc::new(MemoryStore::new());
    let local = Arc::new(MemoryStore::new());
    let (tx, rx) = event::channel();
    let handle = AutoSaver::new(storage.clone(), local.clone())
      .with_debounce(Duration::from_secs(60))
      .spawn(rx);

    tx.send(RegistryEvent::ConfigChanged(GroupsConfig::default())).unwrap();
    tx.send(RegistryEvent::ViewStateChanged {
      cache: TtlCache::new(),
      filters: FilterState::default(),
    })
    .unwrap();
    drop(tx);
    handle.await.unwrap();

    assert!(storage.get_one(CONFIG_KEY).await.unwrap().is_some());
    assert_eq!(local.get_one(CACHE_KEY).await.unwrap().as_deref(), Some("{}"));
    assert!(local.get_one(FILTERS_KEY).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn test_diagnostics_callback_runs_immediately() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_task = Arc::clone(&seen);
    let (tx, rx) = event::channel();
    let handle = AutoSaver::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
      .on_diagnostics(move |enabled| seen_in_task.lock().unwrap().push(enabled))
      .spawn(rx);

    tx.send(RegistryEvent::DiagnosticsToggled(true)).unwrap();
    tx.send(RegistryEvent::DiagnosticsToggled(false)).unwrap();
    drop(tx);
    handle.await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![true, false]);
  }
}
