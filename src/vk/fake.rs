//! Scripted `RemoteDirectory` for tests.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::directory::RemoteDirectory;
use super::group_ref::GroupRef;
use super::types::{Album, Counters, Group, Page};

#[derive(Default)]
pub struct FakeDirectory {
  groups: Mutex<HashMap<u64, Group>>,
  counters: Mutex<HashMap<u64, Counters>>,
  albums_total: usize,
  album_gate: Option<Arc<Semaphore>>,
  pub fail_resolve: AtomicBool,
  pub fail_counters: AtomicBool,
  pub fail_albums: AtomicBool,
  pub resolve_calls: AtomicUsize,
  pub counter_calls: AtomicUsize,
  pub album_calls: AtomicUsize,
}

impl FakeDirectory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_group(self, group: Group) -> Self {
    if let Ok(mut groups) = self.groups.lock() {
      groups.insert(group.id, group);
    }
    self
  }

  pub fn with_counters(self, id: u64, counters: Counters) -> Self {
    if let Ok(mut all) = self.counters.lock() {
      all.insert(id, counters);
    }
    self
  }

  pub fn with_albums(mut self, total: usize) -> Self {
    self.albums_total = total;
    self
  }

  /// Album calls wait for a permit on `gate` before answering.
  pub fn with_album_gate(mut self, gate: Arc<Semaphore>) -> Self {
    self.album_gate = Some(gate);
    self
  }

  pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
  }
}

/// Minimal open group with the given id
pub fn group(id: u64, name: &str) -> Group {
  Group {
    id,
    name: name.to_string(),
    screen_name: format!("club{}", id),
    ..Default::default()
  }
}

#[async_trait]
impl RemoteDirectory for FakeDirectory {
  async fn groups_by_refs(&self, refs: &[GroupRef]) -> Result<Vec<Group>> {
    self.resolve_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_resolve.load(Ordering::SeqCst) {
      return Err(eyre!("resolve failed"));
    }

    let groups = self.groups.lock().map_err(|e| eyre!("{}", e))?;
    Ok(
      refs
        .iter()
        .filter_map(|r| match r {
          GroupRef::Id(id) => groups.get(id).cloned(),
          GroupRef::ScreenName(name) => groups.values().find(|g| &g.screen_name == name).cloned(),
        })
        .collect(),
    )
  }

  async fn group_counters(&self, group_id: u64) -> Result<Counters> {
    self.counter_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_counters.load(Ordering::SeqCst) {
      return Err(eyre!("counters failed"));
    }

    let counters = self.counters.lock().map_err(|e| eyre!("{}", e))?;
    Ok(counters.get(&group_id).cloned().unwrap_or_default())
  }

  async fn albums(&self, owner_id: i64, offset: usize, count: usize) -> Result<Page<Album>> {
    self.album_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = &self.album_gate {
      let permit = gate.acquire().await.map_err(|e| eyre!("{}", e))?;
      permit.forget();
    }
    if self.fail_albums.load(Ordering::SeqCst) {
      return Err(eyre!("albums failed"));
    }

    let end = (offset + count).min(self.albums_total);
    let items = (offset..end)
      .map(|i| Album {
        id: i as i64 + 1,
        owner_id,
        title: format!("album {}", i + 1),
        size: 1,
        thumb_src: None,
        description: None,
      })
      .collect();

    Ok(Page {
      count: self.albums_total,
      items,
    })
  }

  async fn user_groups(&self, offset: usize, count: usize) -> Result<Page<Group>> {
    let groups = self.groups.lock().map_err(|e| eyre!("{}", e))?;
    let mut all: Vec<Group> = groups.values().cloned().collect();
    all.sort_by_key(|g| g.id);

    Ok(Page {
      count: all.len(),
      items: all.into_iter().skip(offset).take(count).collect(),
    })
  }
}
