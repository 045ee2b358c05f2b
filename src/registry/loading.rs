use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared count of network operations in progress.
///
/// Clones share the same counter, so one indicator can be handed to every
/// component that talks to the network.
#[derive(Debug, Clone, Default)]
pub struct LoadingCounter {
  active: Arc<AtomicUsize>,
}

impl LoadingCounter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Mark one operation as started; it ends when the guard is dropped.
  pub fn start(&self) -> LoadingGuard {
    self.active.fetch_add(1, Ordering::SeqCst);
    LoadingGuard {
      active: Arc::clone(&self.active),
    }
  }

  pub fn is_loading(&self) -> bool {
    self.active() > 0
  }

  pub fn active(&self) -> usize {
    self.active.load(Ordering::SeqCst)
  }
}

/// Ends a loading operation on drop
#[derive(Debug)]
pub struct LoadingGuard {
  active: Arc<AtomicUsize>,
}

impl Drop for LoadingGuard {
  fn drop(&mut self) {
    self.active.fetch_sub(1, Ordering::SeqCst);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_guard_tracks_nested_operations() {
    let loading = LoadingCounter::new();
    let shared = loading.clone();

    let first = loading.start();
    let second = shared.start();
    assert_eq!(loading.active(), 2);

    drop(first);
    assert!(loading.is_loading());
    drop(second);
    assert!(!shared.is_loading());
  }
}
