use async_trait::async_trait;
use color_eyre::Result;

use super::group_ref::GroupRef;
use super::types::{Album, Counters, Group, Page};

/// Remote source of groups and albums.
///
/// The registry and the loaders only talk to the network through this trait,
/// so tests can script responses without an HTTP server.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
  /// Resolve ids and screen names to full groups in one batched lookup.
  async fn groups_by_refs(&self, refs: &[GroupRef]) -> Result<Vec<Group>>;

  /// Fetch only the counters of a single group.
  async fn group_counters(&self, group_id: u64) -> Result<Counters>;

  /// List a page of albums of a user (positive id) or group (negative id).
  async fn albums(&self, owner_id: i64, offset: usize, count: usize) -> Result<Page<Album>>;

  /// List a page of the groups the current user belongs to.
  async fn user_groups(&self, offset: usize, count: usize) -> Result<Page<Group>>;
}
