pub mod api_types;
pub mod client;
pub mod directory;
pub mod group_ref;
pub mod types;

pub use client::VkClient;
pub use directory::RemoteDirectory;
pub use group_ref::GroupRef;
pub use types::{Album, Counters, Group, Page};

#[cfg(test)]
pub mod fake;
