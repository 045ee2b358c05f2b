//! Command-line subcommands.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
  /// List tracked groups
  #[command(alias = "ls")]
  List {
    /// Only groups in this folder ("" for every folder)
    #[arg(short, long)]
    folder: Option<String>,
    /// Match name, screen name or id
    #[arg(short, long)]
    search: Option<String>,
    /// none, access, noaccess, open or close
    #[arg(short, long)]
    access: Option<String>,
    /// newest, oldest or random
    #[arg(long)]
    sort: Option<String>,
    /// Do not load missing counters
    #[arg(long)]
    no_counters: bool,
  },

  /// List folders and how many groups each holds
  Folders,

  /// Track groups (ids, club123, @name or vk.com links) in a folder
  Add {
    folder: String,
    #[arg(required = true)]
    groups: Vec<String>,
  },

  /// Stop tracking groups
  #[command(alias = "rm")]
  Remove {
    #[arg(required = true)]
    groups: Vec<String>,
  },

  /// Move tracked groups to another folder
  #[command(alias = "mv")]
  Move {
    folder: String,
    #[arg(required = true)]
    groups: Vec<String>,
  },

  /// Stop tracking every group
  Clear {
    /// Confirm removal of every membership
    #[arg(long)]
    yes: bool,
  },

  /// Write memberships to storage now
  Save,

  /// Export memberships to a backup file
  Export {
    /// Output file (default: xg-backup.json)
    path: Option<PathBuf>,
  },

  /// Merge memberships from a backup file
  Import { path: PathBuf },

  /// Show a group with its counters
  Counters { group: String },

  /// List the albums of a user (positive id) or group (negative id)
  Albums {
    #[arg(allow_negative_numbers = true)]
    owner: i64,
    /// Stop after this many albums
    #[arg(short, long, default_value_t = 200)]
    limit: usize,
  },

  /// List the groups you are a member of
  Discover {
    #[arg(short, long, default_value_t = 100)]
    limit: usize,
    /// Track every listed group that is not tracked yet in this folder
    #[arg(long)]
    add: Option<String>,
  },

  /// Show or change the stored profile
  Config {
    #[arg(long)]
    auto_save: Option<bool>,
    #[arg(long)]
    show_counters: Option<bool>,
    /// Verbose logging
    #[arg(long)]
    diagnostics: Option<bool>,
    #[arg(long)]
    original_size_photo: Option<bool>,
    #[arg(long)]
    reverse_order: Option<bool>,
  },
}
