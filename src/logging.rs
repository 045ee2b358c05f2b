//! Tracing setup: a daily rolling log file plus a runtime-switchable filter.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

const LOG_FILE_PREFIX: &str = "xg.log";
const DEFAULT_FILTER: &str = "info";
const DIAGNOSTICS_FILTER: &str = "debug";

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Default log directory ($XDG_DATA_HOME/xg/logs)
pub fn default_log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir().ok_or_else(|| eyre!("Could not determine data directory"))?;
  Ok(data_dir.join("xg").join("logs"))
}

/// Install the global subscriber writing to `log_dir`.
///
/// `RUST_LOG` overrides the default `info` filter. The returned guard must
/// be kept alive until exit, or buffered lines are lost.
pub fn init(log_dir: &Path) -> Result<(Diagnostics, WorkerGuard)> {
  std::fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let base = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
  let filter = EnvFilter::try_new(&base).map_err(|e| eyre!("Invalid log filter {}: {}", base, e))?;
  let (filter, handle) = reload::Layer::new(filter);

  let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok((Diagnostics::new(handle, base), guard))
}

/// Switches verbose diagnostics on and off at runtime.
#[derive(Clone)]
pub struct Diagnostics {
  handle: FilterHandle,
  base: String,
  enabled: Arc<AtomicBool>,
}

impl Diagnostics {
  fn new(handle: FilterHandle, base: String) -> Self {
    Self {
      handle,
      base,
      enabled: Arc::new(AtomicBool::new(false)),
    }
  }

  #[cfg(test)]
  pub fn is_enabled(&self) -> bool {
    self.enabled.load(Ordering::SeqCst)
  }

  /// Returns whether the filter actually changed.
  pub fn set_enabled(&self, enabled: bool) -> Result<bool> {
    if self.enabled.swap(enabled, Ordering::SeqCst) == enabled {
      return Ok(false);
    }

    let directive = if enabled { DIAGNOSTICS_FILTER } else { self.base.as_str() };
    let filter =
      EnvFilter::try_new(directive).map_err(|e| eyre!("Invalid log filter {}: {}", directive, e))?;
    self
      .handle
      .reload(filter)
      .map_err(|e| eyre!("Failed to switch log filter: {}", e))?;

    tracing::info!(enabled, "diagnostics toggled");
    Ok(true)
  }
}
