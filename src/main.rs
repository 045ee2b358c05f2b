mod app;
mod browse;
mod cache;
mod commands;
mod config;
mod event;
mod loader;
mod logging;
mod persist;
mod registry;
mod render;
mod storage;
mod vk;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "xg")]
#[command(about = "Curate foldered collections of VK groups from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/xg/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Directory for log files (default: $XDG_DATA_HOME/xg/logs)
  #[arg(long)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Logging failures are reported but not fatal
  let log_dir = match args.log_dir {
    Some(dir) => Ok(dir),
    None => logging::default_log_dir(),
  };
  let (diagnostics, _log_guard) = match log_dir.and_then(|dir| logging::init(&dir)) {
    Ok((diagnostics, guard)) => (Some(diagnostics), Some(guard)),
    Err(e) => {
      eprintln!("warning: logging disabled: {:#}", e);
      (None, None)
    }
  };

  let config = config::Config::load(args.config.as_deref())?;
  tracing::info!(api = %config.api.url, "starting");

  let app = app::App::new(&config, diagnostics).await?;
  app.run(args.command).await?;

  Ok(())
}
