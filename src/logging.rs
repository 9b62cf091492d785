use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Route `tracing` output to a daily log file under `log_dir`, keeping
/// stdout free for command output. Hold the guard until exit so buffered
/// lines get flushed.
pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir).with_context(|| format!("Failed to create {}", log_dir.display()))?;
  let appender = tracing_appender::rolling::daily(log_dir, "meowfeed.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;
  Ok(guard)
}
