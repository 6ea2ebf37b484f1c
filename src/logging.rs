use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `leadsync=debug`.
pub const LOG_ENV: &str = "LEADSYNC_LOG";

const DEFAULT_DIRECTIVE: &str = "leadsync=info";

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
  Stderr,
  File(PathBuf),
}

impl LogTarget {
  /// The log file under the user data directory, or stderr when there is none.
  pub fn default_file() -> Self {
    match dirs::data_dir() {
      Some(dir) => LogTarget::File(dir.join("leadsync").join("leadsync.log")),
      None => LogTarget::Stderr,
    }
  }
}

fn env_filter() -> Result<EnvFilter> {
  let filter = EnvFilter::builder()
    .with_default_directive(
      DEFAULT_DIRECTIVE
        .parse()
        .map_err(|e| eyre!("Invalid log directive: {}", e))?,
    )
    .with_env_var(LOG_ENV)
    .from_env_lossy();
  Ok(filter)
}

/// Install the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init(target: &LogTarget) -> Result<Option<WorkerGuard>> {
  let filter = env_filter()?;

  match target {
    LogTarget::Stderr => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
    LogTarget::File(path) => {
      let dir = path
        .parent()
        .ok_or_else(|| eyre!("Log path has no parent directory: {}", path.display()))?;
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Log path has no file name: {}", path.display()))?;
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

      let appender = tracing_appender::rolling::never(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
  }
}
