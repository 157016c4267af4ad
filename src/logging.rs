use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LOG_FILE_NAME};

/// Install the global subscriber. The terminal belongs to the TUI, so events
/// go to `book-haven.log` in the data directory. `RUST_LOG` overrides the
/// default `info` level. Keep the returned guard alive until exit or buffered
/// lines are lost.
pub fn init(config: &Config) -> Result<WorkerGuard> {
    let appender = tracing_appender::rolling::never(&config.data_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))?;

    Ok(guard)
}
