//! Logging setup.

use std::ffi::OsStr;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the file writer flushing. Drop it last.
pub type LogGuard = Option<WorkerGuard>;

const DEFAULT_LOG_FILE: &str = "trading-bot.log";

/// Setup logging with the given level.
///
/// `RUST_LOG` overrides `level`. When `file` is set, JSON lines are also
/// written to a daily rolling file next to it.
pub fn setup_logging(level: &str, json: bool, file: Option<&Path>) -> Result<LogGuard, TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match file {
        Some(path) => {
            let (dir, name) = split_log_path(path);
            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if json {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer().pretty()).try_init()?;
    }

    Ok(guard)
}

fn split_log_path(path: &Path) -> (&Path, &OsStr) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
    (dir, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("logs/bot.log"));
        assert_eq!(dir, Path::new("logs"));
        assert_eq!(name, "bot.log");

        let (dir, name) = split_log_path(Path::new("bot.log"));
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "bot.log");

        let (_, name) = split_log_path(Path::new("/"));
        assert_eq!(name, DEFAULT_LOG_FILE);
    }
}
