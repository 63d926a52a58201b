// ============================================================================
// paracoder-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: Console and File Logging with fern
//
// The core library logs through the `log` facade. This module installs the
// backend: a coloured level prefix on stderr, and optionally a plain-text
// copy of everything in a timestamped file.
//
// KEY COMPONENTS:
// - init_logging: Builds and applies the fern dispatch
// - get_timestamp: Timestamp used in log file names
//
// USAGE:
// Info level by default, --verbose raises it to debug. The user-facing
// progress lines are printed separately and never go through the logger.

// ---- Internal crate imports ----
use crate::error::{CliErrorContext, CliResult};

// ---- External crate imports ----
use console::style;
use log::LevelFilter;
use paracoder_core::CoreError;

// ---- Standard library imports ----
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
///
/// # Example
/// ```
/// let log_filename = format!("paracoder_{}.log", paracoder_cli::logging::get_timestamp());
/// assert!(log_filename.starts_with("paracoder_"));
/// ```
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Path of the log file for a run started now.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("paracoder_{}.log", get_timestamp()))
}

fn colored_level(level: log::Level) -> String {
    let label = level.to_string();
    match level {
        log::Level::Error => style(label).red().bold().to_string(),
        log::Level::Warn => style(label).yellow().to_string(),
        log::Level::Info => style(label).green().to_string(),
        log::Level::Debug => style(label).blue().to_string(),
        log::Level::Trace => style(label).dim().to_string(),
    }
}

/// Installs the global logger.
///
/// Returns the log file path when `log_dir` is given. The directory is
/// created if needed.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> CliResult<Option<PathBuf>> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", colored_level(record.level()), message))
        })
        .chain(std::io::stderr());

    let mut dispatch = fern::Dispatch::new().level(level).chain(console);

    let log_path = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .cli_with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = log_file_path(dir);
            let file = fern::log_file(&path)
                .cli_with_context(|| format!("Failed to open log file {}", path.display()))?;
            dispatch = dispatch.chain(
                fern::Dispatch::new()
                    .format(|out, message, record| {
                        out.finish(format_args!(
                            "{} [{}] [{}] {}",
                            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                            record.level(),
                            record.target(),
                            message
                        ))
                    })
                    .chain(file),
            );
            Some(path)
        }
        None => None,
    };

    dispatch
        .apply()
        .map_err(|e| CoreError::OperationFailed(format!("Failed to initialize logging: {}", e)))?;
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_shape() {
        let timestamp = get_timestamp();
        assert_eq!(timestamp.len(), 15);
        assert_eq!(timestamp.as_bytes()[8], b'_');
    }

    #[test]
    fn test_log_file_name() {
        let path = log_file_path(Path::new("logs"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("paracoder_"));
        assert!(name.ends_with(".log"));
    }
}
