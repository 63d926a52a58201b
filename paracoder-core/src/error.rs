// ============================================================================
// paracoder-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Core Error Type and Result Alias
//
// This module defines the single error type used throughout paracoder-core.
// Batch-level failures (no input, discovery I/O errors) propagate to the
// orchestrator, while per-unit failures travel as values through the
// continuation chain of a work unit and are reduced to exit codes there.
//
// KEY COMPONENTS:
// - CoreError: All failure modes of the recoding engine
// - CoreResult: Convenience alias used by every fallible function
// - Exit code constants shared by the core and the CLI

// ---- External crate imports ----
use thiserror::Error;

// ---- Standard library imports ----
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// EXIT CODES
// ============================================================================

/// All work units succeeded.
pub const EXIT_OK: i32 = 0;

/// A unit failed, timed out, or an internal error occurred.
pub const EXIT_SOFTWARE: i32 = 1;

/// No input was supplied or no files matched.
pub const EXIT_USAGE: i32 = 2;

// ============================================================================
// ERROR TYPE
// ============================================================================

/// Errors produced by the recoding engine.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to walk directory tree: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("No files or directories have been selected to recode")]
    NoInput,

    #[error("No files matching the configured extensions were found")]
    NoFilesFound,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No command template configured for '{0}' and no 'any' fallback")]
    MissingTemplate(String),

    #[error("Error on getting the target file from command: {0}")]
    TargetNotFound(String),

    #[error("Invalid command line '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("Failed to start command '{0}': {1}")]
    CommandStart(String, #[source] std::io::Error),

    #[error("Failed to wait for command '{0}': {1}")]
    CommandWait(String, #[source] std::io::Error),

    #[error("Waiting time for recode command has expired after {timeout:?}: {command}")]
    Timeout { command: String, timeout: Duration },

    #[error("CUE parse error in {path} at line {line}: {reason}")]
    CueParse { path: PathBuf, line: usize, reason: String },

    #[error("Audio file referenced by CUE sheet not found: {0}")]
    CueAudioMissing(PathBuf),

    #[error("Source file doesn't exist: {0}")]
    SourceMissing(PathBuf),

    #[error("Moving files to the trash is not supported on this platform")]
    TrashUnsupported,

    #[error("Failed to move {path} to the trash: {reason}")]
    Trash { path: PathBuf, reason: String },

    #[error("Worker pool has been shut down")]
    PoolShutDown,

    #[error("Batch did not complete within {0:?}")]
    BatchTimeout(Duration),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for paracoder-core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Exit code reported for this error when it ends a batch or a unit.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::NoInput | CoreError::NoFilesFound | CoreError::TrashUnsupported => {
                EXIT_USAGE
            }
            _ => EXIT_SOFTWARE,
        }
    }
}

// ============================================================================
// CONSTRUCTOR HELPERS
// ============================================================================

pub(crate) fn invalid_command(command: &str, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidCommand {
        command: command.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn cue_parse_error(path: &std::path::Path, line: usize, reason: impl Into<String>) -> CoreError {
    CoreError::CueParse {
        path: path.to_path_buf(),
        line,
        reason: reason.into(),
    }
}
