// paracoder-core/src/external/mocks.rs

// --- Mocking Infrastructure (for testing) ---

use super::OsNative;
use crate::error::{CoreError, CoreResult, invalid_command};
use std::path::PathBuf;
use std::sync::Mutex;

/// OsNative double that splits POSIX style and records trash requests
/// instead of touching the trash.
#[derive(Debug)]
pub struct RecordingOsNative {
    trash_supported: bool,
    fail_trash: bool,
    trashed: Mutex<Vec<PathBuf>>,
}

impl Default for RecordingOsNative {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingOsNative {
    pub fn new() -> Self {
        Self {
            trash_supported: true,
            fail_trash: false,
            trashed: Mutex::new(Vec::new()),
        }
    }

    /// A platform without a trash.
    pub fn without_trash() -> Self {
        Self {
            trash_supported: false,
            ..Self::new()
        }
    }

    /// Every trash request fails.
    pub fn failing_trash() -> Self {
        Self {
            fail_trash: true,
            ..Self::new()
        }
    }

    /// Paths passed to `move_to_trash` so far.
    pub fn trashed(&self) -> Vec<PathBuf> {
        self.trashed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl OsNative for RecordingOsNative {
    fn tokenize(&self, command_line: &str) -> CoreResult<Vec<String>> {
        let args = shell_words::split(command_line).map_err(|e| invalid_command(command_line, e.to_string()))?;
        if args.is_empty() {
            return Err(invalid_command(command_line, "empty command"));
        }
        Ok(args)
    }

    fn move_to_trash(&self, paths: &[PathBuf]) -> CoreResult<()> {
        if !self.trash_supported {
            return Err(CoreError::TrashUnsupported);
        }
        if self.fail_trash {
            return Err(CoreError::Trash {
                path: paths.first().cloned().unwrap_or_default(),
                reason: "trash rejected by test double".to_string(),
            });
        }
        log::debug!("Recording trash request for {:?}", paths);
        self.trashed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(paths.iter().cloned());
        Ok(())
    }

    fn supports_trash(&self) -> bool {
        self.trash_supported
    }
}
