// ============================================================================
// paracoder-core/src/config.rs
// ============================================================================
//
// CONFIGURATION: Batch Parameters, Command Patterns and Timeouts
//
// This module defines the configuration structures consumed by the
// recoding engine. They are populated once at startup by the consumer of
// the library (like paracoder-cli) and passed explicitly into the
// orchestrator; the engine itself never holds cross-call state.
//
// KEY COMPONENTS:
// - BatchParams: Per-invocation flags and input roots
// - PatternConfig: Extension filter and command templates
// - Timeouts: Ceilings for processes, units, the batch and pool shutdown
// - Default constants

// ---- External crate imports ----
use serde::Deserialize;

// ---- Internal crate imports ----
use crate::error::{CoreError, CoreResult};

// ---- Standard library imports ----
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// DEFAULT CONSTANTS
// ============================================================================

/// Default number of concurrently running work units.
pub const DEFAULT_THREAD_COUNT: usize = 4;

/// Capacity of the worker pool's submission queue.
pub const WORK_QUEUE_CAPACITY: usize = 100;

/// Ceiling for the last stage of one process pipeline.
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(9 * 60);

/// Ceiling for one work unit handle, including post-actions.
pub const DEFAULT_UNIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Ceiling for the whole batch.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Grace period for outstanding work when the pool shuts down.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Interval between exit checks of a running pipeline.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Template key used when no extension specific template exists.
pub const ANY_TEMPLATE_KEY: &str = "any";

/// Prefix of template keys for CUE tracks (`cue_<audio ext>`).
pub const CUE_TEMPLATE_PREFIX: &str = "cue_";

// ============================================================================
// BATCH PARAMETERS
// ============================================================================

/// Parameters of one `recode` invocation.
///
/// Immutable for the duration of a batch and owned by the caller; the
/// orchestrator only borrows it.
///
/// # Examples
///
/// ```rust
/// use paracoder_core::BatchParams;
/// use std::path::PathBuf;
///
/// let params = BatchParams::new(vec![PathBuf::from("/music/album")])
///     .with_recurse(true)
///     .with_thread_count(8);
/// assert!(params.preserve_file_timestamp);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchParams {
    /// Files and directories to recode
    pub input_paths: Vec<PathBuf>,

    /// Descend into subdirectories of the input directories
    pub recurse: bool,

    /// Copy the source modification time onto each target
    pub preserve_file_timestamp: bool,

    /// Restore directory modification times after the batch
    pub preserve_dir_timestamp: bool,

    /// Move successfully recoded sources to the OS trash
    pub delete_to_trash: bool,

    /// Number of worker threads
    pub thread_count: usize,
}

impl BatchParams {
    /// Creates parameters with the default flags for the given inputs.
    pub fn new(input_paths: Vec<PathBuf>) -> Self {
        Self {
            input_paths,
            recurse: false,
            preserve_file_timestamp: true,
            preserve_dir_timestamp: true,
            delete_to_trash: false,
            thread_count: DEFAULT_THREAD_COUNT,
        }
    }

    pub fn with_recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn with_preserve_file_timestamp(mut self, preserve: bool) -> Self {
        self.preserve_file_timestamp = preserve;
        self
    }

    pub fn with_preserve_dir_timestamp(mut self, preserve: bool) -> Self {
        self.preserve_dir_timestamp = preserve;
        self
    }

    pub fn with_delete_to_trash(mut self, delete: bool) -> Self {
        self.delete_to_trash = delete;
        self
    }

    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Depth limit for directory traversal (1 = direct children only).
    pub fn max_depth(&self) -> usize {
        if self.recurse { usize::MAX } else { 1 }
    }

    /// Checks the parameters before any work is scheduled.
    pub fn validate(&self) -> CoreResult<()> {
        if self.input_paths.is_empty() {
            return Err(CoreError::NoInput);
        }
        if self.thread_count == 0 {
            return Err(CoreError::Config("thread count must be at least 1".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// COMMAND PATTERNS
// ============================================================================

/// Which files are picked up and how each one is turned into a command.
///
/// Template keys are a lowercase extension (`flac`), the fallback `any`,
/// or `cue_<ext>` for tracks of a CUE sheet whose audio image has `<ext>`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PatternConfig {
    /// Lowercase extensions (without the dot) that qualify for recoding
    #[serde(default)]
    pub file_extensions: BTreeSet<String>,

    /// Template per extension key
    #[serde(default)]
    pub command_template: HashMap<String, String>,
}

impl PatternConfig {
    pub fn new(file_extensions: BTreeSet<String>, command_template: HashMap<String, String>) -> Self {
        Self {
            file_extensions,
            command_template,
        }
        .normalized()
    }

    /// Lowercases extensions and template keys and strips leading dots.
    pub fn normalized(self) -> Self {
        let file_extensions = self
            .file_extensions
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        let command_template = self
            .command_template
            .into_iter()
            .map(|(key, template)| (key.trim().to_lowercase(), template))
            .collect();
        Self {
            file_extensions,
            command_template,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.file_extensions.is_empty() {
            return Err(CoreError::Config("no file extensions configured".to_string()));
        }
        if self.command_template.is_empty() {
            return Err(CoreError::Config("no command templates configured".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// TIMEOUTS
// ============================================================================

/// Time ceilings of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Wait limit for the last stage of a pipeline
    pub process: Duration,

    /// Wait limit for one unit handle (second line of defense)
    pub unit: Duration,

    /// Wait limit for the whole batch
    pub batch: Duration,

    /// Time given to outstanding work when the pool shuts down
    pub shutdown_grace: Duration,

    /// Interval between exit checks of a running pipeline
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            process: DEFAULT_PROCESS_TIMEOUT,
            unit: DEFAULT_UNIT_TIMEOUT,
            batch: DEFAULT_BATCH_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_params_defaults() {
        let params = BatchParams::new(vec![PathBuf::from("in")]);
        assert!(!params.recurse);
        assert!(params.preserve_file_timestamp);
        assert!(params.preserve_dir_timestamp);
        assert!(!params.delete_to_trash);
        assert_eq!(params.thread_count, DEFAULT_THREAD_COUNT);
        assert_eq!(params.max_depth(), 1);
        assert_eq!(params.with_recurse(true).max_depth(), usize::MAX);
    }

    #[test]
    fn test_batch_params_validation() {
        assert!(matches!(BatchParams::new(vec![]).validate(), Err(CoreError::NoInput)));
        let zero_threads = BatchParams::new(vec![PathBuf::from("in")]).with_thread_count(0);
        assert!(matches!(zero_threads.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_pattern_config_normalization() {
        let config = PatternConfig::new(
            [".FLAC".to_string(), "Cue".to_string(), " ".to_string()].into_iter().collect(),
            [("CUE_Opus".to_string(), "t".to_string())].into_iter().collect(),
        );
        assert_eq!(
            config.file_extensions.iter().cloned().collect::<Vec<_>>(),
            vec!["cue".to_string(), "flac".to_string()]
        );
        assert!(config.command_template.contains_key("cue_opus"));
        assert!(config.validate().is_ok());
        assert!(PatternConfig::default().validate().is_err());
    }
}
