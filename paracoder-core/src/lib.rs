//! Core library for parallel batch recoding of lossless audio and CUE sheets.
//!
//! This crate discovers source files, expands CUE sheets into one work unit
//! per track, fills per-extension command templates and runs the resulting
//! external transcoder pipelines on a bounded worker pool. After the batch
//! it restores file and directory timestamps and reduces every unit's exit
//! code to one.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use paracoder_core::{BatchParams, NativeOs, PatternConfig, Recoder};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let patterns = PatternConfig::new(
//!     ["flac".to_string()].into_iter().collect(),
//!     [(
//!         "flac".to_string(),
//!         r#"ffmpeg -i "{{F}}" -c:a libopus "{{D}}{{P}}{{N}}.opus""#.to_string(),
//!     )]
//!     .into_iter()
//!     .collect(),
//! );
//!
//! let recoder = Recoder::new(patterns, Arc::new(NativeOs));
//! let params = BatchParams::new(vec![PathBuf::from("/music/album")]).with_recurse(true);
//! let exit_code = recoder.recode(&params);
//! std::process::exit(exit_code);
//! ```

pub mod config;
pub mod cue;
pub mod discovery;
pub mod error;
pub mod external;
pub mod orchestrator;
pub mod process;
pub mod scheduler;
pub mod template;
pub mod terminal;
pub mod unit;

// Re-exports for public API
pub use config::{BatchParams, PatternConfig, Timeouts};
pub use cue::{CueSheet, CueTrackPayload, expand_cue_sheet, read_cue_sheet};
pub use discovery::{PathEntry, PathKind, PathTree, build_path_tree, compare_deepest_first};
pub use error::{CoreError, CoreResult, EXIT_OK, EXIT_SOFTWARE, EXIT_USAGE};
pub use external::{NativeOs, OsNative};
pub use orchestrator::{BatchReport, Phase, Recoder};
pub use process::{ChildRegistry, ProcessRunner, global_children};
pub use scheduler::{PostActions, UnitHandle, WorkScheduler, WorkerPool};
pub use template::{CommandTemplates, extract_target_path, sanitize_file_name};
pub use unit::{Outcome, UnitSource, WorkUnit};
