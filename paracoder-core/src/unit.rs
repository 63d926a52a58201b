// ============================================================================
// paracoder-core/src/unit.rs
// ============================================================================
//
// WORK UNITS: One Schedulable Conversion Each
//
// A work unit is either a whole source file or one track of a CUE sheet. It
// carries the command built for it and the timestamp that is copied onto
// its target after a successful run.
//
// KEY COMPONENTS:
// - UnitSource: Plain file or CUE track payload
// - WorkUnit: Source, command and timestamp to propagate
// - Outcome: Exit code of a finished unit

// ---- Internal crate imports ----
use crate::cue::CueTrackPayload;
use crate::error::{CoreResult, EXIT_OK};
use crate::template::extract_target_path;

// ---- External crate imports ----
use filetime::FileTime;

// ---- Standard library imports ----
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitSource {
    File(PathBuf),
    CueTrack(Box<CueTrackPayload>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub source: UnitSource,
    pub command: String,
    /// Copied onto the target when timestamps are preserved
    pub source_modified: FileTime,
}

impl WorkUnit {
    pub fn for_file(path: PathBuf, modified: FileTime, command: String) -> Self {
        Self {
            source: UnitSource::File(path),
            command,
            source_modified: modified,
        }
    }

    /// A CUE track takes the audio image's timestamp, not the sheet's.
    pub fn for_cue_track(payload: CueTrackPayload, command: String) -> Self {
        Self {
            source_modified: payload.audio_modified,
            source: UnitSource::CueTrack(Box::new(payload)),
            command,
        }
    }

    /// The file the transcoder reads.
    pub fn input_path(&self) -> &Path {
        match &self.source {
            UnitSource::File(path) => path,
            UnitSource::CueTrack(payload) => &payload.audio_path,
        }
    }

    /// Output path, taken from the last quoted token of the command.
    pub fn target_path(&self) -> CoreResult<PathBuf> {
        extract_target_path(&self.command)
    }

    /// Only plain files go to the trash; an audio image is shared by
    /// every track of its sheet.
    pub fn is_trashable(&self) -> bool {
        matches!(self.source, UnitSource::File(_))
    }

    /// Name used in status lines and logs.
    pub fn label(&self) -> String {
        match &self.source {
            UnitSource::File(path) => path.display().to_string(),
            UnitSource::CueTrack(payload) => {
                format!("{} [track {:02}]", payload.cue_path.display(), payload.track_number)
            }
        }
    }
}

/// Exit code of one unit and the source it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub label: String,
    pub exit_code: i32,
}

impl Outcome {
    pub fn new(label: impl Into<String>, exit_code: i32) -> Self {
        Self {
            label: label.into(),
            exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == EXIT_OK
    }
}
