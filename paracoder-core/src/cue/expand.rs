// ============================================================================
// paracoder-core/src/cue/expand.rs
// ============================================================================
//
// CUE EXPANSION: One Payload per Audio Track
//
// Every audio track of a sheet becomes a CueTrackPayload with its own time
// window inside the shared audio image. The end of a track is the start of
// the next audio track of the same file; the last track runs to a sentinel
// time because sheets carry no end marker.
//
// KEY COMPONENTS:
// - CueTrackPayload: Track metadata and time bounds for templating
// - expand_cue_sheet: Sheet to payload conversion
// - filter_ambiguous_sources: Drops raw files when CUE sheets are present

// ---- Internal crate imports ----
use super::{CueSheet, CueTrack};
use crate::discovery::{PathTree, lowercase_extension};
use crate::error::{CoreError, CoreResult, cue_parse_error};

// ---- External crate imports ----
use chrono::NaiveTime;
use filetime::FileTime;
use log::{debug, warn};

// ---- Standard library imports ----
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extension identifying CUE sheets.
pub const CUE_EXTENSION: &str = "cue";

/// End time given to the last track of an audio file (23:59:59).
pub fn end_of_file_time() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

pub fn is_cue_file(path: &Path) -> bool {
    lowercase_extension(path) == CUE_EXTENSION
}

// ============================================================================
// TRACK PAYLOAD
// ============================================================================

/// Everything the template engine needs to build one track's command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueTrackPayload {
    /// The sheet the track was read from
    pub cue_path: PathBuf,
    /// The shared audio image next to the sheet
    pub audio_path: PathBuf,
    /// Modification time of the audio image, propagated to the target
    pub audio_modified: FileTime,

    pub track_number: u32,
    /// Number of audio tracks in the same audio file
    pub total_tracks: u32,
    pub title: Option<String>,
    /// Track performer, or the sheet performer when the track has none
    pub performer: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    pub disc_id: Option<String>,
    pub year: Option<i32>,
    pub disc_number: Option<u32>,
    pub total_discs: Option<u32>,

    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl CueTrackPayload {
    /// Lowercase extension of the audio image, used to pick `cue_<ext>`.
    pub fn audio_extension(&self) -> String {
        lowercase_extension(&self.audio_path)
    }
}

// ============================================================================
// EXPANSION
// ============================================================================

/// Expands a parsed sheet into one payload per audio track.
///
/// Non-audio tracks are skipped. A referenced audio file that does not
/// exist fails the whole sheet with [`CoreError::CueAudioMissing`].
pub fn expand_cue_sheet(sheet: &CueSheet, cue_path: &Path) -> CoreResult<Vec<CueTrackPayload>> {
    let base_dir = cue_path.parent().unwrap_or_else(|| Path::new(""));
    let mut payloads = Vec::new();

    for file in &sheet.files {
        let audio_tracks: Vec<&CueTrack> = file.tracks.iter().filter(|track| track.is_audio()).collect();
        if audio_tracks.is_empty() {
            debug!("No audio tracks for '{}' in {}", file.name, cue_path.display());
            continue;
        }

        let audio_path = base_dir.join(&file.name);
        let audio_meta = fs::metadata(&audio_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CoreError::CueAudioMissing(audio_path.clone()),
            _ => CoreError::Io(e),
        })?;
        let audio_modified = FileTime::from_last_modification_time(&audio_meta);

        let start_times = audio_tracks
            .iter()
            .map(|track| track_start_time(track, cue_path))
            .collect::<CoreResult<Vec<NaiveTime>>>()?;
        let total_tracks = audio_tracks.len() as u32;

        for (position, track) in audio_tracks.iter().enumerate() {
            let end_time = start_times
                .get(position + 1)
                .copied()
                .unwrap_or_else(end_of_file_time);

            payloads.push(CueTrackPayload {
                cue_path: cue_path.to_path_buf(),
                audio_path: audio_path.clone(),
                audio_modified,
                track_number: track.number,
                total_tracks,
                title: track.title.clone(),
                performer: track.performer.clone().or_else(|| sheet.performer.clone()),
                album: sheet.title.clone(),
                genre: sheet.genre.clone(),
                comment: sheet.comment.clone(),
                disc_id: sheet.disc_id.clone(),
                year: sheet.year,
                disc_number: sheet.disc_number,
                total_discs: sheet.total_discs,
                start_time: start_times[position],
                end_time,
            });
        }
    }

    Ok(payloads)
}

fn track_start_time(track: &CueTrack, cue_path: &Path) -> CoreResult<NaiveTime> {
    let index = track
        .start_index()
        .ok_or_else(|| cue_parse_error(cue_path, 0, format!("track {} has no INDEX", track.number)))?;
    index.position.to_time().ok_or_else(|| {
        cue_parse_error(
            cue_path,
            0,
            format!("track {} starts beyond 24 hours", track.number),
        )
    })
}

// ============================================================================
// AMBIGUITY FILTER
// ============================================================================

/// Keeps only CUE sheets (and directories) when a tree mixes them with
/// other files, returning the number of dropped files.
///
/// Recoding both the sheet and the raw images next to it would produce
/// overlapping outputs.
pub fn filter_ambiguous_sources(tree: &mut PathTree) -> usize {
    let has_cue = tree.files().any(|entry| is_cue_file(&entry.path));
    let has_other = tree.files().any(|entry| !is_cue_file(&entry.path));
    if !(has_cue && has_other) {
        return 0;
    }

    let before = tree.len();
    tree.retain(|entry| entry.is_dir() || is_cue_file(&entry.path));
    let dropped = before - tree.len();
    warn!(
        "Both CUE sheets and other files were found; only CUE sheets will be recoded ({} files skipped)",
        dropped
    );
    dropped
}
