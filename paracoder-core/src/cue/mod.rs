// ============================================================================
// paracoder-core/src/cue/mod.rs
// ============================================================================
//
// CUE SHEETS: Model, Reading and Expansion into Track Payloads
//
// A CUE sheet describes the tracks of one (or several) audio image files.
// This module reads sheets from disk, detecting a byte order mark to pick
// the text encoding, and turns each audio track into a payload carrying its
// time bounds and metadata for the command template engine.
//
// KEY COMPONENTS:
// - CueSheet / CueFile / CueTrack / CuePosition: Parsed sheet model
// - read_cue_sheet: Decode and parse a sheet from disk
// - expand: Per-track payloads and the CUE/raw ambiguity filter

// ---- Internal crate imports ----
use crate::error::CoreResult;

// ---- External crate imports ----
use chrono::NaiveTime;
use log::{debug, warn};

// ---- Standard library imports ----
use std::fs;
use std::path::Path;

// ============================================================================
// SUBMODULES
// ============================================================================

/// Per-track payloads and the ambiguity filter
pub mod expand;

/// Line based CUE sheet parser
pub mod parser;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use expand::{
    CUE_EXTENSION, CueTrackPayload, end_of_file_time, expand_cue_sheet, filter_ambiguous_sources,
    is_cue_file,
};
pub use parser::parse_cue_sheet;

// ============================================================================
// SHEET MODEL
// ============================================================================

/// CD Audio (Red Book) has 75 frames per second.
pub const FRAMES_PER_SECOND: u32 = 75;

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_FRAME: u64 = NANOS_PER_SECOND / FRAMES_PER_SECOND as u64;

/// A position inside an audio file in minutes, seconds and frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CuePosition {
    pub minutes: u32,
    pub seconds: u32,
    pub frames: u32,
}

impl CuePosition {
    pub fn new(minutes: u32, seconds: u32, frames: u32) -> Self {
        Self {
            minutes,
            seconds,
            frames,
        }
    }

    /// Converts the position to a clock time with sub-second precision.
    ///
    /// Returns `None` when the position does not fit into one day.
    pub fn to_time(&self) -> Option<NaiveTime> {
        let secs = self.minutes.checked_mul(60)?.checked_add(self.seconds)?;
        let nanos = u32::try_from(u64::from(self.frames) * NANOS_PER_FRAME).ok()?;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueIndex {
    pub number: u32,
    pub position: CuePosition,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueTrack {
    pub number: u32,
    /// Data type as written in the sheet (`AUDIO`, `MODE1/2352`, ...)
    pub data_type: String,
    pub title: Option<String>,
    pub performer: Option<String>,
    pub songwriter: Option<String>,
    pub isrc: Option<String>,
    pub flags: Vec<String>,
    pub pregap: Option<CuePosition>,
    pub postgap: Option<CuePosition>,
    pub indices: Vec<CueIndex>,
}

impl CueTrack {
    pub fn is_audio(&self) -> bool {
        self.data_type.eq_ignore_ascii_case("AUDIO")
    }

    /// `INDEX 01`, or the lowest index when the sheet omits it.
    pub fn start_index(&self) -> Option<&CueIndex> {
        self.indices
            .iter()
            .find(|index| index.number == 1)
            .or_else(|| self.indices.iter().min_by_key(|index| index.number))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueFile {
    /// File name as written in the sheet, relative to the sheet's directory
    pub name: String,
    pub file_type: String,
    pub tracks: Vec<CueTrack>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueSheet {
    pub title: Option<String>,
    pub performer: Option<String>,
    pub songwriter: Option<String>,
    pub catalog: Option<String>,
    pub cdtext_file: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub disc_id: Option<String>,
    pub comment: Option<String>,
    pub disc_number: Option<u32>,
    pub total_discs: Option<u32>,
    pub files: Vec<CueFile>,
}

impl CueSheet {
    pub fn tracks(&self) -> impl Iterator<Item = &CueTrack> {
        self.files.iter().flat_map(|file| file.tracks.iter())
    }
}

// ============================================================================
// READING
// ============================================================================

/// Reads and parses a CUE sheet.
///
/// A UTF-8 or UTF-16 byte order mark selects the encoding; without one the
/// content is read as UTF-8.
pub fn read_cue_sheet(path: &Path) -> CoreResult<CueSheet> {
    let bytes = fs::read(path)?;
    let (text, encoding) = decode_sheet_bytes(&bytes);
    debug!("Reading CUE sheet {} as {}", path.display(), encoding);
    parse_cue_sheet(&text, path)
}

/// Decodes raw sheet bytes, returning the text and the encoding used.
pub fn decode_sheet_bytes(bytes: &[u8]) -> (String, &'static str) {
    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => (String::from_utf8_lossy(rest).into_owned(), "UTF-8 (BOM)"),
        [0xFF, 0xFE, rest @ ..] => (decode_utf16(rest, u16::from_le_bytes), "UTF-16LE"),
        [0xFE, 0xFF, rest @ ..] => (decode_utf16(rest, u16::from_be_bytes), "UTF-16BE"),
        _ => match std::str::from_utf8(bytes) {
            Ok(text) => (text.to_string(), "UTF-8"),
            Err(e) => {
                warn!("CUE sheet is not valid UTF-8 ({}), replacing invalid sequences", e);
                (String::from_utf8_lossy(bytes).into_owned(), "UTF-8 (lossy)")
            }
        },
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let chunks = bytes.chunks_exact(2);
    let odd_tail = !chunks.remainder().is_empty();
    let units: Vec<u16> = chunks.map(|pair| to_unit([pair[0], pair[1]])).collect();
    let mut text = String::from_utf16_lossy(&units);
    if odd_tail {
        warn!("UTF-16 CUE sheet has an odd number of bytes, replacing the trailing byte");
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_to_time() {
        let time = CuePosition::new(0, 57, 57).to_time().unwrap();
        let expected_nanos = (57u64 * NANOS_PER_SECOND / 75) as u32;
        assert_eq!(time, NaiveTime::from_hms_nano_opt(0, 0, 57, expected_nanos).unwrap());

        let time = CuePosition::new(3, 49, 0).to_time().unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(0, 3, 49).unwrap());

        // Minutes above 59 roll into hours
        let time = CuePosition::new(75, 0, 0).to_time().unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(1, 15, 0).unwrap());

        assert_eq!(CuePosition::new(24 * 60, 0, 0).to_time(), None);
        assert_eq!(CuePosition::new(99_999_999, 0, 0).to_time(), None);
        assert_eq!(CuePosition::new(u32::MAX, 59, 74).to_time(), None);
    }

    #[test]
    fn test_decode_sheet_bytes() {
        let (text, encoding) = decode_sheet_bytes(b"\xEF\xBB\xBFTITLE \"A\"");
        assert_eq!(text, "TITLE \"A\"");
        assert_eq!(encoding, "UTF-8 (BOM)");

        let mut utf16: Vec<u8> = vec![0xFF, 0xFE];
        for unit in "PERFORMER \"Мара\"".encode_utf16() {
            utf16.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, encoding) = decode_sheet_bytes(&utf16);
        assert_eq!(text, "PERFORMER \"Мара\"");
        assert_eq!(encoding, "UTF-16LE");

        let mut utf16be: Vec<u8> = vec![0xFE, 0xFF];
        for unit in "FILE".encode_utf16() {
            utf16be.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_sheet_bytes(&utf16be).0, "FILE");

        let (_, encoding) = decode_sheet_bytes("TITLE \"Ok\"".as_bytes());
        assert_eq!(encoding, "UTF-8");
    }

    #[test]
    fn test_odd_utf16_tail_is_replaced() {
        let mut bytes: Vec<u8> = vec![0xFF, 0xFE];
        for unit in "FILE".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes.push(0x41);
        let (text, encoding) = decode_sheet_bytes(&bytes);
        assert_eq!(encoding, "UTF-16LE");
        assert_eq!(text, "FILE\u{FFFD}");
    }

    #[test]
    fn test_start_index_prefers_index_one() {
        let track = CueTrack {
            number: 2,
            data_type: "AUDIO".to_string(),
            indices: vec![
                CueIndex { number: 0, position: CuePosition::new(1, 0, 0) },
                CueIndex { number: 1, position: CuePosition::new(1, 2, 0) },
            ],
            ..Default::default()
        };
        assert_eq!(track.start_index().unwrap().position, CuePosition::new(1, 2, 0));

        let pregap_only = CueTrack {
            indices: vec![CueIndex { number: 0, position: CuePosition::new(0, 1, 0) }],
            ..Default::default()
        };
        assert_eq!(pregap_only.start_index().unwrap().number, 0);
    }
}
