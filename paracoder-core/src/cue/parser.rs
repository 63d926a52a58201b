// ============================================================================
// paracoder-core/src/cue/parser.rs
// ============================================================================
//
// CUE PARSER: Line Based Parsing of CUE Sheet Text
//
// Turns decoded sheet text into a CueSheet. Commands are case-insensitive,
// values may be quoted or bare, and commands that follow a TRACK line apply
// to that track. Unknown commands are skipped.
//
// KEY COMPONENTS:
// - parse_cue_sheet: Entry point used by read_cue_sheet
// - Value, FILE line and MSF position helpers

// ---- Internal crate imports ----
use super::{CueFile, CueIndex, CuePosition, CueSheet, CueTrack, FRAMES_PER_SECOND};
use crate::error::{CoreResult, cue_parse_error};

// ---- External crate imports ----
use log::debug;

// ---- Standard library imports ----
use std::path::Path;

/// Parses the text of a CUE sheet located at `path`.
///
/// `path` is only used for error reporting.
pub fn parse_cue_sheet(text: &str, path: &Path) -> CoreResult<CueSheet> {
    let mut sheet = CueSheet::default();
    let mut open_track_line: Option<usize> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = split_command(line);
        match command.to_ascii_uppercase().as_str() {
            "REM" => parse_rem(rest, &mut sheet),
            "TITLE" => {
                let value = parse_value(rest);
                match current_track(&mut sheet) {
                    Some(track) => track.title = Some(value),
                    None => sheet.title = Some(value),
                }
            }
            "PERFORMER" => {
                let value = parse_value(rest);
                match current_track(&mut sheet) {
                    Some(track) => track.performer = Some(value),
                    None => sheet.performer = Some(value),
                }
            }
            "SONGWRITER" => {
                let value = parse_value(rest);
                match current_track(&mut sheet) {
                    Some(track) => track.songwriter = Some(value),
                    None => sheet.songwriter = Some(value),
                }
            }
            "CATALOG" => sheet.catalog = Some(parse_value(rest)),
            "CDTEXTFILE" => sheet.cdtext_file = Some(parse_value(rest)),
            "FILE" => {
                close_track(&sheet, path, open_track_line.take())?;
                let (name, file_type) = parse_file_line(rest);
                if name.is_empty() {
                    return Err(cue_parse_error(path, line_no, "FILE without a file name"));
                }
                sheet.files.push(CueFile {
                    name,
                    file_type,
                    tracks: Vec::new(),
                });
            }
            "TRACK" => {
                close_track(&sheet, path, open_track_line.take())?;
                let mut parts = rest.split_whitespace();
                let number = parts
                    .next()
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or_else(|| cue_parse_error(path, line_no, "TRACK without a valid number"))?;
                let data_type = parts.next().unwrap_or_default().to_string();
                let file = sheet
                    .files
                    .last_mut()
                    .ok_or_else(|| cue_parse_error(path, line_no, "TRACK before any FILE"))?;
                file.tracks.push(CueTrack {
                    number,
                    data_type,
                    ..Default::default()
                });
                open_track_line = Some(line_no);
            }
            "INDEX" => {
                let mut parts = rest.split_whitespace();
                let number = parts
                    .next()
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or_else(|| cue_parse_error(path, line_no, "INDEX without a valid number"))?;
                let position = parts
                    .next()
                    .and_then(parse_position)
                    .ok_or_else(|| cue_parse_error(path, line_no, "INDEX without a valid mm:ss:ff position"))?;
                let track = current_track(&mut sheet)
                    .ok_or_else(|| cue_parse_error(path, line_no, "INDEX outside of a TRACK"))?;
                track.indices.push(CueIndex { number, position });
            }
            "PREGAP" | "POSTGAP" => {
                let position = parse_position(rest.trim())
                    .ok_or_else(|| cue_parse_error(path, line_no, format!("invalid {} position", command)))?;
                let is_pregap = command.eq_ignore_ascii_case("PREGAP");
                let track = current_track(&mut sheet)
                    .ok_or_else(|| cue_parse_error(path, line_no, format!("{} outside of a TRACK", command)))?;
                if is_pregap {
                    track.pregap = Some(position);
                } else {
                    track.postgap = Some(position);
                }
            }
            "FLAGS" => {
                if let Some(track) = current_track(&mut sheet) {
                    track.flags = rest.split_whitespace().map(str::to_string).collect();
                }
            }
            "ISRC" => {
                if let Some(track) = current_track(&mut sheet) {
                    track.isrc = Some(parse_value(rest));
                }
            }
            _ => debug!("Ignoring unknown CUE command '{}' in {} at line {}", command, path.display(), line_no),
        }
    }

    close_track(&sheet, path, open_track_line)?;
    Ok(sheet)
}

// ============================================================================
// HELPERS
// ============================================================================

fn current_track(sheet: &mut CueSheet) -> Option<&mut CueTrack> {
    sheet.files.last_mut().and_then(|file| file.tracks.last_mut())
}

/// A finished track must carry at least one INDEX.
fn close_track(sheet: &CueSheet, path: &Path, track_line: Option<usize>) -> CoreResult<()> {
    let Some(line) = track_line else {
        return Ok(());
    };
    let has_index = sheet
        .files
        .last()
        .and_then(|file| file.tracks.last())
        .is_some_and(|track| !track.indices.is_empty());
    if has_index {
        Ok(())
    } else {
        Err(cue_parse_error(path, line, "TRACK without any INDEX"))
    }
}

fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    }
}

/// Quoted value up to the closing quote, or the whole bare remainder.
fn parse_value(rest: &str) -> String {
    let rest = rest.trim();
    match rest.strip_prefix('"') {
        Some(quoted) => match quoted.find('"') {
            Some(end) => quoted[..end].to_string(),
            None => quoted.to_string(),
        },
        None => rest.to_string(),
    }
}

/// Splits `"name" TYPE` (or `name TYPE`) into name and type.
fn parse_file_line(rest: &str) -> (String, String) {
    let rest = rest.trim();
    if let Some(quoted) = rest.strip_prefix('"') {
        return match quoted.find('"') {
            Some(end) => (quoted[..end].to_string(), quoted[end + 1..].trim().to_string()),
            None => (quoted.to_string(), String::new()),
        };
    }
    match rest.rsplit_once(char::is_whitespace) {
        Some((name, file_type)) => (name.trim().to_string(), file_type.to_string()),
        None => (rest.to_string(), String::new()),
    }
}

fn parse_rem(rest: &str, sheet: &mut CueSheet) {
    let (key, value) = split_command(rest);
    let value = parse_value(value);
    match key.to_ascii_uppercase().as_str() {
        "GENRE" => sheet.genre = Some(value),
        "DATE" => sheet.year = parse_year(&value),
        "DISCID" => sheet.disc_id = Some(value),
        "COMMENT" => sheet.comment = Some(value),
        "DISCNUMBER" => sheet.disc_number = parse_count(&value),
        "TOTALDISCS" => sheet.total_discs = parse_count(&value),
        _ => debug!("Ignoring REM {}", key),
    }
}

/// Leading digits of a DATE value (`1998`, `1998-03-01`); -1 means absent.
fn parse_year(value: &str) -> Option<i32> {
    let digits: String = value.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i32>().ok().filter(|year| *year >= 0)
}

/// Disc counters; -1 and unparsable values mean absent.
fn parse_count(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

/// Parses an `mm:ss:ff` position.
fn parse_position(value: &str) -> Option<CuePosition> {
    let mut parts = value.split(':');
    let minutes = parts.next()?.trim().parse::<u32>().ok()?;
    let seconds = parts.next()?.trim().parse::<u32>().ok()?;
    let frames = parts.next()?.trim().parse::<u32>().ok()?;
    if parts.next().is_some() || seconds >= 60 || frames >= FRAMES_PER_SECOND {
        return None;
    }
    let position = CuePosition::new(minutes, seconds, frames);
    // Positions past one day cannot be cut from a file
    position.to_time()?;
    Some(position)
}
