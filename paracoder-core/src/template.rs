// ============================================================================
// paracoder-core/src/template.rs
// ============================================================================
//
// COMMAND TEMPLATES: Turning Sources into Command Lines
//
// A command template is a plain string with `{{...}}` placeholders, chosen
// by the source's extension. Filling it is a pure string transform: nothing
// here touches the filesystem or starts a process.
//
// Placeholders for every source:
//   {{F}} full path, {{D}} prefix/root, {{P}} parent path without the
//   prefix (with a trailing separator), {{N}} base name without extension
// Additional placeholders for CUE tracks:
//   {{CUE_ST}} / {{CUE_ET}} start and end time (HH:MM:SS.mmm),
//   {{CUE_NUM}} two digit track number, {{CUE_TITLE}} sanitized title,
//   {{CUE_METADATA}} transcoder `-metadata` flags
//
// KEY COMPONENTS:
// - CommandTemplates: Template lookup with the `any` fallback
// - cue_metadata / sanitize_file_name / format_cue_time: CUE helpers
// - extract_target_path: Recovers the output path from a command line

// ---- Internal crate imports ----
use crate::config::{ANY_TEMPLATE_KEY, CUE_TEMPLATE_PREFIX, PatternConfig};
use crate::cue::CueTrackPayload;
use crate::error::{CoreError, CoreResult};

// ---- External crate imports ----
use chrono::NaiveTime;

// ---- Standard library imports ----
use std::collections::HashMap;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

// ============================================================================
// TEMPLATE LOOKUP AND FILLING
// ============================================================================

/// Command templates keyed by lowercase extension, `any` or `cue_<ext>`.
#[derive(Debug, Clone, Default)]
pub struct CommandTemplates {
    templates: HashMap<String, String>,
}

impl CommandTemplates {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    pub fn from_config(config: &PatternConfig) -> Self {
        Self::new(config.command_template.clone())
    }

    /// Template for `key`, or the `any` template when `key` has none.
    pub fn template_for(&self, key: &str) -> CoreResult<&str> {
        self.templates
            .get(key)
            .or_else(|| self.templates.get(ANY_TEMPLATE_KEY))
            .map(String::as_str)
            .ok_or_else(|| CoreError::MissingTemplate(key.to_string()))
    }

    /// Builds the command for a plain source file.
    pub fn build_command(&self, extension: &str, file_path: &Path) -> CoreResult<String> {
        let template = self.template_for(&extension.to_lowercase())?;
        Ok(fill_path_placeholders(template, file_path))
    }

    /// Builds the command for one CUE track; `extension` is the audio
    /// image's extension.
    pub fn build_cue_command(&self, extension: &str, payload: &CueTrackPayload) -> CoreResult<String> {
        let key = format!("{}{}", CUE_TEMPLATE_PREFIX, extension.to_lowercase());
        let template = self.template_for(&key)?;
        let title = payload
            .title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Track {:02}", payload.track_number));

        Ok(fill_path_placeholders(template, &payload.audio_path)
            .replace("{{CUE_ST}}", &format_cue_time(payload.start_time))
            .replace("{{CUE_ET}}", &format_cue_time(payload.end_time))
            .replace("{{CUE_METADATA}}", &cue_metadata(payload))
            .replace("{{CUE_NUM}}", &format!("{:02}", payload.track_number))
            .replace("{{CUE_TITLE}}", &sanitize_file_name(&title)))
    }
}

fn fill_path_placeholders(template: &str, file_path: &Path) -> String {
    let parts = PathParts::of(file_path);
    template
        .replace("{{F}}", &file_path.to_string_lossy())
        .replace("{{D}}", &parts.prefix)
        .replace("{{P}}", &parts.parent)
        .replace("{{N}}", &parts.base_name)
}

/// Pieces of a path as the path placeholders expose them.
#[derive(Debug, Default, PartialEq, Eq)]
struct PathParts {
    prefix: String,
    parent: String,
    base_name: String,
}

impl PathParts {
    fn of(path: &Path) -> Self {
        let mut parts = PathParts::default();
        if let Some(parent) = path.parent() {
            for component in parent.components() {
                match component {
                    Component::Prefix(prefix) => parts.prefix.push_str(&prefix.as_os_str().to_string_lossy()),
                    Component::RootDir => parts.prefix.push(MAIN_SEPARATOR),
                    other => {
                        parts.parent.push_str(&other.as_os_str().to_string_lossy());
                        parts.parent.push(MAIN_SEPARATOR);
                    }
                }
            }
        }
        parts.base_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        parts
    }
}

// ============================================================================
// CUE HELPERS
// ============================================================================

/// Formats a track time as `HH:MM:SS.mmm`.
pub fn format_cue_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S%.3f").to_string()
}

/// Builds the `-metadata KEY="value"` flags of a track.
///
/// Absent and blank fields are left out. The result starts and ends with
/// one space so it can be dropped between other arguments.
pub fn cue_metadata(payload: &CueTrackPayload) -> String {
    let fields: [(&str, Option<String>); 11] = [
        ("ARTIST", payload.performer.clone()),
        ("ALBUM", payload.album.clone()),
        ("TITLE", payload.title.clone()),
        ("TRACK", Some(format!("{:02}", payload.track_number))),
        ("TOTALTRACKS", Some(format!("{:02}", payload.total_tracks))),
        ("DISCNUMBER", payload.disc_number.map(|n| n.to_string())),
        ("TOTALDISCS", payload.total_discs.map(|n| n.to_string())),
        ("GENRE", payload.genre.clone()),
        ("DATE", payload.year.map(|year| year.to_string())),
        ("COMMENT", payload.comment.clone()),
        ("DISCID", payload.disc_id.clone()),
    ];

    let flags: Vec<String> = fields
        .into_iter()
        .filter_map(|(key, value)| value.filter(|v| !v.trim().is_empty()).map(|v| (key, v)))
        .map(|(key, value)| format!("-metadata {}=\"{}\"", key, escape_quoted(&value)))
        .collect();

    format!(" {} ", flags.join(" "))
}

/// Escapes a value for a double-quoted argument of the native tokenizer.
fn escape_quoted(value: &str) -> String {
    if cfg!(windows) {
        escape_windows_quoted(value)
    } else {
        escape_posix_quoted(value)
    }
}

/// Shell-word double quotes: `\` and `"` are escaped with a backslash.
fn escape_posix_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `CommandLineToArgvW` double quotes: backslashes are literal unless they
/// precede a quote, so only runs before a quote or the closing quote are
/// doubled.
fn escape_windows_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut backslashes = 0;
    for c in value.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                escaped.push_str(&"\\".repeat(backslashes * 2 + 1));
                escaped.push('"');
                backslashes = 0;
            }
            other => {
                escaped.push_str(&"\\".repeat(backslashes));
                escaped.push(other);
                backslashes = 0;
            }
        }
    }
    escaped.push_str(&"\\".repeat(backslashes * 2));
    escaped
}

/// Replaces characters that are illegal in file names with look-alikes.
///
/// Applying it to an already sanitized name changes nothing.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\t' => ' ',
            '"' => '″',
            '/' => '╱',
            '\\' => '⧹',
            '|' => '￨',
            '?' => '？',
            ':' => '∶',
            '*' => '∗',
            '<' => '˂',
            '>' => '˃',
            other => other,
        })
        .collect()
}

// ============================================================================
// TARGET EXTRACTION
// ============================================================================

/// Returns the last double-quoted token of a command line.
///
/// Templates are expected to end with the quoted output path; the
/// scheduler needs it to copy the source timestamp onto the target.
pub fn extract_target_path(command: &str) -> CoreResult<PathBuf> {
    let not_found = || CoreError::TargetNotFound(command.to_string());
    let body = command.trim_end().strip_suffix('"').ok_or_else(not_found)?;
    let start = body.rfind('"').ok_or_else(not_found)?;
    let target = &body[start + 1..];
    if target.is_empty() {
        return Err(not_found());
    }
    Ok(PathBuf::from(target))
}
