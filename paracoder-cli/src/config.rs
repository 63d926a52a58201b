// ============================================================================
// paracoder-cli/src/config.rs
// ============================================================================
//
// COMMAND TEMPLATE CONFIGURATION: Locating and Loading paracoder_commands.toml
//
// The recoder needs a set of file extensions and a command template per
// extension. They come from a TOML file, looked up in this order:
//
// 1. The --config flag (or the PARACODER_CONFIG environment variable, which
//    clap folds into the same argument)
// 2. paracoder_commands.toml next to the executable
// 3. The defaults compiled into the binary
//
// KEY COMPONENTS:
// - ConfigSource: Where the active configuration came from
// - load_patterns: Resolves and parses the configuration

// ---- Internal crate imports ----
use crate::error::{CliErrorContext, CliResult};

// ---- External crate imports ----
use log::{debug, info};
use paracoder_core::{CoreError, PatternConfig};

// ---- Standard library imports ----
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up next to the executable.
pub const CONFIG_FILE_NAME: &str = "paracoder_commands.toml";

/// Configuration used when no file is found.
pub const DEFAULT_CONFIG: &str = include_str!("../config/paracoder_commands.toml");

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    BuiltIn,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::BuiltIn => write!(f, "built-in defaults"),
        }
    }
}

/// Parses configuration text.
pub fn parse_patterns(text: &str) -> CliResult<PatternConfig> {
    let patterns: PatternConfig =
        toml::from_str(text).map_err(|e| CoreError::Config(e.to_string()))?;
    let patterns = patterns.normalized();
    patterns.validate()?;
    Ok(patterns)
}

/// Resolves the configuration file and loads it.
///
/// An explicitly requested file must exist. The file next to the executable
/// is optional.
pub fn load_patterns(explicit: Option<&Path>) -> CliResult<(PatternConfig, ConfigSource)> {
    let candidate = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => beside_executable().filter(|path| path.is_file()),
    };

    let Some(path) = candidate else {
        debug!("No {} found, using built-in command templates", CONFIG_FILE_NAME);
        return Ok((parse_patterns(DEFAULT_CONFIG)?, ConfigSource::BuiltIn));
    };

    let text = fs::read_to_string(&path)
        .cli_with_context(|| format!("Failed to read configuration {}", path.display()))?;
    let patterns = parse_patterns(&text)
        .cli_with_context(|| format!("Invalid configuration {}", path.display()))?;
    info!("Loaded command templates from {}", path.display());
    Ok((patterns, ConfigSource::File(path)))
}

fn beside_executable() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_built_in_defaults_are_valid() {
        let patterns = parse_patterns(DEFAULT_CONFIG).unwrap();
        assert!(patterns.file_extensions.contains("cue"));
        assert!(patterns.file_extensions.contains("flac"));
        assert!(patterns.command_template.contains_key("any"));
        for ext in ["flac", "wav", "ape"] {
            let key = format!("cue_{}", ext);
            let template = &patterns.command_template[&key];
            assert!(template.contains("{{CUE_METADATA}}"));
            assert!(template.ends_with('"'));
        }
    }

    #[test]
    fn test_keys_are_lowercased() {
        let text = "file_extensions = [\"FLAC\", \".Wav\"]\n[command_template]\nANY = 'x \"{{F}}\"'\n";
        let patterns = parse_patterns(text).unwrap();
        assert!(patterns.file_extensions.contains("flac"));
        assert!(patterns.file_extensions.contains("wav"));
        assert!(patterns.command_template.contains_key("any"));
    }

    #[test]
    fn test_empty_configuration_is_rejected() {
        assert!(matches!(parse_patterns(""), Err(CoreError::Config(_))));
        assert!(matches!(
            parse_patterns("file_extensions = 3"),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_explicit_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("custom.toml");
        fs::write(&path, "file_extensions = [\"wav\"]\n[command_template]\nwav = 'cp \"{{F}}\" \"{{F}}.out\"'\n")?;

        let (patterns, source) = load_patterns(Some(&path))?;
        assert_eq!(source, ConfigSource::File(path.clone()));
        assert_eq!(patterns.file_extensions.len(), 1);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            load_patterns(Some(&missing)),
            Err(CoreError::OperationFailed(_))
        ));

        dir.close()?;
        Ok(())
    }
}
