// ============================================================================
// paracoder-core/src/external/mod.rs
// ============================================================================
//
// EXTERNAL CAPABILITIES: Operating System Primitives Behind a Trait
//
// The engine needs two things from the operating system that differ per
// platform: splitting a command line into an argument vector the way the
// platform's shell would, and moving files to the user's trash. Both sit
// behind the OsNative trait so the engine can be tested with a recording
// implementation and run with the native one.
//
// KEY COMPONENTS:
// - OsNative: The capability trait consumed by the runner and scheduler
// - NativeOs: Platform implementation (shell-words / Windows rules, trash)
// - split_windows_command_line: CommandLineToArgvW compatible splitting
// - mocks: Recording implementation for tests

// ---- Internal crate imports ----
use crate::error::{CoreError, CoreResult, invalid_command};

// ---- External crate imports ----
use log::debug;

// ---- Standard library imports ----
use std::path::PathBuf;

// ============================================================================
// SUBMODULES
// ============================================================================

/// Test double for the OsNative capability
pub mod mocks;

// ============================================================================
// CAPABILITY TRAIT
// ============================================================================

/// Operating system primitives used by the recoding engine.
pub trait OsNative: Send + Sync {
    /// Splits one pipeline stage into program and arguments.
    fn tokenize(&self, command_line: &str) -> CoreResult<Vec<String>>;

    /// Moves the given paths to the trash.
    fn move_to_trash(&self, paths: &[PathBuf]) -> CoreResult<()>;

    /// Whether `move_to_trash` can succeed on this platform.
    fn supports_trash(&self) -> bool;
}

/// The OsNative implementation for the platform the binary was built for.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeOs;

impl OsNative for NativeOs {
    fn tokenize(&self, command_line: &str) -> CoreResult<Vec<String>> {
        #[cfg(windows)]
        let args = split_windows_command_line(command_line);

        #[cfg(not(windows))]
        let args = shell_words::split(command_line).map_err(|e| invalid_command(command_line, e.to_string()))?;

        if args.is_empty() {
            return Err(invalid_command(command_line, "empty command"));
        }
        debug!("Tokenized command: {:?}", args);
        Ok(args)
    }

    #[cfg(any(
        windows,
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    ))]
    fn move_to_trash(&self, paths: &[PathBuf]) -> CoreResult<()> {
        trash::delete_all(paths).map_err(|e| CoreError::Trash {
            path: paths.first().cloned().unwrap_or_default(),
            reason: e.to_string(),
        })
    }

    #[cfg(not(any(
        windows,
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    )))]
    fn move_to_trash(&self, _paths: &[PathBuf]) -> CoreResult<()> {
        Err(CoreError::TrashUnsupported)
    }

    fn supports_trash(&self) -> bool {
        cfg!(any(
            windows,
            target_os = "macos",
            target_os = "linux",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        ))
    }
}

// ============================================================================
// WINDOWS COMMAND LINE SPLITTING
// ============================================================================

/// Splits a command line following the `CommandLineToArgvW` rules.
///
/// - whitespace outside quotes separates arguments
/// - `2n` backslashes before a quote give `n` backslashes, the quote toggles
///   quoting
/// - `2n+1` backslashes before a quote give `n` backslashes and a literal
///   quote
/// - `""` inside quotes gives a literal quote
/// - backslashes not followed by a quote are literal
pub fn split_windows_command_line(command_line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut in_quotes = false;
    let mut backslashes = 0usize;
    let mut chars = command_line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                backslashes += 1;
                started = true;
            }
            '"' => {
                current.extend(std::iter::repeat_n('\\', backslashes / 2));
                if backslashes % 2 == 1 {
                    current.push('"');
                } else if in_quotes && chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = !in_quotes;
                }
                backslashes = 0;
                started = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                current.extend(std::iter::repeat_n('\\', backslashes));
                backslashes = 0;
                if started {
                    args.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.extend(std::iter::repeat_n('\\', backslashes));
                backslashes = 0;
                current.push(c);
                started = true;
            }
        }
    }

    current.extend(std::iter::repeat_n('\\', backslashes));
    if started {
        args.push(current);
    }
    args
}
