// paracoder-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{ArgAction, Parser};
use paracoder_core::BatchParams;
use paracoder_core::config::DEFAULT_THREAD_COUNT;
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    name = "paracoder",
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "ParaCoder: Parallel batch recoder for lossless audio and CUE sheets",
    long_about = "Recodes lossless audio files and CUE sheet tracks to another format using \
                  multiple threads. Every source is turned into a command from a configurable \
                  template and run through an external transcoder."
)]
pub struct Cli {
    /// Files and directories to recode
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Recursively process all input directories
    #[arg(short, long, default_value_t = false)]
    pub recurse: bool,

    /// Give each recoded file the timestamp of its source
    #[arg(
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub preserve_file_timestamp: bool,

    /// Restore the timestamps of processed directories after the batch
    #[arg(
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub preserve_dir_timestamp: bool,

    /// Move successfully recoded sources to the trash (never CUE audio images)
    #[arg(short, long, default_value_t = false)]
    pub delete_to_trash: bool,

    /// Number of recode workers
    #[arg(
        short,
        long,
        value_name = "COUNT",
        default_value_t = DEFAULT_THREAD_COUNT,
        value_parser = clap::value_parser!(usize)
    )]
    pub thread_count: usize,

    /// Optional: TOML file with extensions and command templates.
    /// Can also be set via the PARACODER_CONFIG environment variable.
    #[arg(short, long, value_name = "FILE", env = "PARACODER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Optional: Directory for a log file of this run
    #[arg(long, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Batch parameters for the core library.
    ///
    /// An empty input list is passed through; the core reports it as a
    /// usage error.
    pub fn batch_params(&self) -> BatchParams {
        BatchParams::new(self.inputs.clone())
            .with_recurse(self.recurse)
            .with_preserve_file_timestamp(self.preserve_file_timestamp)
            .with_preserve_dir_timestamp(self.preserve_dir_timestamp)
            .with_delete_to_trash(self.delete_to_trash)
            .with_thread_count(self.thread_count)
    }
}
