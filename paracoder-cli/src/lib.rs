// paracoder-cli/src/lib.rs
//
// Library portion of the ParaCoder CLI application.
// Contains argument definitions, configuration loading, logging setup and
// the shutdown hook.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod shutdown;

// Re-export items needed by the binary or integration tests
pub use cli::Cli;
pub use config::{ConfigSource, load_patterns};
pub use error::{CliErrorContext, CliResult};
pub use logging::{get_timestamp, init_logging};
pub use shutdown::install_shutdown_hook;

use log::{debug, error, info};
use paracoder_core::{NativeOs, Recoder, global_children};
use std::sync::Arc;

/// Runs the recoder for parsed arguments and returns the process exit code.
pub fn run(cli: Cli) -> i32 {
    match prepare(&cli) {
        Ok(recoder) => recoder.recode(&cli.batch_params()),
        Err(e) => {
            error!("{}", e);
            paracoder_core::terminal::print_error(&e.to_string());
            e.exit_code()
        }
    }
}

fn prepare(cli: &Cli) -> CliResult<Recoder> {
    if let Some(path) = init_logging(cli.verbose, cli.log_dir.as_deref())? {
        info!("Logging to {}", path.display());
    }
    debug!("Arguments: {:?}", cli);

    let (patterns, source) = load_patterns(cli.config.as_deref())?;
    debug!(
        "Command templates from {}: {} extension(s), {} template(s)",
        source,
        patterns.file_extensions.len(),
        patterns.command_template.len()
    );

    install_shutdown_hook(global_children())?;
    Ok(Recoder::new(patterns, Arc::new(NativeOs)))
}
