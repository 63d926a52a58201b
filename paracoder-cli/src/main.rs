// paracoder-cli/src/main.rs
//
// Entry point of the `paracoder` binary.
//
// Parses the command line, hands it to the library and turns the maximum
// exit code of the batch into the exit status of the process.

use clap::Parser;
use paracoder_cli::Cli;
use std::process;

fn main() {
    let cli = Cli::parse();
    let exit_code = paracoder_cli::run(cli);
    process::exit(exit_code);
}
