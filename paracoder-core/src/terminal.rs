//! Terminal status lines for paracoder.
//!
//! Per-unit progress is printed straight to the terminal, independent of the
//! log level, so the user always sees which source is being processed and
//! how it ended. Colors are dropped when `NO_COLOR` is set or the stream is
//! not a terminal.

use console::{Style, style};

/// Check if color should be used (respects NO_COLOR environment variable)
fn should_use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && console::colors_enabled()
}

fn paint(text: &str, style: Style) -> String {
    if should_use_color() {
        style.apply_to(text).to_string()
    } else {
        text.to_string()
    }
}

/// `Processing: <worker> <source>`, printed right before a pipeline starts.
pub fn print_processing(worker: &str, source: &str) {
    println!(
        "Processing: {} {}",
        paint(worker, Style::new().yellow()),
        paint(source, Style::new().blue().bold())
    );
}

pub fn print_completed(source: &str) {
    println!("Completed: {}", paint(source, Style::new().blue()));
}

pub fn print_unit_error(source: &str) {
    eprintln!(
        " {}",
        paint(&format!("Error on processing source file: {source}"), Style::new().red())
    );
}

pub fn print_missing_source(source: &str) {
    eprintln!("Source file doesn't exist: {}", paint(source, Style::new().red()));
}

pub fn print_dir(dir: &str) {
    println!("Processing dir: {}", paint(dir, Style::new().cyan()));
}

/// Prints an error message for the whole batch.
pub fn print_error(message: &str) {
    if should_use_color() {
        eprintln!("Error: {}", style(message).red());
    } else {
        eprintln!("Error: {message}");
    }
}

/// Closing lines of a batch.
pub fn print_summary(completed: usize, failed: usize, max_exit_code: i32) {
    println!();
    println!(
        "Units completed: {}, failed: {}",
        paint(&completed.to_string(), Style::new().green()),
        paint(&failed.to_string(), if failed > 0 { Style::new().red() } else { Style::new() })
    );
    println!("{}", paint(&format!("Max exit code: {max_exit_code}"), Style::new().blue()));
}
