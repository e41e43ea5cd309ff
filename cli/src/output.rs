//! Output formatting utilities for CLI commands

use colored::{ColoredString, Colorize};

/// Print success message
pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

/// Print info message
pub fn info(msg: &str) {
    eprintln!("{} {}", "ℹ".blue(), msg);
}

/// Print warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg);
}

/// Print a section header
pub fn header(title: &str) {
    println!("{}", title.bold());
}

/// Function name in a table row
pub fn name(name: &str) -> ColoredString {
    name.cyan()
}
