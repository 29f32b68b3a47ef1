//! Framing of the four build-log channels.
//!
//! These are pure functions; the current working directory is passed in so
//! that command lines can be shortened without touching process state.

use std::path::{MAIN_SEPARATOR, Path};

/// Heading prefixes that get pushed down by three blank lines.
const HEADING_PREFIXES: [&str; 2] = ["### ", "## "];

/// `### (K of N) message`, preceded by three blank lines.
pub fn format_task(completed: u32, total: u32, message: &str) -> String {
    let line = format!("### ({} of {}) {}", completed, total, message.trim());
    format!("\n\n\n{}", line.trim())
}

/// `$ command`, preceded by one blank line, with `<cwd>/` removed.
pub fn format_command(message: &str, cwd: Option<&Path>) -> String {
    format!("\n$ {}", strip_cwd(message.trim(), cwd))
}

/// Raw passthrough. Headings get three leading blank lines and `$ ` lines
/// are framed like commands; anything else is returned unchanged.
pub fn format_raw(message: &str, cwd: Option<&Path>) -> String {
    if HEADING_PREFIXES.iter().any(|p| message.starts_with(p)) {
        return format!("\n\n\n{}", message.trim());
    }
    if message.starts_with("$ ") {
        return format!("\n{}", strip_cwd(message.trim(), cwd));
    }
    message.to_string()
}

pub fn format_error(message: &str) -> String {
    format!("Error: {}", message.trim())
}

/// Strip trailing whitespace from every line, as written to `buildlog.txt`.
pub fn strip_trailing_whitespace(text: &str) -> String {
    text.split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_cwd(message: &str, cwd: Option<&Path>) -> String {
    match cwd {
        Some(cwd) => {
            let prefix = format!("{}{}", cwd.display(), MAIN_SEPARATOR);
            message.replace(&prefix, "")
        }
        None => message.to_string(),
    }
}
