//! Log file location, ANSI stripping, and timestamps.
use std::fs;
use std::path::PathBuf;

/// Remove ANSI escape sequences so the log file holds plain text.
///
/// A CSI sequence (`ESC [`) runs until its final byte in `@`..=`~`; any
/// other escape drops just the character after `ESC`.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            chars.by_ref().find(|inner| ('@'..='~').contains(inner));
        }
    }
    out
}

/// `$XDG_CACHE_HOME/dotfiles-modules`, falling back to `~/.cache`.
/// Created on first use; `None` when that fails.
fn log_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".cache")))?;
    let dir = base.join("dotfiles-modules");
    fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Log file for one command, e.g. `build.log`.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    Some(log_dir()?.join(format!("{command}.log")))
}

/// Current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Current UTC time as `HH:MM:SS`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}
