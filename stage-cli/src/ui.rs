//! Decorated human output helpers

use colored::Colorize;
use std::fmt::Display;
use std::io::{self, Write};

pub fn success(w: &mut dyn Write, msg: impl Display) -> io::Result<()> {
    writeln!(w, "{} {}", "✓".green(), msg)
}

pub fn bullet(w: &mut dyn Write, msg: impl Display) -> io::Result<()> {
    writeln!(w, "{} {}", "●".green(), msg)
}

pub fn hint(w: &mut dyn Write, msg: impl Display) -> io::Result<()> {
    writeln!(w, "{}", format!("  {}", msg).dimmed())
}

/// `label value` with a bold label.
pub fn field(w: &mut dyn Write, label: &str, value: impl Display) -> io::Result<()> {
    writeln!(w, "{} {}", label.bold(), value)
}

pub fn rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", "─".repeat(50).dimmed())
}

/// One-line error report on stderr.
pub fn error(msg: impl Display) {
    eprintln!("{} {}", "Error:".red(), msg);
}

/// Relative age of a millisecond unix timestamp, e.g. `42s ago`, `3h ago`.
pub fn time_ago(now_ms: u64, timestamp_ms: u64) -> String {
    let seconds = now_ms.saturating_sub(timestamp_ms) / 1000;
    if seconds < 60 {
        format!("{}s ago", seconds)
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h ago", seconds / 3600)
    } else {
        format!("{}d ago", seconds / 86400)
    }
}

/// Current unix time in milliseconds.
pub fn now_ms() -> u64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or_default()
}
