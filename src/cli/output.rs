//! Output formatting
//!
//! Status prefixes and the small renderers shared by the commands.

use chrono::{DateTime, Utc};

use crate::core::coordinator::{BatchReport, ComponentReport, Outcome};

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Human-readable UTC time for a Unix timestamp; `0` means never
pub fn format_timestamp(seconds: i64) -> String {
    if seconds <= 0 {
        return "never".to_string();
    }
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

/// One line describing a component outcome
pub fn component_line(report: &ComponentReport) -> String {
    match &report.outcome {
        Outcome::Success => format!(
            "{} {} built in {}s",
            status::SUCCESS,
            report.name,
            report.duration
        ),
        Outcome::Fail { error } => format!("{} {} failed: {error}", status::ERROR, report.name),
        Outcome::Skipped { reason } => {
            format!("{} {} skipped: {reason}", status::INFO, report.name)
        }
    }
}

/// Closing summary of a batch run
pub fn batch_summary(report: &BatchReport) -> String {
    let prefix = if report.all_failed() {
        status::ERROR
    } else if report.succeeded() < report.attempted() {
        status::WARNING
    } else {
        status::SUCCESS
    };
    let mut line = format!(
        "{prefix} Delivered {}/{} images",
        report.succeeded(),
        report.attempted()
    );
    if report.skipped() > 0 {
        line.push_str(&format!(", {} skipped by update policy", report.skipped()));
    }
    line
}
