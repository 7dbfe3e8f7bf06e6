//! Status readme rendering
//!
//! The status readme carries a generated section between two HTML comment
//! markers: the time of the last build, one shields.io badge per component
//! and the reason for the run in a collapsible block.

use chrono::{DateTime, Utc};

use crate::config::urls;
use crate::core::ledger::{BuildStatus, Ledger};

/// Opening marker of the generated section
pub const START_MARKER: &str = "<!-- START_BUILD_BADGE -->";
/// Closing marker of the generated section
pub const END_MARKER: &str = "<!-- END_BUILD_BADGE -->";

/// Escape a name for a shields.io static badge path
pub fn safe_url_name(name: &str) -> String {
    name.replace('-', "--")
        .replace('_', "__")
        .replace(' ', "_")
}

fn badge_tag(status: BuildStatus) -> &'static str {
    match status {
        BuildStatus::Success => "success-success",
        BuildStatus::Fail => "fail-critical",
        BuildStatus::Pending => "pending-yellow",
    }
}

/// Markdown badge linking a component to its registry page
pub fn badge_markdown(name: &str, status: BuildStatus) -> String {
    format!(
        "[![{name}]({}/{}-{}?style=flat-square)]({}/{name})",
        urls::SHIELDS_BADGE,
        safe_url_name(name),
        badge_tag(status),
        urls::REGISTRY_REPOSITORY,
    )
}

/// The generated section, markers included
pub fn status_section(ledger: &Ledger, built_at: DateTime<Utc>) -> String {
    let badges = ledger
        .last_build_status
        .iter()
        .map(|(name, status)| badge_markdown(name, *status))
        .collect::<Vec<_>>()
        .join("\n");

    [
        START_MARKER.to_string(),
        format!("## Last Build at: {}", built_at.format("%Y-%m-%d %H:%M:%S UTC")),
        "**Images**".to_string(),
        badges,
        "<details>".to_string(),
        "<summary>Reason</summary>".to_string(),
        ledger.last_build_reason.clone(),
        "</details>".to_string(),
        END_MARKER.to_string(),
    ]
    .join("\n\n")
}

/// Replace the generated section of a readme
///
/// Everything from the first start marker to the last end marker is
/// replaced. A readme without both markers gets the section appended.
pub fn render_status_section(readme: &str, ledger: &Ledger, built_at: DateTime<Utc>) -> String {
    let section = status_section(ledger, built_at);

    match (readme.find(START_MARKER), readme.rfind(END_MARKER)) {
        (Some(start), Some(end)) if start <= end => {
            let tail = &readme[end + END_MARKER.len()..];
            format!("{}{section}{tail}", &readme[..start])
        }
        _ => {
            let separator = if readme.is_empty() || readme.ends_with('\n') {
                ""
            } else {
                "\n"
            };
            format!("{readme}{separator}{section}\n")
        }
    }
}

/// Reason recorded when the caller gave none
pub fn build_reason(names: &[&str], builder_updated: bool) -> String {
    let cause = if builder_updated {
        "builder was updated"
    } else {
        "manual update"
    };
    format!("{} updated due to {cause}.", names.join(", "))
}
