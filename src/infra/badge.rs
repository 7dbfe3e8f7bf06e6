//! Status readme and image-count badge files

use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use crate::config::urls;
use crate::core::ledger::Ledger;
use crate::core::report;
use crate::error::ReportError;
use crate::infra::filesystem;

/// badgen.net URL showing the number of hub images
pub fn hub_badge_url(image_count: usize) -> String {
    format!("{}/{image_count}/cyan", urls::HUB_BADGE)
}

/// HTTP client for badge downloads
pub fn badge_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Download an SVG badge into `dest`
pub async fn download_badge(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), ReportError> {
    let download_error = |error: String| ReportError::Download {
        url: url.to_string(),
        error,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_error(e.to_string()))?;
    if !response.status().is_success() {
        return Err(download_error(format!("HTTP {}", response.status())));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| download_error(e.to_string()))?;

    filesystem::write_atomic(dest, &body)?;
    Ok(())
}

/// Refresh the image-count badge for the ledger's images
pub async fn update_hub_badge(client: &reqwest::Client, ledger: &Ledger, dest: &Path) -> Result<(), ReportError> {
    download_badge(client, &hub_badge_url(ledger.images.len()), dest).await?;
    tracing::info!(path = %dest.display(), "Hub badge updated");
    Ok(())
}

/// Rewrite the generated section of the status readme
///
/// A missing readme is created with just the generated section.
pub fn update_status_readme(path: &Path, ledger: &Ledger, built_at: DateTime<Utc>) -> Result<(), ReportError> {
    let current = filesystem::read_optional(path)?.unwrap_or_default();
    let rendered = report::render_status_section(&current, ledger, built_at);
    filesystem::write_atomic(path, rendered)?;
    tracing::info!(path = %path.display(), "Hub readme updated");
    Ok(())
}
