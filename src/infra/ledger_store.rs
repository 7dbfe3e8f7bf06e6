//! Ledger persistence
//!
//! A local JSON file and an optional remote JSON document endpoint. Both are
//! read whole and replaced whole. Every historical document shape is
//! normalized by [`Ledger`]'s deserializer, so callers only ever see the
//! canonical model.

use backoff::ExponentialBackoffBuilder;
use reqwest::StatusCode;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::defaults;
use crate::core::ledger::{Ledger, TimeShape};
use crate::core::settings::HubSettings;
use crate::error::LedgerError;
use crate::infra::filesystem;

/// Somewhere a ledger can be read from and written to
#[allow(async_fn_in_trait)]
pub trait LedgerStore {
    /// Where the ledger lives, for logs
    fn location(&self) -> String;

    /// The stored ledger, `None` when nothing has been stored yet
    async fn load(&self) -> Result<Option<Ledger>, LedgerError>;

    /// Replace the stored ledger
    async fn save(&self, ledger: &Ledger) -> Result<(), LedgerError>;
}

fn parse_ledger(text: &str, source_name: &str) -> Result<Ledger, LedgerError> {
    serde_json::from_str(text).map_err(|e| LedgerError::Parse {
        source_name: source_name.to_string(),
        error: e.to_string(),
    })
}

/// Ledger kept in a local JSON file
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    /// Store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for FileLedgerStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Option<Ledger>, LedgerError> {
        let content = filesystem::read_optional(&self.path).map_err(|e| LedgerError::Read {
            path: self.path.clone(),
            error: e.to_string(),
        })?;
        content
            .map(|text| parse_ledger(&text, &self.location()))
            .transpose()
    }

    async fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let write_error = |error: String| LedgerError::Write {
            path: self.path.clone(),
            error,
        };

        let document = ledger
            .to_document(TimeShape::PerComponent)
            .map_err(|e| write_error(e.to_string()))?;
        let text = serde_json::to_string_pretty(&document).map_err(|e| write_error(e.to_string()))?;
        filesystem::write_atomic(&self.path, text).map_err(|e| write_error(e.to_string()))
    }
}

/// Retry schedule for the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// First delay between attempts
    pub initial_interval: Duration,
    /// Give up once this much time has passed
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_elapsed: Duration::from_secs(defaults::REMOTE_RETRY_SECS),
        }
    }
}

/// Ledger kept as a JSON document behind an HTTP endpoint
///
/// `GET` returns the document (404 when none exists yet) and `PUT` replaces
/// it. Server errors and connection failures are retried with exponential
/// backoff; client errors are not.
#[derive(Debug, Clone)]
pub struct RemoteLedgerStore {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    shape: TimeShape,
    retry: RetryPolicy,
}

impl RemoteLedgerStore {
    /// Store at `url`, authenticating with `token` when given
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            url: url.into(),
            token,
            shape: TimeShape::PerComponent,
            retry: RetryPolicy::default(),
        }
    }

    /// Write documents with the given `LastBuildTime` shape
    pub fn with_shape(mut self, shape: TimeShape) -> Self {
        self.shape = shape;
        self
    }

    /// Use a different retry schedule
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn remote_error(&self, error: impl ToString) -> LedgerError {
        LedgerError::Remote {
            url: self.url.clone(),
            error: error.to_string(),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn backoff(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry.initial_interval)
            .with_max_elapsed_time(Some(self.retry.max_elapsed))
            .build()
    }

    /// Classify a failed response: 5xx and 429 are worth retrying
    fn status_error(&self, status: StatusCode) -> backoff::Error<LedgerError> {
        let error = self.remote_error(format!("HTTP {status}"));
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            backoff::Error::transient(error)
        } else {
            backoff::Error::permanent(error)
        }
    }

    async fn fetch_once(&self) -> Result<Option<Ledger>, backoff::Error<LedgerError>> {
        let response = self
            .authorize(self.client.get(&self.url))
            .send()
            .await
            .map_err(|e| backoff::Error::transient(self.remote_error(e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.status_error(status));
        }

        let text = response
            .text()
            .await
            .map_err(|e| backoff::Error::transient(self.remote_error(e)))?;
        if text.trim().is_empty() || text.trim() == "null" {
            return Ok(None);
        }
        parse_ledger(&text, &self.url)
            .map(Some)
            .map_err(backoff::Error::permanent)
    }

    async fn put_once(&self, document: &Value) -> Result<(), backoff::Error<LedgerError>> {
        let response = self
            .authorize(self.client.put(&self.url))
            .json(document)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(self.remote_error(e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.status_error(status))
        }
    }
}

impl LedgerStore for RemoteLedgerStore {
    fn location(&self) -> String {
        self.url.clone()
    }

    async fn load(&self) -> Result<Option<Ledger>, LedgerError> {
        backoff::future::retry(self.backoff(), || self.fetch_once()).await
    }

    async fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let document = ledger
            .to_document(self.shape)
            .map_err(|e| self.remote_error(e))?;
        backoff::future::retry(self.backoff(), || self.put_once(&document)).await
    }
}

/// Outcome of writing the ledger to every configured store
#[derive(Debug)]
pub struct PersistReport {
    /// Local file write
    pub local: Result<(), LedgerError>,
    /// Remote write, `None` when no remote store is configured
    pub remote: Option<Result<(), LedgerError>>,
}

impl PersistReport {
    /// Whether every attempted write succeeded
    pub fn is_complete(&self) -> bool {
        self.local.is_ok() && self.remote.as_ref().map_or(true, Result::is_ok)
    }
}

/// Local and remote stores used together
#[derive(Debug, Clone)]
pub struct LedgerPersistence {
    local: FileLedgerStore,
    remote: Option<RemoteLedgerStore>,
}

impl LedgerPersistence {
    /// Compose from explicit stores
    pub fn new(local: FileLedgerStore, remote: Option<RemoteLedgerStore>) -> Self {
        Self { local, remote }
    }

    /// Stores described by settings; `remote_url` and `token` override the file
    pub fn from_settings(
        root: &Path,
        settings: &HubSettings,
        remote_url: Option<String>,
        token: Option<String>,
    ) -> Self {
        let local = FileLedgerStore::new(settings.ledger_path(root));
        let shape = if settings.ledger.scalar_last_build_time {
            TimeShape::RunScalar
        } else {
            TimeShape::PerComponent
        };
        let remote = remote_url
            .or_else(|| settings.ledger.remote_url.clone())
            .map(|url| RemoteLedgerStore::new(url, token).with_shape(shape));
        Self::new(local, remote)
    }

    /// Drop the remote store
    pub fn without_remote(mut self) -> Self {
        self.remote = None;
        self
    }

    /// Local store
    pub fn local(&self) -> &FileLedgerStore {
        &self.local
    }

    /// Remote store, if configured
    pub fn remote(&self) -> Option<&RemoteLedgerStore> {
        self.remote.as_ref()
    }

    /// Read the ledger: remote first, then local, else empty
    ///
    /// Failures are warnings; the run continues with what could be read.
    pub async fn load(&self) -> Ledger {
        if let Some(remote) = &self.remote {
            match remote.load().await {
                Ok(Some(ledger)) => {
                    tracing::info!(source = %remote.location(), "Loaded build history");
                    return ledger;
                }
                Ok(None) => tracing::info!(source = %remote.location(), "No remote build history yet"),
                Err(e) => tracing::warn!("{e}"),
            }
        }

        match self.local.load().await {
            Ok(Some(ledger)) => {
                tracing::info!(source = %self.local.location(), "Loaded build history");
                return ledger;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("{e}"),
        }

        tracing::warn!(
            local = %self.local.location(),
            "Can't load build history, starting from an empty ledger"
        );
        Ledger::new()
    }

    /// Stamp the builder revision and write to every store independently
    pub async fn save(&self, ledger: &mut Ledger, revision: &str) -> PersistReport {
        ledger.builder_revision = Some(revision.to_string());

        let local = self.local.save(ledger).await;
        match &local {
            Ok(()) => tracing::info!(path = %self.local.location(), "History updated"),
            Err(e) => tracing::warn!("{e}"),
        }

        let remote = match &self.remote {
            Some(store) => {
                let result = store.save(ledger).await;
                match &result {
                    Ok(()) => tracing::info!(url = %store.location(), "History updated"),
                    Err(e) => tracing::warn!("{e}"),
                }
                Some(result)
            }
            None => None,
        };

        PersistReport { local, remote }
    }
}
