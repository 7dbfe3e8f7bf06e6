//! Build ledger
//!
//! The ledger is the persisted history of every component build: last status,
//! last successful build time, and an append-only log of attempts per image.
//!
//! Older writers produced other shapes (a single run-level `LastBuildTime`,
//! `Images` entries as lists of attempts, boolean statuses). They are all
//! accepted on deserialization and normalized into [`Ledger`] immediately, so
//! nothing downstream ever sees them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Status of the most recent build of a component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// Selected for the current run, not finished yet
    #[default]
    Pending,
    /// Last attempt succeeded
    Success,
    /// Last attempt failed
    Fail,
}

impl BuildStatus {
    /// Lowercase token used in the ledger and in badges
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Fail => "fail",
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<bool> for BuildStatus {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Fail
        }
    }
}

/// Build history of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Canonical component name
    #[serde(default)]
    pub name: String,

    /// Outcome of the latest attempt
    #[serde(default, deserialize_with = "status_flag_or_token")]
    pub status: BuildStatus,

    /// Completion time of the latest attempt (Unix seconds)
    #[serde(default)]
    pub last_build_time: i64,

    /// Duration of the latest attempt in seconds
    #[serde(default)]
    pub last_build_duration: i64,

    /// Container engine inspection of the latest successful image
    #[serde(default)]
    pub inspect: Option<Value>,

    /// Every attempt, keyed by completion time
    #[serde(default)]
    pub build_log: BTreeMap<String, bool>,
}

impl ImageRecord {
    /// Create an empty record for a component
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: BuildStatus::Pending,
            last_build_time: 0,
            last_build_duration: 0,
            inspect: None,
            build_log: BTreeMap::new(),
        }
    }
}

fn status_flag_or_token<'de, D>(deserializer: D) -> Result<BuildStatus, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StatusRepr {
        Flag(bool),
        Token(BuildStatus),
    }

    Ok(match StatusRepr::deserialize(deserializer)? {
        StatusRepr::Flag(flag) => BuildStatus::from(flag),
        StatusRepr::Token(status) => status,
    })
}

/// One finished build attempt, as reported by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct BuildAttempt {
    /// Start time (Unix seconds)
    pub started_at: i64,
    /// Completion time (Unix seconds)
    pub finished_at: i64,
    /// Whether validation, build, tests and push all passed
    pub success: bool,
    /// Inspection blob produced by a successful build
    pub inspect: Option<Value>,
}

/// Shape of `LastBuildTime` when writing a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeShape {
    /// One timestamp per component (canonical)
    #[default]
    PerComponent,
    /// A single timestamp for the most recent build of the run
    RunScalar,
}

/// The persisted build history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", from = "LedgerDocument")]
pub struct Ledger {
    /// Per-component build records
    pub images: BTreeMap<String, ImageRecord>,

    /// Last successful build time per component; `0` means never built
    pub last_build_time: BTreeMap<String, i64>,

    /// Status of the last attempt per component
    pub last_build_status: BTreeMap<String, BuildStatus>,

    /// Why the most recent batch ran
    pub last_build_reason: String,

    /// Revision of the builder that wrote this ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_revision: Option<String>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Last successful build time of a component, `0` if never built
    pub fn last_build_time(&self, name: &str) -> i64 {
        self.last_build_time.get(name).copied().unwrap_or(0)
    }

    /// Most recent successful build across all components
    pub fn latest_build_time(&self) -> i64 {
        self.last_build_time.values().copied().max().unwrap_or(0)
    }

    /// Mark a component as selected for the current run
    pub fn mark_pending(&mut self, name: &str) {
        self.last_build_status
            .insert(name.to_string(), BuildStatus::Pending);
    }

    /// Merge a finished attempt into the history
    ///
    /// The attempt is always appended to the image's build log. The per-component
    /// `LastBuildTime` only advances on success, so a failing component keeps
    /// showing up as stale. A failed attempt never clears a previous inspection.
    pub fn record_attempt(&mut self, name: &str, attempt: BuildAttempt) {
        let status = BuildStatus::from(attempt.success);
        let record = self
            .images
            .entry(name.to_string())
            .or_insert_with(|| ImageRecord::new(name));

        let key = unique_log_key(&record.build_log, attempt.finished_at);
        record.build_log.insert(key, attempt.success);
        record.status = status;
        record.last_build_time = attempt.finished_at;
        record.last_build_duration = (attempt.finished_at - attempt.started_at).max(0);
        if let Some(inspect) = attempt.inspect {
            record.inspect = Some(inspect);
        }

        self.last_build_status.insert(name.to_string(), status);
        if attempt.success {
            self.last_build_time
                .insert(name.to_string(), attempt.finished_at);
        } else {
            self.last_build_time.entry(name.to_string()).or_insert(0);
        }
    }

    /// Record the reason and builder revision before writing
    pub fn stamp(&mut self, reason: impl Into<String>, revision: impl Into<String>) {
        self.last_build_reason = reason.into();
        self.builder_revision = Some(revision.into());
    }

    /// Render the ledger as a JSON document in the requested shape
    pub fn to_document(&self, shape: TimeShape) -> Result<Value, serde_json::Error> {
        let mut document = serde_json::to_value(self)?;
        if shape == TimeShape::RunScalar {
            if let Some(map) = document.as_object_mut() {
                map.insert(
                    "LastBuildTime".to_string(),
                    Value::from(self.latest_build_time()),
                );
            }
        }
        Ok(document)
    }
}

/// Build-log keys are completion timestamps; a second attempt finishing in the
/// same second gets a `-N` suffix instead of overwriting the first.
fn unique_log_key(log: &BTreeMap<String, bool>, finished_at: i64) -> String {
    let base = finished_at.to_string();
    if !log.contains_key(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let key = format!("{base}-{n}");
        if !log.contains_key(&key) {
            return key;
        }
        n += 1;
    }
}

/// Any ledger shape ever written, before normalization
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LedgerDocument {
    #[serde(default)]
    images: BTreeMap<String, ImageEntry>,
    #[serde(default)]
    last_build_time: Option<BuildTimeField>,
    #[serde(default)]
    last_build_status: BTreeMap<String, BuildStatus>,
    #[serde(default)]
    last_build_reason: Option<ReasonField>,
    #[serde(default)]
    builder_revision: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BuildTimeField {
    PerComponent(BTreeMap<String, i64>),
    RunScalar(i64),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReasonField {
    Text(String),
    Words(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageEntry {
    Record(ImageRecord),
    Attempts(Vec<LegacyAttempt>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyAttempt {
    #[serde(deserialize_with = "status_flag_or_token")]
    status: BuildStatus,
    #[serde(default)]
    last_build_time: i64,
    #[serde(default)]
    inspect: Option<Value>,
}

impl From<LedgerDocument> for Ledger {
    fn from(doc: LedgerDocument) -> Self {
        let images: BTreeMap<String, ImageRecord> = doc
            .images
            .into_iter()
            .map(|(name, entry)| {
                let record = normalize_entry(&name, entry);
                (name, record)
            })
            .collect();

        let mut last_build_status = doc.last_build_status;
        for (name, record) in &images {
            last_build_status
                .entry(name.clone())
                .or_insert(record.status);
        }

        let mut last_build_time = match doc.last_build_time {
            Some(BuildTimeField::PerComponent(times)) => times,
            Some(BuildTimeField::RunScalar(at)) => last_build_status
                .iter()
                .map(|(name, status)| {
                    let time = if *status == BuildStatus::Success { at } else { 0 };
                    (name.clone(), time)
                })
                .collect(),
            None => BTreeMap::new(),
        };
        for (name, record) in &images {
            let fallback = if record.status == BuildStatus::Success {
                record.last_build_time
            } else {
                0
            };
            last_build_time.entry(name.clone()).or_insert(fallback);
        }

        let last_build_reason = match doc.last_build_reason {
            Some(ReasonField::Text(text)) => text,
            Some(ReasonField::Words(words)) => words.join(" "),
            None => String::new(),
        };

        Self {
            images,
            last_build_time,
            last_build_status,
            last_build_reason,
            builder_revision: doc.builder_revision,
        }
    }
}

fn normalize_entry(name: &str, entry: ImageEntry) -> ImageRecord {
    match entry {
        ImageEntry::Record(mut record) => {
            if record.name.is_empty() {
                record.name = name.to_string();
            }
            record
        }
        ImageEntry::Attempts(attempts) => {
            let mut record = ImageRecord::new(name);
            for attempt in attempts {
                let key = unique_log_key(&record.build_log, attempt.last_build_time);
                record
                    .build_log
                    .insert(key, attempt.status == BuildStatus::Success);
                record.status = attempt.status;
                record.last_build_time = attempt.last_build_time;
                if attempt.inspect.is_some() {
                    record.inspect = attempt.inspect;
                }
            }
            record
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn success(started_at: i64, finished_at: i64, inspect: Option<Value>) -> BuildAttempt {
        BuildAttempt {
            started_at,
            finished_at,
            success: true,
            inspect,
        }
    }

    fn failure(started_at: i64, finished_at: i64) -> BuildAttempt {
        BuildAttempt {
            started_at,
            finished_at,
            success: false,
            inspect: None,
        }
    }

    #[test]
    fn test_empty_ledger_never_built() {
        let ledger = Ledger::new();
        assert_eq!(ledger.last_build_time("hub.encoders.foo"), 0);
        assert_eq!(ledger.latest_build_time(), 0);
    }

    #[test]
    fn test_record_success_advances_time() {
        let mut ledger = Ledger::new();
        ledger.mark_pending("hub.encoders.foo");
        assert_eq!(
            ledger.last_build_status["hub.encoders.foo"],
            BuildStatus::Pending
        );

        ledger.record_attempt("hub.encoders.foo", success(100, 130, Some(json!({"Id": "sha256:1"}))));

        let record = &ledger.images["hub.encoders.foo"];
        assert_eq!(record.status, BuildStatus::Success);
        assert_eq!(record.last_build_time, 130);
        assert_eq!(record.last_build_duration, 30);
        assert_eq!(record.build_log.get("130"), Some(&true));
        assert_eq!(ledger.last_build_time("hub.encoders.foo"), 130);
        assert_eq!(
            ledger.last_build_status["hub.encoders.foo"],
            BuildStatus::Success
        );
    }

    #[test]
    fn test_failed_attempt_keeps_previous_time_and_inspect() {
        let mut ledger = Ledger::new();
        ledger.record_attempt("hub.a", success(10, 20, Some(json!({"Id": "old"}))));
        ledger.record_attempt("hub.a", failure(50, 55));

        let record = &ledger.images["hub.a"];
        assert_eq!(record.status, BuildStatus::Fail);
        assert_eq!(record.last_build_time, 55);
        assert_eq!(record.inspect, Some(json!({"Id": "old"})));
        assert_eq!(record.build_log.len(), 2);
        assert_eq!(record.build_log.get("55"), Some(&false));
        assert_eq!(ledger.last_build_time("hub.a"), 20);
        assert_eq!(ledger.last_build_status["hub.a"], BuildStatus::Fail);
    }

    #[test]
    fn test_failed_first_attempt_keeps_invariant() {
        let mut ledger = Ledger::new();
        ledger.record_attempt("hub.a", failure(1, 2));

        assert!(ledger.images.contains_key("hub.a"));
        assert_eq!(ledger.last_build_time.get("hub.a"), Some(&0));
    }

    #[test]
    fn test_same_second_attempts_both_logged() {
        let mut ledger = Ledger::new();
        ledger.record_attempt("hub.a", failure(5, 7));
        ledger.record_attempt("hub.a", success(7, 7, None));

        let log = &ledger.images["hub.a"].build_log;
        assert_eq!(log.len(), 2);
        assert_eq!(log.get("7"), Some(&false));
        assert_eq!(log.get("7-1"), Some(&true));
    }

    #[test]
    fn test_round_trip_preserves_logs_and_inspect() {
        let mut ledger = Ledger::new();
        let inspect = json!({
            "Id": "sha256:abc",
            "Config": {"Labels": {"ai.jina.hub.name": "foo"}},
            "RepoTags": ["jinaai/hub.encoders.foo:0.0.1", "jinaai/hub.encoders.foo:latest"]
        });
        ledger.record_attempt("hub.encoders.foo", success(1, 4, Some(inspect.clone())));
        ledger.record_attempt("hub.encoders.foo", failure(10, 12));
        ledger.record_attempt("hub.crafters.bar", failure(3, 3));
        ledger.stamp("manual", "abc1234");

        let text = serde_json::to_string(&ledger).unwrap();
        let parsed: Ledger = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed, ledger);
        assert_eq!(parsed.images["hub.encoders.foo"].inspect, Some(inspect));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), text);
    }

    #[test]
    fn test_document_keys() {
        let mut ledger = Ledger::new();
        ledger.record_attempt("hub.a", success(1, 2, None));
        ledger.stamp("why", "rev");

        let doc = ledger.to_document(TimeShape::PerComponent).unwrap();
        for key in [
            "Images",
            "LastBuildTime",
            "LastBuildStatus",
            "LastBuildReason",
            "BuilderRevision",
        ] {
            assert!(doc.get(key).is_some(), "missing {key}");
        }
        assert_eq!(doc["LastBuildTime"], json!({"hub.a": 2}));
        assert_eq!(doc["LastBuildStatus"], json!({"hub.a": "success"}));
    }

    #[test]
    fn test_scalar_document_shape_reads_back() {
        let mut ledger = Ledger::new();
        ledger.record_attempt("hub.a", success(1, 2, None));
        ledger.record_attempt("hub.b", success(3, 9, None));
        ledger.record_attempt("hub.c", failure(10, 11));

        let doc = ledger.to_document(TimeShape::RunScalar).unwrap();
        assert_eq!(doc["LastBuildTime"], json!(9));

        let parsed: Ledger = serde_json::from_value(doc).unwrap();
        assert_eq!(parsed.last_build_time("hub.a"), 9);
        assert_eq!(parsed.last_build_time("hub.b"), 9);
        assert_eq!(parsed.last_build_time("hub.c"), 0);
        assert!(parsed.last_build_time.contains_key("hub.c"));
    }

    #[test]
    fn test_legacy_attempt_lists_are_normalized() {
        let legacy = json!({
            "_id": 1,
            "Images": {
                "hub.encoders.foo": [
                    {"Status": true, "LastBuildTime": 100, "Inspect": {"Id": "one"}},
                    {"Status": true, "LastBuildTime": 200, "Inspect": {"Id": "two"}}
                ]
            },
            "LastBuildTime": {"hub.encoders.foo": 200},
            "LastBuildStatus": {"hub.encoders.foo": "success", "hub.crafters.bar": "fail"},
            "LastBuildReason": ["nightly", "build"],
            "BuilderRevision": "f00ba44"
        });

        let ledger: Ledger = serde_json::from_value(legacy).unwrap();
        let record = &ledger.images["hub.encoders.foo"];
        assert_eq!(record.name, "hub.encoders.foo");
        assert_eq!(record.status, BuildStatus::Success);
        assert_eq!(record.last_build_time, 200);
        assert_eq!(record.inspect, Some(json!({"Id": "two"})));
        assert_eq!(record.build_log.len(), 2);
        assert_eq!(ledger.last_build_status["hub.crafters.bar"], BuildStatus::Fail);
        assert_eq!(ledger.last_build_reason, "nightly build");
        assert_eq!(ledger.builder_revision.as_deref(), Some("f00ba44"));
    }

    #[test]
    fn test_boolean_status_and_missing_time_entry() {
        let doc = json!({
            "Images": {
                "hub.a": {"name": "hub.a", "status": false, "last_build_time": 7, "build_log": {"7": false}},
                "hub.b": {"status": true, "last_build_time": 8}
            },
            "LastBuildStatus": {}
        });

        let ledger: Ledger = serde_json::from_value(doc).unwrap();
        assert_eq!(ledger.images["hub.a"].status, BuildStatus::Fail);
        assert_eq!(ledger.images["hub.b"].name, "hub.b");
        assert_eq!(ledger.last_build_time("hub.a"), 0);
        assert_eq!(ledger.last_build_time("hub.b"), 8);
        assert!(ledger.last_build_time.contains_key("hub.a"));
        assert_eq!(ledger.last_build_status["hub.b"], BuildStatus::Success);
    }

    #[test]
    fn test_empty_document_is_empty_ledger() {
        let ledger: Ledger = serde_json::from_str("{}").unwrap();
        assert_eq!(ledger, Ledger::new());
    }
}
