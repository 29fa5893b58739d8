//! Core data model.
//!
//! A workunit is one dispatched attempt at a payload: an id handed to the
//! broker, the payload it carries, and the bookkeeping needed to settle it
//! when the worker reports back. Wire objects exchanged with the broker
//! live here too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Workunit
// ---------------------------------------------------------------------------

/// Newtype for workunit ids, `"{name}-{index:05}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkunitId(pub String);

impl WorkunitId {
    /// Format an id from the distributor name and a sequence number.
    pub fn new(prefix: &str, index: u64) -> Self {
        Self(format!("{prefix}-{index:05}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkunitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for WorkunitId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of a payload. Completed and failed are not states:
/// a unit is either dropped on success or goes back to `Unsent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Waiting in the unsent bag.
    Unsent,
    /// Dispatched to a worker, awaiting a report.
    Running,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Unsent => "unsent",
            Status::Running => "running",
        };
        write!(f, "{s}")
    }
}

/// A packaged workunit, ready to be turned into a dispatch order.
#[derive(Debug, Clone)]
pub struct Workunit<P> {
    pub id: WorkunitId,
    pub payload: P,
    /// Seconds; only a hint for the broker.
    pub estimated_duration: u64,
    /// MD5 of the payload's canonical text.
    pub content_fingerprint: String,
    /// Inline (`data:`) address carrying the payload text.
    pub address: String,
    pub status: Status,
}

/// Bookkeeping for a dispatched unit while it sits in the running map.
#[derive(Debug, Clone)]
pub struct RunningEntry<P> {
    pub payload: P,
    /// Worker id from the offer this unit was dispatched against.
    pub worker: String,
    pub dispatched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Wire objects
// ---------------------------------------------------------------------------

/// One `[fingerprint, address, name]` triple in a dispatch or report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(String, String, String)",
    into = "(String, String, String)"
)]
pub struct FileEntry {
    pub fingerprint: String,
    pub address: String,
    pub name: String,
}

impl FileEntry {
    pub fn new(
        fingerprint: impl Into<String>,
        address: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            address: address.into(),
            name: name.into(),
        }
    }
}

impl From<(String, String, String)> for FileEntry {
    fn from((fingerprint, address, name): (String, String, String)) -> Self {
        Self {
            fingerprint,
            address,
            name,
        }
    }
}

impl From<FileEntry> for (String, String, String) {
    fn from(entry: FileEntry) -> Self {
        (entry.fingerprint, entry.address, entry.name)
    }
}

/// The fixed program bundle referenced as the first file of every dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramBundle {
    pub fingerprint: String,
    pub address: String,
    pub file_name: String,
}

impl ProgramBundle {
    pub fn file_entry(&self) -> FileEntry {
        FileEntry::new(&self.fingerprint, &self.address, &self.file_name)
    }
}

/// Object carried by an outbound `DISPATCH`.
///
/// Field order is the order the broker sees them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOrder {
    pub id: WorkunitId,
    pub duration: u64,
    /// Program bundle first, per-unit input second.
    pub files: Vec<FileEntry>,
    pub upload: String,
    pub worker: String,
}

/// Object carried by an inbound `WORKER` offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOffer {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl WorkerOffer {
    /// Human-facing label: the worker's name, or its id when unnamed.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// An artifact listed in a completion report.
///
/// Reports come from remote workers, so entries that are not string
/// triples are kept as raw JSON and rejected during resolution instead of
/// failing the whole line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Artifact {
    Entry(FileEntry),
    Malformed(serde_json::Value),
}

/// Object carried by `WORKFINISHED`, `WORKFAILED` and `WORKREJECTED`.
///
/// Only `id` is required. A `files` value that is not a list becomes a
/// single malformed artifact (`null` means none), and `error` may be any
/// JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub id: WorkunitId,
    #[serde(default, deserialize_with = "artifacts")]
    pub files: Vec<Artifact>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl CompletionReport {
    /// The remote error message, if one was given and is not blank.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn artifacts<'de, D>(deserializer: D) -> Result<Vec<Artifact>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(D::Error::custom))
            .collect(),
        other => Ok(vec![Artifact::Malformed(other)]),
    }
}
