//! Result resolver: turns a completion report into a domain answer.
//!
//! A successful resolution pairs the decoded answer with the payload that
//! produced it. Anything else hands the payload back inside [`Unresolved`]
//! together with the cause, and the caller requeues it.

use thiserror::Error;

use crate::codec::{self, CodecError, Payload};
use crate::model::{Artifact, CompletionReport};
use crate::protocol::ReportKind;

/// Why a workunit did not produce a usable answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkunitError {
    #[error("{kind}: {}", .message.as_deref().unwrap_or("no error given"))]
    Reported {
        kind: ReportKind,
        message: Option<String>,
    },

    #[error("worker reported error: {0}")]
    Remote(String),

    #[error("wrong number of files: expected 1, got {0}")]
    ArtifactCount(usize),

    #[error("malformed file entry: {0}")]
    MalformedArtifact(serde_json::Value),

    #[error("unsupported file location: {0}")]
    UnsupportedLocation(String),

    #[error("failed to decode answer: {0}")]
    Decode(#[from] CodecError),
}

/// A validated result.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<P> {
    pub payload: P,
    pub answer: P,
}

/// A report that could not be accepted; the payload must be requeued.
#[derive(Debug, Clone, PartialEq)]
pub struct Unresolved<P> {
    pub payload: P,
    pub cause: WorkunitError,
}

/// Validate `report` for the unit that carried `payload`.
pub fn resolve<P: Payload>(
    kind: ReportKind,
    report: &CompletionReport,
    payload: P,
) -> Result<Resolution<P>, Unresolved<P>> {
    match answer(kind, report) {
        Ok(answer) => Ok(Resolution { payload, answer }),
        Err(cause) => Err(Unresolved { payload, cause }),
    }
}

fn answer<P: Payload>(kind: ReportKind, report: &CompletionReport) -> Result<P, WorkunitError> {
    if kind != ReportKind::Finished {
        return Err(WorkunitError::Reported {
            kind,
            message: report.error_message(),
        });
    }
    if let Some(message) = report.error_message() {
        return Err(WorkunitError::Remote(message));
    }

    let [artifact] = report.files.as_slice() else {
        return Err(WorkunitError::ArtifactCount(report.files.len()));
    };
    let entry = match artifact {
        Artifact::Entry(entry) => entry,
        Artifact::Malformed(raw) => return Err(WorkunitError::MalformedArtifact(raw.clone())),
    };
    if !codec::is_inline(&entry.address) {
        return Err(WorkunitError::UnsupportedLocation(entry.address.clone()));
    }

    Ok(codec::decode(&entry.address)?)
}
