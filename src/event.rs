//! Structured events emitted by the distributor on every workunit outcome.
//!
//! Consumers subscribe through [`crate::distributor::Distributor::subscribe`]
//! to build status displays or to assert on behaviour in tests. Payloads
//! and answers are carried in their canonical text form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::WorkunitId;

/// An event emitted by the distributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    HandshakeCompleted {
        name: String,
    },
    WorkunitDispatched {
        id: WorkunitId,
        worker: String,
        payload: String,
    },
    WorkunitCompleted {
        id: WorkunitId,
        payload: String,
        answer: String,
        elapsed_ms: i64,
    },
    WorkunitRequeued {
        id: WorkunitId,
        payload: String,
        cause: String,
    },
    StaleReport {
        id: WorkunitId,
        command: String,
    },
    /// An offer arrived but there was nothing to send.
    OfferDeclined {
        worker: String,
    },
    ConnectionClosed {
        reason: String,
    },
}
