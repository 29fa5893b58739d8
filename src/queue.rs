//! Work queue: the unsent bag and the running map.
//!
//! Every payload ever created is in exactly one place: the unsent bag, the
//! running map, or counted as completed. The distributor moves payloads
//! between these through [`WorkQueue::next_payload`],
//! [`WorkQueue::begin_run`], [`WorkQueue::resolve`],
//! [`WorkQueue::retire`] and [`WorkQueue::requeue`].

use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

use crate::codec::Payload;
use crate::error::{Error, Result};
use crate::model::{RunningEntry, WorkunitId};

/// Pluggable producer of new payloads, consulted when the unsent bag is empty.
///
/// Must be synchronous and should return at least one payload. An empty
/// return simply means there is nothing to send right now.
pub trait WorkSource {
    type Payload: Payload;

    fn generate(&mut self) -> Vec<Self::Payload>;
}

/// A source that never generates anything; work only comes from seeding.
#[derive(Debug)]
pub struct Manual<P>(std::marker::PhantomData<P>);

impl<P> Manual<P> {
    pub fn new() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<P> Default for Manual<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> WorkSource for Manual<P> {
    type Payload = P;

    fn generate(&mut self) -> Vec<P> {
        Vec::new()
    }
}

/// Unsent bag, running map and the id sequence for one distributor.
pub struct WorkQueue<S: WorkSource> {
    prefix: String,
    /// Last sequence number handed out. Ids start at 1.
    sequence: u64,
    unsent: Vec<S::Payload>,
    running: HashMap<WorkunitId, RunningEntry<S::Payload>>,
    source: S,
    created: u64,
    completed: u64,
}

impl<S: WorkSource> WorkQueue<S> {
    pub fn new(prefix: impl Into<String>, source: S) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: 0,
            unsent: Vec::new(),
            running: HashMap::new(),
            source,
            created: 0,
            completed: 0,
        }
    }

    /// Add payloads to the unsent bag directly.
    pub fn seed(&mut self, payloads: impl IntoIterator<Item = S::Payload>) {
        for payload in payloads {
            self.created += 1;
            self.unsent.push(payload);
        }
    }

    /// Generate work if the bag is empty. Returns whether anything is pending.
    pub fn ensure_pending(&mut self) -> bool {
        if self.unsent.is_empty() {
            let generated = self.source.generate();
            debug!(count = generated.len(), "generated new work");
            self.seed(generated);
        }
        !self.unsent.is_empty()
    }

    /// Pop one unsent payload, generating first if the bag is empty.
    pub fn next_payload(&mut self) -> Option<S::Payload> {
        self.ensure_pending();
        self.unsent.pop()
    }

    /// Allocate the next workunit id. Never reuses a value.
    pub fn next_id(&mut self) -> WorkunitId {
        self.sequence += 1;
        WorkunitId::new(&self.prefix, self.sequence)
    }

    /// Record `payload` as running under `id`.
    pub fn begin_run(&mut self, id: WorkunitId, payload: S::Payload, worker: impl Into<String>) {
        let entry = RunningEntry {
            payload,
            worker: worker.into(),
            dispatched_at: Utc::now(),
        };
        if let Some(previous) = self.running.insert(id.clone(), entry) {
            // Unreachable with ids from next_id; a displaced payload still
            // goes back to the bag.
            debug!(id = %id, "running entry replaced, requeueing previous payload");
            self.unsent.push(previous.payload);
        }
    }

    /// Remove and return the running entry for `id`.
    ///
    /// The caller must hand the payload to [`retire`](Self::retire) or
    /// [`requeue`](Self::requeue).
    pub fn resolve(&mut self, id: &str) -> Result<RunningEntry<S::Payload>> {
        self.running
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Account for a successfully completed payload.
    pub fn retire(&mut self, payload: S::Payload) -> S::Payload {
        self.completed += 1;
        payload
    }

    /// Put a payload back for a future, freshly identified dispatch.
    pub fn requeue(&mut self, payload: S::Payload) {
        self.unsent.push(payload);
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn unsent(&self) -> &[S::Payload] {
        &self.unsent
    }

    pub fn running(&self) -> &HashMap<WorkunitId, RunningEntry<S::Payload>> {
        &self.running
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.running.contains_key(id)
    }

    pub fn has_pending(&self) -> bool {
        !self.unsent.is_empty()
    }

    /// Payloads ever created (seeded or generated).
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Payloads retired after a validated success.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}
