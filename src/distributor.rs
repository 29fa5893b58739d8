//! The protocol state machine.
//!
//! A [`Distributor`] owns the work queue and the connection state, and
//! reacts to one inbound line at a time. It performs no I/O: every call
//! returns the commands to write back, and the session loop writes them.
//! Any fatal error moves the connection to [`ConnectionState::Closed`] and
//! every later line is refused.

use chrono::Utc;
use opentelemetry::KeyValue;
use secrecy::SecretString;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec::{self, Payload as _};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::model::{
    CompletionReport, DispatchOrder, FileEntry, ProgramBundle, Status, WorkerOffer, Workunit,
};
use crate::protocol::{Inbound, Outbound, ProtocolError, ReportKind};
use crate::queue::{WorkQueue, WorkSource};
use crate::resolver::{self, Resolution, Unresolved};
use crate::telemetry::{metrics, work};

/// Connection lifecycle. Dispatch only happens in `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    AwaitingHandshake,
    Ready,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingHandshake => "awaiting_handshake",
            ConnectionState::Ready => "ready",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Static identity of a distributor: who it says it is and what it ships.
#[derive(Debug, Clone)]
pub struct DistributorSettings {
    /// Sent in `HELLO` and used as the workunit id prefix.
    pub name: String,
    pub credential: SecretString,
    pub bundle: ProgramBundle,
    /// Address scheme workers upload their output to.
    pub upload: String,
}

/// How a report was settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement<P> {
    Completed(Resolution<P>),
    Requeued(Unresolved<P>),
    /// The id was not running; nothing changed.
    Stale,
}

impl<P> Settlement<P> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Settlement::Completed(_))
    }
}

pub struct Distributor<S: WorkSource> {
    settings: DistributorSettings,
    queue: WorkQueue<S>,
    state: ConnectionState,
    /// Set once `HAVEWORK` has gone out since the last inbound line.
    have_work_sent: bool,
    events: Option<mpsc::UnboundedSender<Event>>,
    event_seq: u64,
}

impl<S: WorkSource> Distributor<S> {
    pub fn new(settings: DistributorSettings, source: S) -> Self {
        let queue = WorkQueue::new(settings.name.clone(), source);
        Self {
            settings,
            queue,
            state: ConnectionState::Connecting,
            have_work_sent: false,
            events: None,
            event_seq: 0,
        }
    }

    /// Receive every subsequent [`Event`] on the returned channel.
    ///
    /// Replaces any earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn settings(&self) -> &DistributorSettings {
        &self.settings
    }

    pub fn queue(&self) -> &WorkQueue<S> {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut WorkQueue<S> {
        &mut self.queue
    }

    /// The transport is up; wait for the broker's greeting.
    pub fn connected(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::AwaitingHandshake;
        }
    }

    /// Mark the connection closed. Further lines are refused.
    pub fn close(&mut self, reason: &str) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closed;
            info!(
                reason,
                running = self.queue.running().len(),
                unsent = self.queue.unsent().len(),
                "connection closed"
            );
            self.emit(EventKind::ConnectionClosed {
                reason: reason.to_string(),
            });
        }
    }

    /// Parse and handle one line. Fatal errors close the connection.
    pub fn handle_line(&mut self, line: &str) -> Result<Vec<Outbound>> {
        let result = Inbound::parse(line)
            .map_err(Error::from)
            .and_then(|inbound| self.handle(inbound));
        if let Err(ref e) = result {
            self.close(&e.to_string());
        }
        result
    }

    /// Handle one parsed command.
    pub fn handle(&mut self, inbound: Inbound) -> Result<Vec<Outbound>> {
        if self.state == ConnectionState::Closed {
            return Err(ProtocolError::Closed.into());
        }
        metrics::lines_received().add(1, &[KeyValue::new("command", inbound.command())]);
        debug!(command = inbound.command(), state = %self.state, "received");

        // A new line arrived, so a fresh HAVEWORK is allowed again.
        self.have_work_sent = false;
        let mut out = Vec::new();

        match inbound {
            Inbound::Err(message) => return Err(Error::Broker(message)),
            Inbound::Hello => {
                out.push(Outbound::Hello {
                    name: self.settings.name.clone(),
                    credential: self.settings.credential.clone(),
                });
                self.state = ConnectionState::Ready;
                info!(name = %self.settings.name, "handshake completed");
                self.emit(EventKind::HandshakeCompleted {
                    name: self.settings.name.clone(),
                });
                out.extend(self.request_work());
            }
            Inbound::NewWorker | Inbound::Ok => {
                self.require_ready(&inbound)?;
                out.extend(self.request_work());
            }
            Inbound::NoWorkers | Inbound::WorkAccepted => {
                self.require_ready(&inbound)?;
            }
            Inbound::Worker(ref offer) => {
                self.require_ready(&inbound)?;
                out.extend(self.dispatch(offer));
                out.extend(self.request_work());
            }
            Inbound::Report { kind, ref report } => {
                self.require_ready(&inbound)?;
                self.settle(kind, report);
                out.extend(self.request_work());
            }
        }

        Ok(out)
    }

    /// Make sure work is pending and, if so, ask the broker for a worker.
    ///
    /// Emits at most one `HAVEWORK` between two inbound lines; a repeated
    /// call with no new input returns `None` and generates nothing.
    pub fn request_work(&mut self) -> Option<Outbound> {
        if !self.queue.ensure_pending() {
            debug!("no work pending");
            return None;
        }
        if self.have_work_sent {
            return None;
        }
        self.have_work_sent = true;
        Some(Outbound::HaveWork)
    }

    /// Package one unsent payload for `offer`.
    fn dispatch(&mut self, offer: &WorkerOffer) -> Option<Outbound> {
        let Some(payload) = self.queue.next_payload() else {
            info!(worker = offer.label(), "worker offered but no work to send");
            self.emit(EventKind::OfferDeclined {
                worker: offer.id.clone(),
            });
            return None;
        };

        let unit = self.package(payload);
        let order = self.order_for(&unit, offer);
        info!(
            id = %unit.id,
            worker = offer.label(),
            payload = %unit.payload,
            "sending workunit"
        );
        self.emit(EventKind::WorkunitDispatched {
            id: unit.id.clone(),
            worker: offer.id.clone(),
            payload: unit.payload.to_string(),
        });
        metrics::workunits_dispatched().add(1, &[]);

        self.queue.begin_run(unit.id, unit.payload, offer.id.clone());
        Some(Outbound::Dispatch(order))
    }

    fn package(&mut self, payload: S::Payload) -> Workunit<S::Payload> {
        let encoded = codec::encode(&payload);
        Workunit {
            id: self.queue.next_id(),
            estimated_duration: payload.estimated_duration(),
            payload,
            content_fingerprint: encoded.fingerprint,
            address: encoded.address,
            status: Status::Running,
        }
    }

    fn order_for(&self, unit: &Workunit<S::Payload>, offer: &WorkerOffer) -> DispatchOrder {
        DispatchOrder {
            id: unit.id.clone(),
            duration: unit.estimated_duration,
            files: vec![
                self.settings.bundle.file_entry(),
                FileEntry::new(
                    &unit.content_fingerprint,
                    &unit.address,
                    format!("temp/{}", unit.id),
                ),
            ],
            upload: self.settings.upload.clone(),
            worker: offer.id.clone(),
        }
    }

    /// Settle a report against the running map.
    pub fn settle(
        &mut self,
        kind: ReportKind,
        report: &CompletionReport,
    ) -> Settlement<S::Payload> {
        let span = work::workunit_span(&report.id, kind.command());

        let entry = match self.queue.resolve(report.id.as_str()) {
            Ok(entry) => entry,
            Err(_) => {
                span.in_scope(|| warn!(id = %report.id, report = %kind, "workunit not running"));
                work::record_outcome(&span, "stale");
                metrics::stale_reports().add(1, &[]);
                self.emit(EventKind::StaleReport {
                    id: report.id.clone(),
                    command: kind.command().to_string(),
                });
                return Settlement::Stale;
            }
        };
        let elapsed_ms = (Utc::now() - entry.dispatched_at).num_milliseconds();

        match resolver::resolve(kind, report, entry.payload) {
            Ok(Resolution { payload, answer }) => {
                span.in_scope(|| {
                    info!(
                        id = %report.id,
                        worker = %entry.worker,
                        elapsed_ms,
                        "{kind}: {}, {payload} -> {answer}",
                        report.id
                    )
                });
                work::record_outcome(&span, "completed");
                metrics::workunits_completed().add(1, &[]);
                self.emit(EventKind::WorkunitCompleted {
                    id: report.id.clone(),
                    payload: payload.to_string(),
                    answer: answer.to_string(),
                    elapsed_ms,
                });
                let payload = self.queue.retire(payload);
                Settlement::Completed(Resolution { payload, answer })
            }
            Err(unresolved) => {
                span.in_scope(|| {
                    warn!(
                        id = %report.id,
                        worker = %entry.worker,
                        cause = %unresolved.cause,
                        "{kind}: {}, {} -> ?, requeueing",
                        report.id,
                        unresolved.payload
                    )
                });
                work::record_outcome(&span, "requeued");
                metrics::workunits_requeued()
                    .add(1, &[KeyValue::new("command", kind.command())]);
                self.emit(EventKind::WorkunitRequeued {
                    id: report.id.clone(),
                    payload: unresolved.payload.to_string(),
                    cause: unresolved.cause.to_string(),
                });
                self.queue.requeue(unresolved.payload.clone());
                Settlement::Requeued(unresolved)
            }
        }
    }

    fn require_ready(&self, inbound: &Inbound) -> Result<()> {
        match self.state {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Closed => Err(ProtocolError::Closed.into()),
            ConnectionState::Connecting | ConnectionState::AwaitingHandshake => {
                Err(ProtocolError::BeforeHandshake(inbound.command()).into())
            }
        }
    }

    fn emit(&mut self, kind: EventKind) {
        self.event_seq += 1;
        let Some(ref tx) = self.events else {
            return;
        };
        let event = Event {
            seq: self.event_seq,
            timestamp: Utc::now(),
            kind,
        };
        if tx.send(event).is_err() {
            // Receiver dropped; stop producing.
            self.events = None;
        }
    }
}

impl<S: WorkSource> std::fmt::Debug for Distributor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distributor")
            .field("name", &self.settings.name)
            .field("state", &self.state)
            .field("unsent", &self.queue.unsent().len())
            .field("running", &self.queue.running().len())
            .finish()
    }
}
