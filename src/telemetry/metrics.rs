//! Metric instrument factories for the distributor.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op.

use opentelemetry::metrics::{Counter, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("distributor")
}

/// Counter: protocol lines received from the broker.
/// Labels: `command`.
pub fn lines_received() -> Counter<u64> {
    meter()
        .u64_counter("distributor.lines.received")
        .with_description("Protocol lines received from the broker")
        .build()
}

/// Counter: workunits dispatched to workers.
pub fn workunits_dispatched() -> Counter<u64> {
    meter()
        .u64_counter("distributor.workunits.dispatched")
        .with_description("Workunits dispatched to workers")
        .build()
}

/// Counter: workunits settled with a validated answer.
pub fn workunits_completed() -> Counter<u64> {
    meter()
        .u64_counter("distributor.workunits.completed")
        .with_description("Workunits completed successfully")
        .build()
}

/// Counter: payloads returned to the unsent bag.
/// Labels: `command` (the report that triggered the requeue).
pub fn workunits_requeued() -> Counter<u64> {
    meter()
        .u64_counter("distributor.workunits.requeued")
        .with_description("Payloads requeued after a failed attempt")
        .build()
}

/// Counter: reports for workunits that are not running.
pub fn stale_reports() -> Counter<u64> {
    meter()
        .u64_counter("distributor.reports.stale")
        .with_description("Reports received for unknown workunit ids")
        .build()
}
