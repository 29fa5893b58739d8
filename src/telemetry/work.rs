//! Workunit span helpers.

use tracing::Span;

use crate::model::WorkunitId;

/// Start a span covering one workunit's settlement.
///
/// `workunit.outcome` is declared empty and filled in by [`record_outcome`].
pub fn workunit_span(id: &WorkunitId, command: &str) -> Span {
    tracing::info_span!(
        "workunit.settle",
        "workunit.id" = %id,
        "workunit.report" = command,
        "workunit.outcome" = tracing::field::Empty,
    )
}

/// Record how a workunit was settled ("completed", "requeued", "stale").
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("workunit.outcome", outcome);
    span.in_scope(|| {
        tracing::debug!(outcome, "workunit settled");
    });
}
