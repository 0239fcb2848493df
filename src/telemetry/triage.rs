//! Span helpers for lock operations and worklist assembly.

use tracing::Span;

use crate::model::{DocumentId, HolderId};
use crate::worklist::WorklistFilter;

/// Start a span for a lock operation ("acquire" | "release").
///
/// `lock.result` is declared empty; fill it with [`record_lock_outcome`].
pub fn start_lock_span(operation: &str, document_id: &DocumentId, holder: &HolderId) -> Span {
    tracing::debug_span!(
        "triage.lock",
        "lock.operation" = operation,
        "lock.document_id" = %document_id,
        "lock.holder" = %holder,
        "lock.result" = tracing::field::Empty,
    )
}

pub fn record_lock_outcome(span: &Span, outcome: &str) {
    span.record("lock.result", outcome);
}

/// Start a span for one worklist assembly pass.
pub fn start_assembly_span(filter: &WorklistFilter) -> Span {
    tracing::info_span!("triage.assemble", "worklist.filter" = %filter)
}
