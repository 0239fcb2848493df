//! Worklist assembly: filter, order and annotate the active triage queue.
//!
//! Assembly is a pure read. It takes the current items, a read-only lock
//! view and an explicit `now`, and returns the same sequence every time for
//! the same inputs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

use crate::lock::LockLookup;
use crate::model::{HolderId, ItemKind, LifecycleStatus, UrgencyClass, WorkItem};
use crate::priority::PriorityScorer;
use crate::sla::{SlaBucket, SlaClock, SlaStatus};
use crate::telemetry::{metrics, triage};

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Optional, ANDed predicates. An empty filter matches every active item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorklistFilter {
    pub kind: Option<ItemKind>,
    pub urgency: Option<UrgencyClass>,
    pub status: Option<LifecycleStatus>,
    /// Case-insensitive substring over id, name, sender and description.
    pub search: Option<String>,
}

impl WorklistFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: ItemKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn urgency(mut self, urgency: UrgencyClass) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn status(mut self, status: LifecycleStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Blank queries are treated as no query.
    pub fn search(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.search = if query.trim().is_empty() {
            None
        } else {
            Some(query)
        };
        self
    }

    pub fn matches(&self, item: &WorkItem) -> bool {
        self.kind.is_none_or(|kind| item.kind() == kind)
            && self.urgency.is_none_or(|urgency| item.urgency == urgency)
            && self.status.is_none_or(|status| item.status == status)
            && self
                .search
                .as_deref()
                .is_none_or(|query| matches_text(item, query))
    }
}

fn matches_text(item: &WorkItem, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    std::iter::once(item.id.as_str())
        .chain(item.details.searchable_fields())
        .any(|field| field.to_lowercase().contains(&needle))
}

impl std::fmt::Display for WorklistFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(kind) = self.kind {
            parts.push(format!("kind={kind}"));
        }
        if let Some(urgency) = self.urgency {
            parts.push(format!("urgency={urgency}"));
        }
        if let Some(status) = self.status {
            parts.push(format!("status={status}"));
        }
        if let Some(ref search) = self.search {
            parts.push(format!("search={search:?}"));
        }
        if parts.is_empty() {
            write!(f, "all")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One worklist row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedItem {
    pub item: WorkItem,
    pub sla: SlaStatus,
    pub score: f64,
    /// Lock holder at assembly time.
    pub locked_by: Option<HolderId>,
}

/// Counts for the dashboard header cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorklistSummary {
    pub total: usize,
    pub breached: usize,
    pub red: usize,
    pub yellow: usize,
    pub green: usize,
    pub locked: usize,
    pub stat: usize,
    pub urgent: usize,
    pub routine: usize,
}

impl WorklistSummary {
    pub fn from_items(items: &[AnnotatedItem]) -> Self {
        let mut summary = Self {
            total: items.len(),
            ..Self::default()
        };
        for row in items {
            match row.sla.bucket {
                SlaBucket::Breached => summary.breached += 1,
                SlaBucket::Red => summary.red += 1,
                SlaBucket::Yellow => summary.yellow += 1,
                SlaBucket::Green => summary.green += 1,
            }
            match row.item.urgency {
                UrgencyClass::Stat => summary.stat += 1,
                UrgencyClass::Urgent => summary.urgent += 1,
                UrgencyClass::Routine => summary.routine += 1,
            }
            if row.locked_by.is_some() {
                summary.locked += 1;
            }
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct WorklistAssembler {
    scorer: PriorityScorer,
    sla: SlaClock,
}

impl WorklistAssembler {
    pub fn new(scorer: PriorityScorer, sla: SlaClock) -> Self {
        Self { scorer, sla }
    }

    /// Assembler whose scorer and SLA clock share one policy.
    pub fn from_policy(policy: crate::policy::TriagePolicy) -> Self {
        let sla = SlaClock::from_policy(&policy);
        Self::new(PriorityScorer::new(policy), sla)
    }

    pub fn scorer(&self) -> &PriorityScorer {
        &self.scorer
    }

    /// Build the active worklist.
    ///
    /// Items of both kinds are merged, terminal items dropped, `filter`
    /// applied, the rest ordered by [`PriorityScorer::compare_scored`] and
    /// annotated with their SLA status and current lock holder.
    pub fn assemble<'a, I, L>(
        &self,
        items: I,
        locks: &L,
        filter: &WorklistFilter,
        now: DateTime<Utc>,
    ) -> Vec<AnnotatedItem>
    where
        I: IntoIterator<Item = &'a WorkItem>,
        L: LockLookup + ?Sized,
    {
        let span = triage::start_assembly_span(filter);
        let _enter = span.enter();
        let started = Instant::now();

        let mut rows: Vec<AnnotatedItem> = items
            .into_iter()
            .filter(|item| item.is_active() && filter.matches(item))
            .map(|item| AnnotatedItem {
                item: item.clone(),
                sla: self.sla.evaluate_window(&item.window, now),
                score: self.scorer.score(item, now),
                locked_by: locks.holder_of(&item.id),
            })
            .collect();

        rows.sort_by(|a, b| {
            self.scorer
                .compare_scored(&a.item, a.score, &b.item, b.score)
        });

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::worklist_assembled().record(rows.len() as u64, &[]);
        metrics::assembly_duration_ms().record(elapsed_ms, &[]);
        debug!(items = rows.len(), elapsed_ms, "worklist assembled");

        rows
    }
}
