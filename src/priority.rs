//! Priority scoring and the worklist's total order.
//!
//! The score blends urgency, SLA proximity, document importance and age.
//! It only ranks items against each other; the absolute value carries no
//! meaning across policy versions.
//!
//! Sorting uses categorical keys first so a reviewer can predict the order:
//! urgency class, then lifecycle status, then score, then receipt time
//! (newest first), then id.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::model::WorkItem;
use crate::policy::TriagePolicy;

#[derive(Debug, Clone, Default)]
pub struct PriorityScorer {
    policy: TriagePolicy,
}

impl PriorityScorer {
    pub fn new(policy: TriagePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TriagePolicy {
        &self.policy
    }

    /// Composite score for `item` at `now`. Terminal items score 0.
    pub fn score(&self, item: &WorkItem, now: DateTime<Utc>) -> f64 {
        if !item.is_active() {
            return 0.0;
        }

        let p = &self.policy;
        let urgency = p.urgency.for_class(item.urgency);
        let sla_proximity = 100.0 * (1.0 - item.window.fraction_remaining(now));
        let document = f64::from(item.document_type_weight.value()) * 10.0;

        let minutes = (now - item.received_at()).num_seconds().max(0) as f64 / 60.0;
        let age = (minutes / p.age.minutes_per_point).min(p.age.cap);

        p.weights.urgency * urgency
            + p.weights.sla * sla_proximity
            + p.weights.document * document
            + p.weights.age * age
    }

    /// Worklist order; `Less` means `a` is reviewed first.
    pub fn compare(&self, a: &WorkItem, b: &WorkItem, now: DateTime<Utc>) -> Ordering {
        self.compare_scored(a, self.score(a, now), b, self.score(b, now))
    }

    /// Same as [`compare`](Self::compare) with scores already computed.
    pub fn compare_scored(
        &self,
        a: &WorkItem,
        a_score: f64,
        b: &WorkItem,
        b_score: f64,
    ) -> Ordering {
        a.urgency
            .rank()
            .cmp(&b.urgency.rank())
            .then_with(|| a.status.precedence().cmp(&b.status.precedence()))
            .then_with(|| b_score.total_cmp(&a_score))
            .then_with(|| b.received_at().cmp(&a.received_at()))
            .then_with(|| a.id.cmp(&b.id))
    }
}
