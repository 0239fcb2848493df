//! Lease-based review locks: one exclusive holder per document.
//!
//! The lock table is the only shared mutable state in the engine. Every
//! check-and-set happens under a single mutex, so for a given document the
//! acquire attempts are totally ordered and at most one is ever granted at a
//! time. Abandoned locks are reclaimed by [`sweeper`] once their lease runs
//! out.

pub mod session;
pub mod sweeper;

use chrono::{DateTime, TimeDelta, Utc};
use opentelemetry::KeyValue;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::model::{DocumentId, HolderId};
use crate::telemetry::{metrics, triage};

pub use session::{ReviewSession, SessionOutcome};
pub use sweeper::spawn_sweeper;

/// Default lease: a 15s heartbeat with a 3x safety factor.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(45);

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

/// Exclusive edit access to one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lock {
    pub document_id: DocumentId,
    pub holder_id: HolderId,
    pub acquired_at: DateTime<Utc>,
    pub lease_expires_at: DateTime<Utc>,
}

impl Lock {
    /// A lock stays live up to and including its expiry instant.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.lease_expires_at >= now
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of an acquire attempt. Contention is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller holds the lock. `renewed` is true when it already did.
    Granted { lock: Lock, renewed: bool },
    /// Someone else holds a live lock.
    DeniedHeldByOther(HolderId),
    /// The authority did not answer in time. Treat as denied.
    TimedOut,
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireOutcome::Granted { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            AcquireOutcome::Granted { renewed: false, .. } => "granted",
            AcquireOutcome::Granted { renewed: true, .. } => "renewed",
            AcquireOutcome::DeniedHeldByOther(_) => "denied",
            AcquireOutcome::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    NotHeld,
}

impl ReleaseOutcome {
    fn label(self) -> &'static str {
        match self {
            ReleaseOutcome::Released => "released",
            ReleaseOutcome::NotHeld => "not_held",
        }
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Read-only view of who holds what. The worklist only ever sees this.
pub trait LockLookup {
    fn holder_of(&self, document_id: &DocumentId) -> Option<HolderId>;
}

/// Point-in-time copy of the live locks.
#[derive(Debug, Clone, Default)]
pub struct LockSnapshot {
    holders: HashMap<DocumentId, HolderId>,
}

impl LockSnapshot {
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}

impl FromIterator<(DocumentId, HolderId)> for LockSnapshot {
    fn from_iter<I: IntoIterator<Item = (DocumentId, HolderId)>>(iter: I) -> Self {
        Self {
            holders: iter.into_iter().collect(),
        }
    }
}

impl LockLookup for LockSnapshot {
    fn holder_of(&self, document_id: &DocumentId) -> Option<HolderId> {
        self.holders.get(document_id).cloned()
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// In-memory lock authority for one triage workspace.
pub struct LockManager {
    table: Mutex<HashMap<DocumentId, Lock>>,
    clock: Arc<dyn Clock>,
    default_lease: Duration,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("tracked", &self.tracked())
            .field("default_lease", &self.default_lease)
            .finish()
    }
}

impl LockManager {
    pub fn new(clock: Arc<dyn Clock>, default_lease: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            clock,
            default_lease,
        }
    }

    /// Lock manager on the wall clock with [`DEFAULT_LEASE`].
    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock), DEFAULT_LEASE)
    }

    pub fn default_lease(&self) -> Duration {
        self.default_lease
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // A panic while holding the guard cannot leave a half-written entry:
    // every mutation is a single insert/remove/retain.
    fn table(&self) -> MutexGuard<'_, HashMap<DocumentId, Lock>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grant, renew or deny exclusive access to `document_id`.
    ///
    /// Grants when there is no live lock or when `holder` already holds it;
    /// in both cases the lease restarts from now. A live lock held by anyone
    /// else is never overridden.
    pub fn acquire(
        &self,
        document_id: &DocumentId,
        holder: &HolderId,
        lease: Duration,
    ) -> Result<AcquireOutcome> {
        let lease_delta = TimeDelta::from_std(lease)
            .ok()
            .filter(|d| *d > TimeDelta::zero())
            .ok_or(Error::InvalidLease(lease))?;

        let span = triage::start_lock_span("acquire", document_id, holder);
        let _enter = span.enter();

        let outcome = {
            let mut table = self.table();
            let now = self.clock.now();
            let lease_expires_at = now
                .checked_add_signed(lease_delta)
                .ok_or(Error::InvalidLease(lease))?;

            match table.get(document_id) {
                Some(current) if current.is_live(now) && current.holder_id != *holder => {
                    AcquireOutcome::DeniedHeldByOther(current.holder_id.clone())
                }
                current => {
                    let renewed = current.is_some_and(|l| l.is_live(now));
                    let lock = Lock {
                        document_id: document_id.clone(),
                        holder_id: holder.clone(),
                        acquired_at: now,
                        lease_expires_at,
                    };
                    table.insert(document_id.clone(), lock.clone());
                    AcquireOutcome::Granted { lock, renewed }
                }
            }
        };

        triage::record_lock_outcome(&span, outcome.label());
        metrics::lock_acquisitions().add(1, &[KeyValue::new("result", outcome.label())]);
        match &outcome {
            AcquireOutcome::Granted { renewed: false, .. } => {
                info!(document_id = %document_id, holder = %holder, "lock granted")
            }
            AcquireOutcome::Granted { renewed: true, .. } => {
                debug!(document_id = %document_id, holder = %holder, "lease renewed")
            }
            AcquireOutcome::DeniedHeldByOther(current) => {
                info!(
                    document_id = %document_id,
                    holder = %holder,
                    held_by = %current,
                    "lock denied"
                )
            }
            AcquireOutcome::TimedOut => {}
        }

        Ok(outcome)
    }

    /// Acquire with the manager's default lease.
    pub fn acquire_default(
        &self,
        document_id: &DocumentId,
        holder: &HolderId,
    ) -> Result<AcquireOutcome> {
        self.acquire(document_id, holder, self.default_lease)
    }

    /// Drop the lock if `holder` currently holds it. Anything else is
    /// `NotHeld`, including a second release of the same lock.
    pub fn release(&self, document_id: &DocumentId, holder: &HolderId) -> ReleaseOutcome {
        let span = triage::start_lock_span("release", document_id, holder);
        let _enter = span.enter();

        let outcome = {
            let mut table = self.table();
            let now = self.clock.now();
            match table.get(document_id) {
                Some(current) if current.holder_id == *holder => {
                    let live = current.is_live(now);
                    table.remove(document_id);
                    if live {
                        ReleaseOutcome::Released
                    } else {
                        ReleaseOutcome::NotHeld
                    }
                }
                _ => ReleaseOutcome::NotHeld,
            }
        };

        triage::record_lock_outcome(&span, outcome.label());
        metrics::lock_releases().add(1, &[KeyValue::new("result", outcome.label())]);
        debug!(document_id = %document_id, holder = %holder, result = outcome.label(), "release");
        outcome
    }

    /// Current live holder, if any.
    pub fn is_held(&self, document_id: &DocumentId) -> Option<HolderId> {
        self.lock_info(document_id).map(|lock| lock.holder_id)
    }

    /// Full record of the live lock on `document_id`.
    pub fn lock_info(&self, document_id: &DocumentId) -> Option<Lock> {
        let table = self.table();
        let now = self.clock.now();
        table
            .get(document_id)
            .filter(|lock| lock.is_live(now))
            .cloned()
    }

    /// All live locks, oldest grant first.
    pub fn active_locks(&self) -> Vec<Lock> {
        let table = self.table();
        let now = self.clock.now();
        let mut locks: Vec<Lock> = table
            .values()
            .filter(|lock| lock.is_live(now))
            .cloned()
            .collect();
        locks.sort_by(|a, b| {
            a.acquired_at
                .cmp(&b.acquired_at)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        locks
    }

    /// Copy of the live holders for a worklist assembly pass.
    pub fn snapshot(&self) -> LockSnapshot {
        let table = self.table();
        let now = self.clock.now();
        table
            .values()
            .filter(|lock| lock.is_live(now))
            .map(|lock| (lock.document_id.clone(), lock.holder_id.clone()))
            .collect()
    }

    /// Remove every lock whose lease ended before `now`. Returns how many.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let removed: Vec<Lock> = {
            let mut table = self.table();
            let expired: Vec<DocumentId> = table
                .values()
                .filter(|lock| lock.lease_expires_at < now)
                .map(|lock| lock.document_id.clone())
                .collect();
            expired
                .iter()
                .filter_map(|id| table.remove(id))
                .collect()
        };

        for lock in &removed {
            info!(
                document_id = %lock.document_id,
                holder = %lock.holder_id,
                expired_at = %lock.lease_expires_at,
                "reclaimed abandoned lock"
            );
        }
        if !removed.is_empty() {
            metrics::locks_swept().add(removed.len() as u64, &[]);
        }
        removed.len()
    }

    /// Entries in the table, including expired ones not yet swept.
    pub fn tracked(&self) -> usize {
        self.table().len()
    }
}

impl LockLookup for LockManager {
    fn holder_of(&self, document_id: &DocumentId) -> Option<HolderId> {
        self.is_held(document_id)
    }
}

/// Run an acquire against a remote authority, failing closed.
///
/// If `attempt` does not finish within `limit` the result is
/// [`AcquireOutcome::TimedOut`], which never counts as granted.
pub async fn acquire_fail_closed<F>(attempt: F, limit: Duration) -> Result<AcquireOutcome>
where
    F: Future<Output = Result<AcquireOutcome>>,
{
    match tokio::time::timeout(limit, attempt).await {
        Ok(outcome) => outcome,
        Err(_) => {
            metrics::lock_acquisitions().add(1, &[KeyValue::new("result", "timed_out")]);
            info!(limit_ms = limit.as_millis() as u64, "lock acquire timed out, treating as denied");
            Ok(AcquireOutcome::TimedOut)
        }
    }
}
