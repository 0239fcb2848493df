//! Scoped review sessions.
//!
//! Opening a document for review acquires its lock and hands back a
//! [`ReviewSession`]. Dropping the session releases the lock, so every exit
//! path (normal close, early return, error, cancelled task) gives it back.
//! Exits that skip destructors entirely are left to the lease sweeper.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{AcquireOutcome, Lock, LockManager, ReleaseOutcome};
use crate::error::Result;
use crate::model::{DocumentId, HolderId};

/// Outcome of trying to open a document for review.
#[derive(Debug)]
pub enum SessionOutcome {
    Opened(ReviewSession),
    /// Someone else is reviewing it.
    Locked { held_by: HolderId },
    /// The lock authority did not answer; fail closed.
    Unavailable,
}

/// An open review. Holds the document's lock until closed or dropped.
#[derive(Debug)]
pub struct ReviewSession {
    manager: Arc<LockManager>,
    lock: Lock,
    lease: Duration,
    closed: bool,
}

impl LockManager {
    /// Acquire `document_id` for `holder` and wrap the grant in a session.
    pub fn open_session(
        self: &Arc<Self>,
        document_id: &DocumentId,
        holder: &HolderId,
        lease: Duration,
    ) -> Result<SessionOutcome> {
        match self.acquire(document_id, holder, lease)? {
            AcquireOutcome::Granted { lock, .. } => Ok(SessionOutcome::Opened(ReviewSession {
                manager: Arc::clone(self),
                lock,
                lease,
                closed: false,
            })),
            AcquireOutcome::DeniedHeldByOther(held_by) => Ok(SessionOutcome::Locked { held_by }),
            AcquireOutcome::TimedOut => Ok(SessionOutcome::Unavailable),
        }
    }
}

impl ReviewSession {
    pub fn document_id(&self) -> &DocumentId {
        &self.lock.document_id
    }

    pub fn holder(&self) -> &HolderId {
        &self.lock.holder_id
    }

    /// The lock as of the last grant or renewal.
    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    /// Heartbeat: extend the lease.
    ///
    /// Returns `DeniedHeldByOther` if the lease lapsed and another holder
    /// took the document in the meantime; the session should then be closed.
    pub fn renew(&mut self) -> Result<AcquireOutcome> {
        let outcome = self
            .manager
            .acquire(&self.lock.document_id, &self.lock.holder_id, self.lease)?;
        match &outcome {
            AcquireOutcome::Granted { lock, .. } => self.lock = lock.clone(),
            AcquireOutcome::DeniedHeldByOther(other) => warn!(
                document_id = %self.lock.document_id,
                holder = %self.lock.holder_id,
                held_by = %other,
                "lease lost before renewal"
            ),
            AcquireOutcome::TimedOut => {}
        }
        Ok(outcome)
    }

    /// Release the lock now.
    pub fn close(mut self) -> ReleaseOutcome {
        self.release()
    }

    fn release(&mut self) -> ReleaseOutcome {
        if self.closed {
            return ReleaseOutcome::NotHeld;
        }
        self.closed = true;
        self.manager
            .release(&self.lock.document_id, &self.lock.holder_id)
    }
}

impl Drop for ReviewSession {
    fn drop(&mut self) {
        if !self.closed {
            let outcome = self.release();
            debug!(
                document_id = %self.lock.document_id,
                holder = %self.lock.holder_id,
                ?outcome,
                "review session dropped"
            );
        }
    }
}
