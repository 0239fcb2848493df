//! Live SLA countdowns.
//!
//! A [`Countdown`] owns a tokio task that re-evaluates one SLA window and
//! publishes each [`SlaStatus`] on a watch channel. The cadence comes from
//! the current bucket: once a second while Red or Breached, once a minute
//! otherwise, and never later than the next bucket boundary. Display code
//! just awaits `changed()` on its receiver.

use std::sync::Arc;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::clock::Clock;
use crate::sla::{SlaClock, SlaStatus, SlaWindow};

pub struct Countdown {
    status: watch::Receiver<SlaStatus>,
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Evaluate `window` now and keep re-evaluating it in the background.
    pub fn start(window: SlaWindow, sla: SlaClock, clock: Arc<dyn Clock>) -> Self {
        let initial = sla.evaluate_window(&window, clock.now());
        let (tx, status) = watch::channel(initial);
        let shutdown = Arc::new(Notify::new());

        let stop = Arc::clone(&shutdown);
        let handle = tokio::spawn(async move {
            loop {
                let wait = sla.next_refresh(&window, clock.now());
                tokio::select! {
                    _ = stop.notified() => return,
                    _ = tx.closed() => return,
                    _ = tokio::time::sleep(wait) => {
                        let next = sla.evaluate_window(&window, clock.now());
                        if next.bucket != tx.borrow().bucket {
                            debug!(
                                deadline = %window.deadline(),
                                bucket = %next.bucket,
                                "sla bucket changed"
                            );
                        }
                        if tx.send(next).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Self {
            status,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Latest published status.
    pub fn current(&self) -> SlaStatus {
        self.status.borrow().clone()
    }

    /// A receiver that is notified on every recomputation.
    pub fn subscribe(&self) -> watch::Receiver<SlaStatus> {
        self.status.clone()
    }

    /// Stop the countdown and wait for its task to finish.
    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}
