//! Integration tests for the lock manager.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Barrier};
use std::time::Duration;
use triage_engine::clock::ManualClock;
use triage_engine::error::Error;
use triage_engine::lock::*;
use triage_engine::model::{DocumentId, HolderId};

const LEASE: Duration = Duration::from_secs(30);

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-02T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn setup() -> (Arc<ManualClock>, LockManager) {
    let clock = Arc::new(ManualClock::new(t0()));
    let manager = LockManager::new(clock.clone(), LEASE);
    (clock, manager)
}

fn doc(id: &str) -> DocumentId {
    DocumentId::new(id).unwrap()
}

fn holder(id: &str) -> HolderId {
    HolderId::new(id).unwrap()
}

// ---------------------------------------------------------------------------
// Acquire
// ---------------------------------------------------------------------------

#[test]
fn first_acquire_is_granted() {
    let (_, manager) = setup();
    match manager.acquire(&doc("doc-1"), &holder("H1"), LEASE).unwrap() {
        AcquireOutcome::Granted { lock, renewed } => {
            assert!(!renewed);
            assert_eq!(lock.holder_id, holder("H1"));
            assert_eq!(lock.acquired_at, t0());
            assert_eq!(lock.lease_expires_at, t0() + TimeDelta::seconds(30));
        }
        other => panic!("expected Granted, got {other:?}"),
    }
    assert_eq!(manager.is_held(&doc("doc-1")), Some(holder("H1")));
}

#[test]
fn same_holder_renews_and_extends_lease() {
    let (clock, manager) = setup();
    manager.acquire(&doc("doc-1"), &holder("H1"), LEASE).unwrap();

    clock.advance(TimeDelta::seconds(20));
    match manager.acquire(&doc("doc-1"), &holder("H1"), LEASE).unwrap() {
        AcquireOutcome::Granted { lock, renewed } => {
            assert!(renewed);
            assert_eq!(lock.lease_expires_at, t0() + TimeDelta::seconds(50));
        }
        other => panic!("expected renewal, got {other:?}"),
    }

    // Still held past the original expiry.
    clock.advance(TimeDelta::seconds(20));
    assert_eq!(manager.is_held(&doc("doc-1")), Some(holder("H1")));
}

#[test]
fn other_holder_is_denied_with_current_holder() {
    let (_, manager) = setup();
    manager.acquire(&doc("doc-1"), &holder("H1"), LEASE).unwrap();

    let outcome = manager.acquire(&doc("doc-1"), &holder("H2"), LEASE).unwrap();
    assert_eq!(outcome, AcquireOutcome::DeniedHeldByOther(holder("H1")));
    assert!(!outcome.is_granted());
    assert_eq!(manager.is_held(&doc("doc-1")), Some(holder("H1")));
}

#[test]
fn locks_are_per_document() {
    let (_, manager) = setup();
    assert!(manager.acquire(&doc("doc-1"), &holder("H1"), LEASE).unwrap().is_granted());
    assert!(manager.acquire(&doc("doc-2"), &holder("H2"), LEASE).unwrap().is_granted());
    assert_eq!(manager.active_locks().len(), 2);
}

#[test]
fn expired_lock_can_be_taken_before_sweep() {
    let (clock, manager) = setup();
    manager.acquire(&doc("doc-1"), &holder("H1"), LEASE).unwrap();

    clock.advance(TimeDelta::seconds(31));
    assert_eq!(manager.is_held(&doc("doc-1")), None);
    match manager.acquire(&doc("doc-1"), &holder("H2"), LEASE).unwrap() {
        AcquireOutcome::Granted { renewed, .. } => assert!(!renewed),
        other => panic!("expected Granted, got {other:?}"),
    }
}

#[test]
fn zero_lease_is_a_contract_violation() {
    let (_, manager) = setup();
    let err = manager
        .acquire(&doc("doc-1"), &holder("H1"), Duration::ZERO)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidLease(_)));
    assert_eq!(manager.tracked(), 0);
}

#[test]
fn empty_ids_are_rejected_at_construction() {
    assert!(matches!(DocumentId::new(""), Err(Error::EmptyId(_))));
    assert!(matches!(HolderId::new("   "), Err(Error::EmptyId(_))));
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

#[test]
fn holder_release_frees_the_document() {
    let (_, manager) = setup();
    manager.acquire(&doc("doc-1"), &holder("H1"), LEASE).unwrap();

    assert_eq!(
        manager.release(&doc("doc-1"), &holder("H1")),
        ReleaseOutcome::Released
    );
    assert_eq!(manager.is_held(&doc("doc-1")), None);
    assert!(manager.acquire(&doc("doc-1"), &holder("H2"), LEASE).unwrap().is_granted());
}

#[test]
fn double_release_and_foreign_release_are_not_held() {
    let (_, manager) = setup();
    manager.acquire(&doc("doc-1"), &holder("H1"), LEASE).unwrap();

    assert_eq!(
        manager.release(&doc("doc-1"), &holder("H2")),
        ReleaseOutcome::NotHeld
    );
    assert_eq!(manager.is_held(&doc("doc-1")), Some(holder("H1")));

    assert_eq!(
        manager.release(&doc("doc-1"), &holder("H1")),
        ReleaseOutcome::Released
    );
    assert_eq!(
        manager.release(&doc("doc-1"), &holder("H1")),
        ReleaseOutcome::NotHeld
    );
    assert_eq!(
        manager.release(&doc("never-locked"), &holder("H1")),
        ReleaseOutcome::NotHeld
    );
    assert_eq!(manager.tracked(), 0);
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[test]
fn abandoned_lock_is_swept_then_regranted() {
    let (clock, manager) = setup();

    // t=0: H1 takes the lock.
    assert!(manager.acquire(&doc("doc-1"), &holder("H1"), LEASE).unwrap().is_granted());

    // t=5s: H2 is turned away.
    clock.set(t0() + TimeDelta::seconds(5));
    assert_eq!(
        manager.acquire(&doc("doc-1"), &holder("H2"), LEASE).unwrap(),
        AcquireOutcome::DeniedHeldByOther(holder("H1"))
    );

    // t=35s: H1 never renewed; the sweep reclaims it.
    clock.set(t0() + TimeDelta::seconds(35));
    assert_eq!(manager.sweep_expired(manager.now()), 1);
    assert_eq!(manager.is_held(&doc("doc-1")), None);
    assert_eq!(manager.tracked(), 0);

    // t=36s: H2 gets it.
    clock.set(t0() + TimeDelta::seconds(36));
    assert!(manager.acquire(&doc("doc-1"), &holder("H2"), LEASE).unwrap().is_granted());
}

#[test]
fn sweep_keeps_live_locks() {
    let (clock, manager) = setup();
    manager.acquire(&doc("old"), &holder("H1"), LEASE).unwrap();
    clock.advance(TimeDelta::seconds(20));
    manager.acquire(&doc("new"), &holder("H2"), LEASE).unwrap();

    let removed = manager.sweep_expired(t0() + TimeDelta::seconds(40));
    assert_eq!(removed, 1);
    assert_eq!(manager.is_held(&doc("new")), Some(holder("H2")));
}

#[test]
fn lock_at_exact_expiry_is_not_swept() {
    let (_, manager) = setup();
    manager.acquire(&doc("doc-1"), &holder("H1"), LEASE).unwrap();
    assert_eq!(manager.sweep_expired(t0() + TimeDelta::seconds(30)), 0);
    assert_eq!(manager.sweep_expired(t0() + TimeDelta::seconds(31)), 1);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[test]
fn snapshot_excludes_expired_and_ignores_later_changes() {
    let (clock, manager) = setup();
    manager.acquire(&doc("stale"), &holder("H1"), Duration::from_secs(5)).unwrap();
    manager.acquire(&doc("live"), &holder("H2"), LEASE).unwrap();
    clock.advance(TimeDelta::seconds(10));

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.holder_of(&doc("live")), Some(holder("H2")));
    assert_eq!(snapshot.holder_of(&doc("stale")), None);

    manager.release(&doc("live"), &holder("H2"));
    assert_eq!(snapshot.holder_of(&doc("live")), Some(holder("H2")));
}

// ---------------------------------------------------------------------------
// Exclusivity under contention
// ---------------------------------------------------------------------------

#[test]
fn concurrent_acquires_have_exactly_one_winner() {
    for _round in 0..20 {
        let clock = Arc::new(ManualClock::new(t0()));
        let manager = Arc::new(LockManager::new(clock, LEASE));
        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));

        let handles: Vec<_> = (0..contenders)
            .map(|i| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let me = holder(&format!("H{i}"));
                    barrier.wait();
                    let outcome = manager.acquire(&doc("doc-1"), &me, LEASE).unwrap();
                    (me, outcome)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<&HolderId> = results
            .iter()
            .filter(|(_, o)| o.is_granted())
            .map(|(h, _)| h)
            .collect();
        assert_eq!(winners.len(), 1, "expected one winner, got {winners:?}");

        let winner = winners[0].clone();
        for (_, outcome) in &results {
            if let AcquireOutcome::DeniedHeldByOther(current) = outcome {
                assert_eq!(*current, winner);
            }
        }
        assert_eq!(manager.is_held(&doc("doc-1")), Some(winner));
    }
}

#[test]
fn interleaved_acquires_never_report_two_holders() {
    let (clock, manager) = setup();
    let holders = [holder("A"), holder("B"), holder("C")];
    let short = Duration::from_secs(7);

    let mut current: Option<HolderId> = None;
    for tick in 0..120 {
        clock.advance(TimeDelta::seconds(1));
        if tick % 11 == 0 {
            manager.sweep_expired(manager.now());
        }
        let who = &holders[tick % holders.len()];
        let outcome = manager.acquire(&doc("doc-1"), who, short).unwrap();

        let live = manager.is_held(&doc("doc-1"));
        match outcome {
            AcquireOutcome::Granted { .. } => assert_eq!(live.as_ref(), Some(who)),
            AcquireOutcome::DeniedHeldByOther(ref other) => {
                assert_eq!(live.as_ref(), Some(other));
                assert_ne!(other, who);
            }
            AcquireOutcome::TimedOut => unreachable!(),
        }
        current = live;
    }
    assert!(current.is_some());
}

// ---------------------------------------------------------------------------
// Fail closed
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn slow_remote_acquire_fails_closed() {
    let slow = async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(AcquireOutcome::DeniedHeldByOther(holder("never-seen")))
    };
    let outcome = acquire_fail_closed(slow, Duration::from_secs(2)).await.unwrap();
    assert_eq!(outcome, AcquireOutcome::TimedOut);
    assert!(!outcome.is_granted());
}

#[tokio::test]
async fn fast_acquire_passes_through() {
    let (_, manager) = setup();
    let attempt = async { manager.acquire(&doc("doc-1"), &holder("H1"), LEASE) };
    let outcome = acquire_fail_closed(attempt, Duration::from_secs(2)).await.unwrap();
    assert!(outcome.is_granted());
}
