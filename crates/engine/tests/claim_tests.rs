//! Segment hand-off between workers: lease expiry, cursor persistence and
//! refusals that leave the row untouched.

mod common;

use common::TestEngine;
use ordo_core::{Error, GapAwareCursor, TrackingCursor};
use ordo_engine::ClaimMode;
use std::time::Duration;

const GROUP: &str = "projector";

#[test]
fn test_crashed_owner_is_replaced_after_lease_expires() {
    let t = TestEngine::new();
    let a = t.peer("node-a");
    let b = t.peer("node-b");
    for n in 0..3 {
        t.append("order", n);
    }

    // node-a works through the log and checkpoints
    let start = a.claims().fetch_cursor(GROUP, 0).unwrap();
    let batch = a.tracking().next(Some(&start), 2).unwrap();
    let checkpoint = batch.cursor.clone().unwrap();
    a.claims().store_cursor(GROUP, 0, &checkpoint).unwrap();

    // node-a stops renewing; node-b is refused while the lease is live
    t.advance(Duration::from_secs(5));
    assert!(matches!(
        b.claims().fetch_cursor(GROUP, 0),
        Err(Error::ClaimDenied { owner: Some(ref o), .. }) if o == "node-a"
    ));

    t.advance(Duration::from_secs(6));
    let resumed = b.claims().fetch_cursor(GROUP, 0).unwrap();
    assert_eq!(resumed, checkpoint);

    // node-b continues exactly where node-a stopped
    let rest = b.tracking().next(Some(&resumed), 10).unwrap();
    let globals: Vec<_> = rest.events.iter().map(|e| e.event.global_sequence).collect();
    assert_eq!(globals, vec![3]);

    // node-a comes back and may not overwrite node-b's progress
    let stale: TrackingCursor = GapAwareCursor::new(1, []).into();
    assert!(a.claims().store_cursor(GROUP, 0, &stale).is_err());
    assert!(a.claims().extend_claim(GROUP, 0).is_err());
    let record = b.claims().inspect(GROUP, 0).unwrap().unwrap();
    assert_eq!(record.owner.as_deref(), Some("node-b"));
    assert_eq!(record.cursor, Some(checkpoint));
}

#[test]
fn test_renewal_keeps_lease_alive() {
    let t = TestEngine::new();
    let a = t.peer("node-a");
    let b = t.peer("node-b");

    a.claims().fetch_cursor(GROUP, 1).unwrap();
    for _ in 0..5 {
        t.advance(Duration::from_secs(8));
        a.claims().extend_claim(GROUP, 1).unwrap();
        assert!(b.claims().fetch_cursor(GROUP, 1).is_err());
    }
}

#[test]
fn test_denied_claim_leaves_row_unchanged() {
    let t = TestEngine::new();
    let a = t.peer("node-a");
    let b = t.peer("node-b");
    let cursor: TrackingCursor = GapAwareCursor::new(7, [5]).into();
    a.claims().store_cursor(GROUP, 0, &cursor).unwrap();
    let before = a.claims().inspect(GROUP, 0).unwrap();

    t.advance(Duration::from_secs(3));
    let other: TrackingCursor = GapAwareCursor::new(99, []).into();
    for mode in [ClaimMode::StrictRenewal, ClaimMode::ExpiryAwareClaim] {
        assert!(b
            .claims()
            .claim(GROUP, 0, "node-b", Some(&other), mode)
            .is_err());
    }
    assert!(b.claims().release_claim(GROUP, 0).is_err());
    assert_eq!(a.claims().inspect(GROUP, 0).unwrap(), before);
}

#[test]
fn test_graceful_release_hands_over_immediately() {
    let t = TestEngine::new();
    let a = t.peer("node-a");
    let b = t.peer("node-b");
    let cursor: TrackingCursor = GapAwareCursor::new(3, []).into();

    a.claims().store_cursor(GROUP, 0, &cursor).unwrap();
    a.claims().release_claim(GROUP, 0).unwrap();
    assert_eq!(b.claims().fetch_cursor(GROUP, 0).unwrap(), cursor);
}

#[test]
fn test_segments_are_discovered_from_claims() {
    let t = TestEngine::new();
    let a = t.peer("node-a");
    for segment in [2, 0, 1] {
        a.claims().fetch_cursor(GROUP, segment).unwrap();
    }
    a.claims().release_claim(GROUP, 1).unwrap();
    assert_eq!(a.claims().list_segments(GROUP).unwrap(), vec![0, 1, 2]);
    assert!(a.claims().list_segments("other").unwrap().is_empty());
}
