//! Multi-threaded contention tests
//!
//! Several engines (standing in for separate processes) share one table and
//! race on the counter, on stream slots and on segment claims.

mod common;

use common::TestEngine;
use ordo_core::Error;
use ordo_engine::ClaimMode;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

#[test]
fn test_concurrent_reservations_are_disjoint_and_contiguous() {
    let t = TestEngine::new();
    let barrier = Arc::new(Barrier::new(THREADS));
    let t = Arc::new(t);

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let t = Arc::clone(&t);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let peer = t.peer(&format!("node-{}", i));
                barrier.wait();
                (0..50)
                    .map(|n| peer.sequence().reserve(1 + (n % 3) as u64).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut issued = BTreeSet::new();
    let mut total = 0;
    for handle in handles {
        for range in handle.join().unwrap() {
            total += range.clone().count();
            for n in range {
                assert!(issued.insert(n), "sequence {} issued twice", n);
            }
        }
    }
    assert_eq!(issued.len(), total);
    assert_eq!(issued.iter().next(), Some(&1));
    assert_eq!(issued.iter().next_back(), Some(&(total as u64)));
    assert_eq!(t.engine.sequence().current().unwrap(), total as u64);
}

#[test]
fn test_racing_appends_to_one_slot_have_one_winner() {
    let t = Arc::new(TestEngine::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let t = Arc::clone(&t);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let event = t.event("order-1", 0);
                barrier.wait();
                t.engine.events().append_one(&event)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(Error::StreamConflict { stream_id, sequence_number: 0 }) if stream_id == "order-1"
        ));
    }
    assert_eq!(t.engine.events().read_stream("order-1", 0).unwrap().len(), 1);
}

#[test]
fn test_racing_batches_on_shared_slot_have_one_winner() {
    let t = Arc::new(TestEngine::new());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let t = Arc::clone(&t);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // both batches want order-1[0]; the rest is private
                let batch = vec![t.event("order-1", 0), t.event(&format!("own-{}", i), 0)];
                barrier.wait();
                t.engine.events().append_batch(&batch)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(Error::ConcurrentAppendConflict { events: 2, .. }))));

    // the loser wrote nothing, not even its private event
    let own = (0..2)
        .map(|i| t.engine.events().read_stream(&format!("own-{}", i), 0).unwrap().len())
        .sum::<usize>();
    assert_eq!(own, 1);
}

#[test]
fn test_racing_claims_have_one_owner() {
    let t = Arc::new(TestEngine::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let t = Arc::clone(&t);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let peer = t.peer(&format!("node-{}", i));
                barrier.wait();
                peer.claims()
                    .claim("projector", 0, peer.claims().node_id(), None, ClaimMode::StrictRenewal)
                    .map(|_| peer.claims().node_id().to_string())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);

    let record = t.engine.claims().inspect("projector", 0).unwrap().unwrap();
    assert_eq!(record.owner.as_ref(), Some(winners[0]));
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(Error::ClaimDenied { owner: Some(owner), .. }) if owner == winners[0]
        ));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_sequential_reservations_tile_the_sequence(sizes in prop::collection::vec(1u64..50, 1..20)) {
        let t = TestEngine::new();
        let mut expected_start = 1;
        for n in sizes {
            let range = t.engine.sequence().reserve(n).unwrap();
            prop_assert_eq!(*range.start(), expected_start);
            prop_assert_eq!(*range.end(), expected_start + n - 1);
            expected_start += n;
        }
    }
}
