//! A projection consuming the global order under a segment claim.

use crate::common::{event, open, store};
use std::collections::BTreeMap;

#[test]
fn projection_sees_every_event_once_across_restarts() {
    let store = store();
    let writer = open(&store, "writer");
    for n in 0..25 {
        writer
            .events()
            .append(&[event(&format!("order-{}", n % 4), n / 4, "Placed")])
            .unwrap();
    }

    let mut seen: BTreeMap<u64, String> = BTreeMap::new();
    // three short-lived workers, each resuming from the stored cursor
    for worker in 0..3 {
        let engine = open(&store, "projector-node");
        let mut cursor = engine.claims().fetch_cursor("orders", 0).unwrap();
        for _ in 0..worker + 1 {
            let batch = engine.tracking().next(Some(&cursor), 4).unwrap();
            for tracked in &batch.events {
                let previous = seen.insert(tracked.event.global_sequence, tracked.event.stream_id.clone());
                assert!(previous.is_none(), "event {} delivered twice", tracked.event.global_sequence);
            }
            if let Some(next) = batch.cursor {
                engine.claims().store_cursor("orders", 0, &next).unwrap();
                cursor = next;
            }
        }
        engine.claims().release_claim("orders", 0).unwrap();
    }
    assert_eq!(seen.keys().copied().collect::<Vec<_>>(), (1..=24).collect::<Vec<_>>());

    // the rest in one go
    let engine = open(&store, "projector-node");
    let cursor = engine.claims().fetch_cursor("orders", 0).unwrap();
    let batch = engine.track(Some(&cursor)).unwrap();
    assert_eq!(
        batch.events.iter().map(|e| e.event.global_sequence).collect::<Vec<_>>(),
        vec![25]
    );
}
