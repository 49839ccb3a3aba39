//! Stream appends and reads.

use crate::common::{event, open, store};
use ordo::Error;

#[test]
fn append_and_read_back_stream() {
    let store = store();
    let engine = open(&store, "node-a");

    engine
        .events()
        .append(&[event("order-1", 0, "Placed"), event("order-1", 1, "Paid")])
        .unwrap();
    engine.events().append(&[event("order-1", 2, "Shipped")]).unwrap();

    let events = engine.events().read_stream("order-1", 0).unwrap();
    let types: Vec<_> = events.iter().map(|e| e.payload.type_name.as_str()).collect();
    assert_eq!(
        types,
        vec![
            "com.example.orders.Placed",
            "com.example.orders.Paid",
            "com.example.orders.Shipped"
        ]
    );
    assert_eq!(
        events.iter().map(|e| e.global_sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(engine.events().last_sequence_number("order-1").unwrap(), Some(2));
    assert_eq!(engine.events().last_sequence_number("order-2").unwrap(), None);
}

#[test]
fn read_from_middle_of_stream() {
    let store = store();
    let engine = open(&store, "node-a");
    let batch: Vec<_> = (0..5).map(|n| event("s", n, "Tick")).collect();
    engine.events().append(&batch).unwrap();

    let tail = engine.events().read_stream("s", 3).unwrap();
    assert_eq!(
        tail.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
        vec![3, 4]
    );
}

#[test]
fn second_writer_loses_the_slot() {
    let store = store();
    let a = open(&store, "node-a");
    let b = open(&store, "node-b");

    a.events().append(&[event("order-1", 0, "Placed")]).unwrap();
    let err = b.events().append(&[event("order-1", 0, "Placed")]).unwrap_err();
    assert!(matches!(err, Error::StreamConflict { sequence_number: 0, .. }));

    // the loser's reserved global sequence is never written
    b.events().append(&[event("order-1", 1, "Paid")]).unwrap();
    let stored = a.events().read_stream("order-1", 0).unwrap();
    assert_eq!(
        stored.iter().map(|e| e.global_sequence).collect::<Vec<_>>(),
        vec![1, 3]
    );
}

#[test]
fn payload_and_metadata_survive_storage() {
    let store = store();
    let engine = open(&store, "node-a");
    let original = event("order-9", 0, "Placed").with_metadata(br#"{"trace":"abc"}"#.to_vec());
    engine.events().append(&[original.clone()]).unwrap();

    let stored = &engine.events().read_stream("order-9", 0).unwrap()[0];
    assert_eq!(stored.id, original.id);
    assert_eq!(stored.event_type.as_deref(), Some("Order"));
    assert_eq!(stored.payload, original.payload);
    assert_eq!(stored.metadata, original.metadata);
    assert_eq!(stored.timestamp, original.timestamp);
}
