//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from a suite's main.rs.

#![allow(dead_code)]

use ordo::{event_table, EngineConfig, EventMessage, MemoryItemStore, SerializedPayload, StorageEngine};
use std::sync::{Arc, Once};

pub const TABLE: &str = "events";
pub const INDEX: &str = "events-global";

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Fresh in-memory table with the event layout.
pub fn store() -> Arc<MemoryItemStore> {
    Arc::new(MemoryItemStore::with_table(event_table(TABLE, INDEX)))
}

pub fn config(node_id: &str) -> EngineConfig {
    EngineConfig::new(TABLE, INDEX).with_node_id(node_id)
}

pub fn open(store: &Arc<MemoryItemStore>, node_id: &str) -> StorageEngine {
    init_tracing();
    StorageEngine::open(&config(node_id), store.clone()).expect("engine should open")
}

/// JSON payload `{"n": <n>}` of type `com.example.orders.<type_name>`.
pub fn event(stream: &str, sequence: u64, type_name: &str) -> EventMessage {
    EventMessage::new(
        stream,
        sequence,
        SerializedPayload::new(
            format!("com.example.orders.{}", type_name),
            serde_json::to_vec(&serde_json::json!({ "n": sequence })).expect("payload encodes"),
        ),
    )
    .with_event_type("Order")
}
