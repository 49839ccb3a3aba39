//! Shared fixtures for the engine integration suites.
//!
//! Import via `mod common;` from each test file.

#![allow(dead_code)]

use ordo_core::{Clock, EventMessage, ItemStore, ManualClock, PutItem, SerializedPayload, Timestamp};
use ordo_engine::{event_table, EngineConfig, EventRowMapper, GzipCodec, StorageEngine};
use ordo_storage::MemoryItemStore;
use std::sync::{Arc, Once};
use std::time::Duration;

pub const TABLE: &str = "events";
pub const INDEX: &str = "global";

static INIT_TRACING: Once = Once::new();

/// Route engine logs to the test harness (shown for failing tests only).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Engine over a fresh in-memory table, driven by a manual clock.
pub struct TestEngine {
    pub store: Arc<MemoryItemStore>,
    pub clock: Arc<ManualClock>,
    pub engine: StorageEngine,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::new(TABLE, INDEX).with_node_id("node-a"))
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let store = Arc::new(MemoryItemStore::with_table(event_table(TABLE, INDEX)));
        let clock = Arc::new(ManualClock::starting_now());
        let engine = StorageEngine::open_with_clock(&config, store.clone(), clock.clone())
            .expect("engine should open");
        Self {
            store,
            clock,
            engine,
        }
    }

    /// Second engine (another process) over the same table and clock.
    pub fn peer(&self, node_id: &str) -> StorageEngine {
        let config = EngineConfig::new(TABLE, INDEX).with_node_id(node_id);
        StorageEngine::open_with_clock(&config, self.store.clone(), self.clock.clone())
            .expect("peer should open")
    }

    /// Event of `stream` at `sequence`, stamped with the manual clock.
    pub fn event(&self, stream: &str, sequence: u64) -> EventMessage {
        EventMessage::new(
            stream,
            sequence,
            SerializedPayload::new("OrderPlaced", format!("{{\"n\":{}}}", sequence)),
        )
        .with_timestamp(self.clock.now())
    }

    /// Append one event and return its global sequence.
    pub fn append(&self, stream: &str, sequence: u64) -> u64 {
        self.engine
            .events()
            .append_one(&self.event(stream, sequence))
            .expect("append should succeed")
    }

    /// Write an event row at a chosen global sequence, bypassing the counter.
    ///
    /// Stands in for a slow writer that reserved `global_sequence` earlier.
    pub fn write_at(&self, global_sequence: u64, stream: &str, sequence: u64) {
        self.write_event_at(global_sequence, &self.event(stream, sequence));
    }

    pub fn write_event_at(&self, global_sequence: u64, event: &EventMessage) {
        let mapper = EventRowMapper::new(Box::new(GzipCodec::default()), None);
        let item = mapper
            .to_item(event, global_sequence)
            .expect("row should encode");
        self.store
            .put_item(PutItem::new(TABLE, item))
            .expect("row should be written");
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

/// Global sequences of a tracking batch, in order.
pub fn sequences(batch: &ordo_engine::TrackingBatch) -> Vec<u64> {
    batch
        .events
        .iter()
        .map(|e| e.event.global_sequence)
        .collect()
}
