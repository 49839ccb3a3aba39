//! Ordo - globally ordered event log over a conditional item store
//!
//! Ordo stores event streams in a single key-value table that supports
//! conditional writes, atomic counters and a secondary index. It provides:
//!
//! - per-stream appends with optimistic concurrency
//! - one global order across all streams, read with gap-aware cursors
//! - lease-based segment claims that persist each consumer's cursor
//!
//! # Quick Start
//!
//! ```ignore
//! use ordo::{event_table, EngineConfig, EventMessage, MemoryItemStore, SerializedPayload, StorageEngine};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryItemStore::with_table(event_table("events", "global")));
//! let engine = StorageEngine::open(&EngineConfig::new("events", "global"), store)?;
//!
//! engine.events().append(&[EventMessage::new("order-1", 0, SerializedPayload::new("Placed", b"{}".to_vec()))])?;
//!
//! let cursor = engine.claims().fetch_cursor("projector", 0)?;
//! let batch = engine.track(Some(&cursor))?;
//! if let Some(next) = &batch.cursor {
//!     engine.claims().store_cursor("projector", 0, next)?;
//! }
//! ```
//!
//! # Architecture
//!
//! - `ordo-core`: item store contract, cursors, events, errors
//! - `ordo-storage`: in-memory item store with conditional writes and indexes
//! - `ordo-engine`: sequence counter, event log, tracking reader, claims

pub use ordo_core::{
    Clock, ConfigError, Error, EventMessage, GapAwareCursor, GlobalPosition, GlobalSequenceCursor,
    ItemStore, ManualClock, Result, SerializedPayload, StoreError, StoredEvent, SystemClock,
    Timestamp, TrackedEvent, TrackingCursor,
};
pub use ordo_engine::{
    event_table, ClaimMode, ClaimRecord, EngineConfig, EventLogStore, SegmentClaimStore,
    SequenceAllocator, Settings, StorageEngine, TrackingBatch, TrackingReader,
};
pub use ordo_storage::MemoryItemStore;
