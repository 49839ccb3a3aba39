//! Event log engine for ordo
//!
//! This crate implements the storage protocol on top of any
//! [`ItemStore`](ordo_core::ItemStore):
//! - Sequence: the global sequence counter
//! - Event store: conditional appends and per-stream reads
//! - Tracking: gap-aware reads of the global order
//! - Claims: lease-based segment ownership with stored cursors
//! - Engine: the facade wiring all of the above from one config
//!
//! The row layout shared by these lives in [`schema`]; the event envelope
//! format in [`envelope`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod claims;
pub mod codec;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod event_store;
pub mod schema;
pub mod sequence;
pub mod tracking;

pub use claims::{ClaimMode, ClaimRecord, SegmentClaimStore};
pub use codec::{EnvelopeCodec, GzipCodec, IdentityCodec};
pub use config::{
    default_node_id, EngineConfig, Settings, CONFIG_FILE_NAME, DEFAULT_CLAIM_TIMEOUT_MS,
    DEFAULT_FETCH_BATCH_SIZE,
};
pub use engine::StorageEngine;
pub use envelope::EventRowMapper;
pub use event_store::EventLogStore;
pub use schema::event_table;
pub use sequence::SequenceAllocator;
pub use tracking::{TrackingBatch, TrackingReader, GAP_HORIZON};
