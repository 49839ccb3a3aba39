//! Storage engine facade
//!
//! Wires the event log, the tracking reader and the claim store over one
//! table and one [`ItemStore`].
//!
//! ```ignore
//! use ordo_engine::{EngineConfig, StorageEngine};
//!
//! let config = EngineConfig::new("events", "global").with_node_id("worker-1");
//! let engine = StorageEngine::open(&config, store)?;
//!
//! engine.events().append(&[event])?;
//! let batch = engine.track(None)?;
//! engine.claims().store_cursor("projector", 0, batch.cursor.as_ref().unwrap())?;
//! ```

use crate::claims::SegmentClaimStore;
use crate::codec::GzipCodec;
use crate::config::{EngineConfig, Settings};
use crate::envelope::EventRowMapper;
use crate::event_store::EventLogStore;
use crate::sequence::SequenceAllocator;
use crate::tracking::{TrackingBatch, TrackingReader};
use ordo_core::{Clock, ItemStore, Result, SystemClock, TrackingCursor};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Event log, tracking reader and segment claims over one table
pub struct StorageEngine {
    settings: Settings,
    allocator: Arc<SequenceAllocator>,
    events: EventLogStore,
    tracking: TrackingReader,
    claims: SegmentClaimStore,
}

impl StorageEngine {
    /// Open over `store` using the system clock
    ///
    /// # Errors
    ///
    /// [`Error::Config`](ordo_core::Error::Config) for an invalid `config`,
    /// or a store failure while creating the sequence counter.
    pub fn open(config: &EngineConfig, store: Arc<dyn ItemStore>) -> Result<Self> {
        Self::open_with_clock(config, store, Arc::new(SystemClock))
    }

    /// Open over `store` reading time from `clock`
    pub fn open_with_clock(
        config: &EngineConfig,
        store: Arc<dyn ItemStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let settings = config.validate()?;
        Self::from_settings(settings, store, clock)
    }

    /// Open with already validated settings
    pub fn from_settings(
        settings: Settings,
        store: Arc<dyn ItemStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let start = Instant::now();
        let allocator = Arc::new(SequenceAllocator::open(
            store.clone(),
            settings.table_name.clone(),
        )?);
        let mapper = Arc::new(EventRowMapper::new(
            Box::new(GzipCodec::default()),
            settings.payload_type_prefix.clone(),
        ));

        let events = EventLogStore::new(
            store.clone(),
            settings.table_name.clone(),
            allocator.clone(),
            mapper.clone(),
            settings.fetch_batch_size,
        );
        let tracking = TrackingReader::new(
            store.clone(),
            settings.table_name.clone(),
            settings.index_name.clone(),
            mapper,
            clock.clone(),
        );
        let claims = SegmentClaimStore::new(
            store,
            settings.table_name.clone(),
            settings.node_id.clone(),
            settings.claim_timeout,
            clock,
        );

        info!(
            target: "ordo::engine",
            table = %settings.table_name,
            index = %settings.index_name,
            node_id = %settings.node_id,
            claim_timeout_ms = settings.claim_timeout.as_millis() as u64,
            fetch_batch_size = settings.fetch_batch_size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Storage engine opened"
        );

        Ok(Self {
            settings,
            allocator,
            events,
            tracking,
            claims,
        })
    }

    /// Settings in effect
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Event log
    pub fn events(&self) -> &EventLogStore {
        &self.events
    }

    /// Tracking reader
    pub fn tracking(&self) -> &TrackingReader {
        &self.tracking
    }

    /// Segment claims
    pub fn claims(&self) -> &SegmentClaimStore {
        &self.claims
    }

    /// Global sequence allocator
    pub fn sequence(&self) -> &SequenceAllocator {
        &self.allocator
    }

    /// Next tracking batch after `previous`, sized by `fetch_batch_size`
    pub fn track(&self, previous: Option<&TrackingCursor>) -> Result<TrackingBatch> {
        self.tracking.next(previous, self.settings.fetch_batch_size)
    }
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::event_table;
    use ordo_core::{ConfigError, Error, EventMessage, SerializedPayload};
    use ordo_storage::MemoryItemStore;

    fn store() -> Arc<MemoryItemStore> {
        Arc::new(MemoryItemStore::with_table(event_table("events", "global")))
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = EngineConfig::default();
        let err = StorageEngine::open(&config, store()).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingFields(ref fields)) if fields == &["table_name", "index_name"]
        ));
    }

    #[test]
    fn test_open_missing_table_fails() {
        let config = EngineConfig::new("missing", "global");
        assert!(StorageEngine::open(&config, store()).is_err());
    }

    #[test]
    fn test_append_then_track() {
        let config = EngineConfig::new("events", "global").with_node_id("n1");
        let engine = StorageEngine::open(&config, store()).unwrap();
        assert_eq!(engine.settings().node_id, "n1");

        engine
            .events()
            .append(&[EventMessage::new(
                "s",
                0,
                SerializedPayload::new("Created", b"{}".to_vec()),
            )])
            .unwrap();

        let batch = engine.track(None).unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].event.global_sequence, 1);
        assert_eq!(batch.cursor.map(|c| c.index()), Some(1));
        assert_eq!(engine.sequence().current().unwrap(), 1);
    }
}
