//! Event log store
//!
//! Appends immutable event rows and reads them back per stream.
//!
//! # Design
//!
//! Each event row is written exactly once, conditional on its
//! (stream, sequence) slot being empty; that condition is the per-stream
//! optimistic concurrency check. The row carries the bucket and offset of its
//! global sequence, so the global-order index entry is the same physical write
//! as the stream entry.
//!
//! - one event: a conditional put
//! - several events: one transaction of conditional puts, all or nothing
//!
//! The global sequence range is reserved before writing. If the write then
//! fails, the range is simply never written.

use crate::envelope::EventRowMapper;
use crate::schema::{event_key, HASH_KEY, SEQUENCE_NUMBER};
use crate::sequence::SequenceAllocator;
use ordo_core::{
    AttributeValue, Condition, Error, EventMessage, ItemStore, PutItem, Query, RangeCondition,
    Result, StoreError, StoredEvent, TransactWrite, MAX_STORED_U64, MAX_TRANSACT_ITEMS,
};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Appends and reads event rows
pub struct EventLogStore {
    store: Arc<dyn ItemStore>,
    table: String,
    allocator: Arc<SequenceAllocator>,
    mapper: Arc<EventRowMapper>,
    batch_size: usize,
}

impl EventLogStore {
    /// Event store over `table`
    ///
    /// `batch_size` is the page size [`read_stream`](Self::read_stream) uses.
    pub fn new(
        store: Arc<dyn ItemStore>,
        table: impl Into<String>,
        allocator: Arc<SequenceAllocator>,
        mapper: Arc<EventRowMapper>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            allocator,
            mapper,
            batch_size: batch_size.max(1),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Append events, choosing the write strategy by count
    ///
    /// Nothing is written (and no sequence reserved) for an empty slice.
    pub fn append(&self, events: &[EventMessage]) -> Result<()> {
        match events {
            [] => Ok(()),
            [event] => self.append_one(event).map(|_| ()),
            _ => self.append_batch(events).map(|_| ()),
        }
    }

    /// Append one event; returns its global sequence
    ///
    /// # Errors
    ///
    /// [`Error::StreamConflict`] if the event's (stream, sequence) slot is
    /// already written. The existing row is left untouched.
    pub fn append_one(&self, event: &EventMessage) -> Result<u64> {
        let start = Instant::now();
        EventRowMapper::check_storable(event)?;
        let global_sequence = *self.allocator.reserve(1)?.start();
        let item = self.mapper.to_item(event, global_sequence)?;

        let request = PutItem::new(self.table.clone(), item)
            .with_condition(Condition::not_exists(HASH_KEY));
        match self.store.put_item(request) {
            Ok(()) => {
                debug!(
                    target: "ordo::events",
                    stream_id = %event.storage_stream(),
                    sequence_number = event.storage_sequence(),
                    global_sequence,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Appended event"
                );
                Ok(global_sequence)
            }
            Err(StoreError::ConditionalCheckFailed { .. }) => {
                debug!(
                    target: "ordo::events",
                    stream_id = %event.storage_stream(),
                    sequence_number = event.storage_sequence(),
                    global_sequence,
                    "Stream slot already written"
                );
                Err(Error::StreamConflict {
                    stream_id: event.storage_stream().to_string(),
                    sequence_number: event.storage_sequence(),
                })
            }
            Err(e) => {
                warn!(target: "ordo::events", error = %e, "Append failed");
                Err(e.into())
            }
        }
    }

    /// Append up to [`MAX_TRANSACT_ITEMS`] events atomically; returns their
    /// global sequences, assigned in slice order
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty or oversized batch
    /// - [`Error::ConcurrentAppendConflict`] if any event's slot is taken (or
    ///   two events of the batch share a slot); nothing is written
    pub fn append_batch(&self, events: &[EventMessage]) -> Result<RangeInclusive<u64>> {
        if events.is_empty() {
            return Err(Error::invalid_input("cannot append an empty batch"));
        }
        if events.len() > MAX_TRANSACT_ITEMS {
            return Err(Error::invalid_input(format!(
                "batch of {} events exceeds the limit of {}",
                events.len(),
                MAX_TRANSACT_ITEMS
            )));
        }
        events.iter().try_for_each(EventRowMapper::check_storable)?;

        let start = Instant::now();
        let range = self.allocator.reserve(events.len() as u64)?;
        let puts = events
            .iter()
            .zip(range.clone())
            .map(|(event, global_sequence)| {
                Ok(PutItem::new(self.table.clone(), self.mapper.to_item(event, global_sequence)?)
                    .with_condition(Condition::not_exists(HASH_KEY)))
            })
            .collect::<Result<Vec<_>>>()?;

        match self.store.transact_write(TransactWrite { puts }) {
            Ok(()) => {
                debug!(
                    target: "ordo::events",
                    events = events.len(),
                    first_global_sequence = *range.start(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Appended batch"
                );
                Ok(range)
            }
            Err(e) if e.is_condition_failure() => {
                debug!(
                    target: "ordo::events",
                    events = events.len(),
                    first_stream_id = %events[0].storage_stream(),
                    "Batch rejected by a conflicting append"
                );
                Err(Error::ConcurrentAppendConflict {
                    events: events.len(),
                    first_stream_id: events[0].storage_stream().to_string(),
                })
            }
            Err(e) => {
                warn!(target: "ordo::events", events = events.len(), error = %e, "Batch append failed");
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Up to `limit` events of `stream_id` from `from_sequence` on, ascending
    ///
    /// Strongly consistent: every append that completed before the call is
    /// visible. Empty once the stream is exhausted.
    pub fn fetch_by_stream(
        &self,
        stream_id: &str,
        from_sequence: u64,
        limit: usize,
    ) -> Result<Vec<StoredEvent>> {
        if limit == 0 || from_sequence > MAX_STORED_U64 {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let output = self.store.query(
            Query::table(self.table.clone(), event_key(stream_id))
                .range(RangeCondition::Ge(SEQUENCE_NUMBER.value(&from_sequence)))
                .limit(limit)
                .consistent(),
        )?;
        let events = output
            .items
            .iter()
            .map(|item| self.mapper.from_item(item))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            target: "ordo::events",
            stream_id,
            from_sequence,
            returned = events.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched stream page"
        );
        Ok(events)
    }

    /// Every event of `stream_id` from `from_sequence` on, paging through
    /// [`fetch_by_stream`](Self::fetch_by_stream)
    pub fn read_stream(&self, stream_id: &str, from_sequence: u64) -> Result<Vec<StoredEvent>> {
        let mut events = Vec::new();
        let mut next = from_sequence;
        loop {
            let page = self.fetch_by_stream(stream_id, next, self.batch_size)?;
            let full = page.len() == self.batch_size;
            if let Some(last) = page.last() {
                next = last.sequence_number + 1;
            }
            events.extend(page);
            if !full {
                return Ok(events);
            }
        }
    }

    /// Highest sequence number written to `stream_id`, if any
    pub fn last_sequence_number(&self, stream_id: &str) -> Result<Option<u64>> {
        let output = self.store.query(
            Query::table(self.table.clone(), event_key(stream_id))
                .range(RangeCondition::Ge(AttributeValue::N(0)))
                .descending()
                .limit(1)
                .consistent(),
        )?;
        output
            .items
            .first()
            .map(|item| SEQUENCE_NUMBER.get(item))
            .transpose()
    }
}

impl std::fmt::Debug for EventLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogStore")
            .field("table", &self.table)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
