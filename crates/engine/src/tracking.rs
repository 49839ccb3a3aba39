//! Tracking reader
//!
//! Reads the global-order index as one ordered stream of events.
//!
//! # Design
//!
//! The reader is stateless: every call takes the cursor the previous call
//! returned and produces the next batch plus a new cursor.
//!
//! Global sequences are allocated before their events are written, so the
//! index may show 4 and 5 while 3 is still in flight (or will never arrive).
//! The cursor remembers such skipped numbers as gaps and every call re-reads
//! each outstanding gap with an exact index lookup next to the continuation
//! read past the cursor's index. Those reads are independent; they are fanned
//! out on the rayon pool and joined before merging, and any single failure
//! fails the call.
//!
//! Gaps are only recorded while events are recent. Once an event older than
//! the gap horizon (60 s) is consumed, every gap below it is dropped for good.
//!
//! # Reads per call
//!
//! | Cursor          | Reads                                                   |
//! |-----------------|---------------------------------------------------------|
//! | none            | bucket 0                                                |
//! | no gaps         | continuation (plus next bucket when near a bucket end)  |
//! | gaps            | one exact lookup per gap, plus the continuation         |

use crate::envelope::EventRowMapper;
use crate::schema::{GLOBAL_BUCKET, GLOBAL_OFFSET};
use ordo_core::{
    Clock, Error, GapAwareCursor, GlobalPosition, Item, ItemStore, Query, RangeCondition, Result,
    Timestamp, TrackedEvent, TrackingCursor, DEFAULT_GAP_WINDOW,
};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Age beyond which skipped sequences stop being waited for
pub const GAP_HORIZON: Duration = Duration::from_secs(60);

/// Result of one [`TrackingReader::next`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingBatch {
    /// Events in ascending global order, each with its resume cursor
    pub events: Vec<TrackedEvent>,
    /// Cursor to pass to the next call; the input cursor when nothing was
    /// consumed, `None` only if there was no input cursor either
    pub cursor: Option<TrackingCursor>,
}

#[derive(Debug, Clone, Copy)]
enum Fetch {
    FirstBucket,
    Gap(u64),
    Continuation(GlobalPosition),
}

/// Stateless ordered reader over the global-order index
pub struct TrackingReader {
    store: Arc<dyn ItemStore>,
    table: String,
    index: String,
    mapper: Arc<EventRowMapper>,
    clock: Arc<dyn Clock>,
    gap_window: u64,
    gap_horizon: Duration,
}

impl TrackingReader {
    /// Reader over `index` of `table`
    pub fn new(
        store: Arc<dyn ItemStore>,
        table: impl Into<String>,
        index: impl Into<String>,
        mapper: Arc<EventRowMapper>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            index: index.into(),
            mapper,
            clock,
            gap_window: DEFAULT_GAP_WINDOW,
            gap_horizon: GAP_HORIZON,
        }
    }

    /// Override how far below the index gaps are kept
    pub fn with_gap_window(mut self, window: u64) -> Self {
        self.gap_window = window;
        self
    }

    /// Override how long skipped sequences are waited for
    pub fn with_gap_horizon(mut self, horizon: Duration) -> Self {
        self.gap_horizon = horizon;
        self
    }

    /// Read the next batch after `previous`
    ///
    /// At most `batch_size` events are returned, in ascending global order.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for `batch_size == 0`
    /// - [`Error::UnsupportedCursor`] for a cursor that is not gap-aware
    /// - the first store failure among the fanned-out reads
    pub fn next(
        &self,
        previous: Option<&TrackingCursor>,
        batch_size: usize,
    ) -> Result<TrackingBatch> {
        if batch_size == 0 {
            return Err(Error::invalid_input("batch size must be greater than zero"));
        }
        let previous = previous.map(TrackingCursor::as_gap_aware).transpose()?;
        let start = Instant::now();

        let fetches = plan(previous);
        let results = if fetches.len() == 1 {
            vec![self.fetch(fetches[0], batch_size)?]
        } else {
            fetches
                .par_iter()
                .map(|f| self.fetch(*f, batch_size))
                .collect::<Result<Vec<_>>>()?
        };

        let mut rows = results
            .into_iter()
            .flatten()
            .map(|item| {
                let position =
                    GlobalPosition::new(GLOBAL_BUCKET.get(&item)?, GLOBAL_OFFSET.get(&item)?);
                Ok((position.sequence(), item))
            })
            .collect::<Result<Vec<_>>>()?;
        rows.sort_by_key(|(sequence, _)| *sequence);
        rows.dedup_by_key(|(sequence, _)| *sequence);
        rows.truncate(batch_size);

        let now = self.clock.now();
        let mut cursor = previous.cloned();
        let mut events = Vec::with_capacity(rows.len());
        for (sequence, item) in rows {
            if cursor.as_ref().map_or(false, |c| c.covers(sequence)) {
                debug!(target: "ordo::tracking", sequence, "Skipping already consumed event");
                continue;
            }
            let event = self.mapper.from_item(&item)?;
            let recent = self.is_recent(event.timestamp, now);
            let next = match &cursor {
                None => GapAwareCursor::starting_at(sequence, recent, self.gap_window),
                Some(c) => {
                    let advanced = c.advance_to(sequence, self.gap_window);
                    if recent {
                        advanced
                    } else {
                        advanced.truncate_gaps_below(sequence)
                    }
                }
            };
            events.push(TrackedEvent {
                event,
                cursor: next.clone().into(),
            });
            cursor = Some(next);
        }

        debug!(
            target: "ordo::tracking",
            reads = fetches.len(),
            gaps_in = previous.map_or(0, |c| c.gaps().len()),
            gaps_out = cursor.as_ref().map_or(0, |c| c.gaps().len()),
            returned = events.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tracked batch"
        );
        Ok(TrackingBatch {
            events,
            cursor: cursor.map(TrackingCursor::from),
        })
    }

    fn is_recent(&self, timestamp: Timestamp, now: Timestamp) -> bool {
        match now.duration_since(timestamp) {
            Some(age) => age < self.gap_horizon,
            // written "in the future" relative to our clock
            None => true,
        }
    }

    fn fetch(&self, fetch: Fetch, batch_size: usize) -> Result<Vec<Item>> {
        match fetch {
            Fetch::FirstBucket => self.query(0, None, Some(batch_size)),
            Fetch::Gap(sequence) => {
                let position = GlobalPosition::of(sequence);
                self.query(
                    position.bucket,
                    Some(RangeCondition::Eq(GLOBAL_OFFSET.value(&position.offset))),
                    None,
                )
            }
            Fetch::Continuation(from) => {
                let items = self.query(
                    from.bucket,
                    Some(RangeCondition::Ge(GLOBAL_OFFSET.value(&from.offset))),
                    Some(batch_size),
                )?;
                if items.is_empty() && from.near_bucket_end() {
                    let next = from.next_bucket();
                    debug!(target: "ordo::tracking", bucket = next.bucket, "Looking ahead into next bucket");
                    self.query(
                        next.bucket,
                        Some(RangeCondition::Ge(GLOBAL_OFFSET.value(&next.offset))),
                        Some(batch_size),
                    )
                } else {
                    Ok(items)
                }
            }
        }
    }

    fn query(
        &self,
        bucket: u64,
        range: Option<RangeCondition>,
        limit: Option<usize>,
    ) -> Result<Vec<Item>> {
        let mut query = Query::index(
            self.table.clone(),
            self.index.clone(),
            GLOBAL_BUCKET.value(&bucket),
        );
        if let Some(range) = range {
            query = query.range(range);
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        Ok(self.store.query(query)?.items)
    }
}

/// Reads needed to continue after `previous`
fn plan(previous: Option<&GapAwareCursor>) -> Vec<Fetch> {
    let Some(cursor) = previous else {
        return vec![Fetch::FirstBucket];
    };
    let index = cursor.index();
    let from = GlobalPosition::of(if index == 0 { 0 } else { index + 1 });
    cursor
        .gaps()
        .iter()
        .map(|g| Fetch::Gap(*g))
        .chain(std::iter::once(Fetch::Continuation(from)))
        .collect()
}

impl std::fmt::Debug for TrackingReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingReader")
            .field("table", &self.table)
            .field("index", &self.index)
            .field("gap_window", &self.gap_window)
            .field("gap_horizon", &self.gap_horizon)
            .finish()
    }
}
