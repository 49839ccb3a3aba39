//! Segment claims
//!
//! Lease-based ownership of the numbered segments of a consumer group, with
//! the owner's tracking cursor stored in the claim row.
//!
//! # Design
//!
//! Every claim is a single conditional update: the store evaluates who owns
//! the row and writes the new owner in the same atomic step, so there is no
//! read-then-write window in which two workers could both win. A refused
//! claim comes back with the row as it was, which is how the current owner
//! is reported without a second read.
//!
//! Releasing removes only the owner attribute. The row and its cursor stay,
//! so the next claimant resumes where the previous owner stopped, and
//! [`SegmentClaimStore::list_segments`] keeps discovering the segment.
//!
//! ```text
//!   Unclaimed ──claim──▶ Claimed(owner, ts) ──lease expires──▶ Expired
//!       ▲                  │  ▲        │                          │
//!       └────release───────┘  └─renew──┘         ExpiryAwareClaim─┘
//! ```

use crate::schema::{claim_key, CLAIMED_AT, CURSOR, CURSOR_SCHEMA, OWNER, SEGMENT};
use ordo_core::{
    Clock, Condition, Error, GapAwareCursor, GetItem, Item, ItemKey, ItemStore, Query, Result,
    ReturnValues, StoreError, Timestamp, TrackingCursor, UpdateAction, UpdateItem,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// How a claim treats a row owned by someone else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimMode {
    /// Succeed only if the row is unowned or already owned by the claimant.
    /// An expired lease held by another owner is still refused.
    StrictRenewal,
    /// Additionally succeed when the current lease has expired.
    ExpiryAwareClaim,
}

/// A claim row as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRecord {
    /// Segment id
    pub segment: u32,
    /// Current owner; `None` once released
    pub owner: Option<String>,
    /// When the current or last owner claimed the segment
    pub claimed_at: Option<Timestamp>,
    /// Last stored cursor
    pub cursor: Option<TrackingCursor>,
}

/// Lease-based segment ownership with cursor persistence
pub struct SegmentClaimStore {
    store: Arc<dyn ItemStore>,
    table: String,
    node_id: String,
    claim_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl SegmentClaimStore {
    /// Claim store over `table`, claiming as `node_id`
    pub fn new(
        store: Arc<dyn ItemStore>,
        table: impl Into<String>,
        node_id: impl Into<String>,
        claim_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            node_id: node_id.into(),
            claim_timeout,
            clock,
        }
    }

    /// Owner identity this store claims under
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Lease length
    pub fn claim_timeout(&self) -> Duration {
        self.claim_timeout
    }

    fn key(group: &str, segment: u32) -> ItemKey {
        ItemKey::new(claim_key(group), SEGMENT.value(&segment))
    }

    // =========================================================================
    // Protocol
    // =========================================================================

    /// Take or renew `group[segment]` for `owner`
    ///
    /// Writes the owner and the current time, plus `cursor` and its schema tag
    /// when given. Returns the cursor stored before this write, if any. A
    /// previous cursor that no longer decodes is logged and reported as
    /// absent; the write has already happened by then.
    ///
    /// # Errors
    ///
    /// [`Error::ClaimDenied`] naming the current owner when `mode` does not
    /// allow taking the row.
    pub fn claim(
        &self,
        group: &str,
        segment: u32,
        owner: &str,
        cursor: Option<&TrackingCursor>,
        mode: ClaimMode,
    ) -> Result<Option<TrackingCursor>> {
        let start = Instant::now();
        let now = self.clock.now();
        let owner_value = owner.to_string();

        let mut condition =
            Condition::not_exists(OWNER).or(Condition::equals(OWNER, &owner_value));
        if mode == ClaimMode::ExpiryAwareClaim {
            let cutoff = now.saturating_sub(self.claim_timeout).as_millis();
            condition = condition.or(Condition::less_than(CLAIMED_AT, &cutoff));
        }

        let mut request = UpdateItem::new(self.table.clone(), Self::key(group, segment))
            .action(UpdateAction::set(OWNER, &owner_value))
            .action(UpdateAction::set(CLAIMED_AT, &now.as_millis()))
            .with_condition(condition)
            .returning(ReturnValues::AllOld);
        if let Some(cursor) = cursor {
            let encoded = cursor.encode()?;
            request = request
                .action(UpdateAction::set(CURSOR, &encoded.body))
                .action(UpdateAction::set(
                    CURSOR_SCHEMA,
                    &encoded.schema.tag().to_string(),
                ));
        }

        match self.store.update_item(request) {
            Ok(previous) => {
                let previous = match previous.as_ref().map(read_cursor).transpose() {
                    Ok(previous) => previous.flatten(),
                    Err(e) => {
                        warn!(
                            target: "ordo::claims",
                            group,
                            segment,
                            owner,
                            error = %e,
                            "Discarding unreadable previous cursor"
                        );
                        None
                    }
                };
                debug!(
                    target: "ordo::claims",
                    group,
                    segment,
                    owner,
                    ?mode,
                    stored_cursor = cursor.is_some(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Claimed segment"
                );
                Ok(previous)
            }
            Err(StoreError::ConditionalCheckFailed { item }) => {
                let holder = item.as_ref().and_then(|i| OWNER.get_opt(i).ok().flatten());
                debug!(
                    target: "ordo::claims",
                    group,
                    segment,
                    owner,
                    ?mode,
                    holder = holder.as_deref().unwrap_or("-"),
                    "Claim denied"
                );
                Err(Error::ClaimDenied {
                    group: group.to_string(),
                    segment,
                    owner: holder,
                })
            }
            Err(e) => {
                error!(target: "ordo::claims", group, segment, error = %e, "Failed to claim segment");
                Err(e.into())
            }
        }
    }

    /// Give up `group[segment]` held by `owner`
    ///
    /// Only the owner attribute is removed; the claim time and cursor stay.
    ///
    /// # Errors
    ///
    /// [`Error::ClaimDenied`] if `owner` does not hold the claim, including
    /// when it was already released.
    pub fn release(&self, group: &str, segment: u32, owner: &str) -> Result<()> {
        let start = Instant::now();
        let request = UpdateItem::new(self.table.clone(), Self::key(group, segment))
            .action(UpdateAction::remove(OWNER))
            .with_condition(Condition::equals(OWNER, &owner.to_string()));

        match self.store.update_item(request) {
            Ok(_) => {
                debug!(
                    target: "ordo::claims",
                    group,
                    segment,
                    owner,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Released segment"
                );
                Ok(())
            }
            Err(StoreError::ConditionalCheckFailed { item }) => {
                let holder = item.as_ref().and_then(|i| OWNER.get_opt(i).ok().flatten());
                debug!(target: "ordo::claims", group, segment, owner, "Release denied");
                Err(Error::ClaimDenied {
                    group: group.to_string(),
                    segment,
                    owner: holder,
                })
            }
            Err(e) => {
                error!(target: "ordo::claims", group, segment, error = %e, "Failed to release segment");
                Err(e.into())
            }
        }
    }

    /// Every segment id ever claimed in `group`, ascending
    pub fn list_segments(&self, group: &str) -> Result<Vec<u32>> {
        let start = Instant::now();
        let output = self
            .store
            .query(Query::table(self.table.clone(), claim_key(group)))?;
        let segments = output
            .items
            .iter()
            .map(|item| SEGMENT.get(item))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            target: "ordo::claims",
            group,
            segments = segments.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Listed segments"
        );
        Ok(segments)
    }

    /// Read a claim row without changing it
    pub fn inspect(&self, group: &str, segment: u32) -> Result<Option<ClaimRecord>> {
        let item = self.store.get_item(GetItem {
            table: self.table.clone(),
            key: Self::key(group, segment),
        })?;
        item.map(|item| {
            Ok(ClaimRecord {
                segment,
                owner: OWNER.get_opt(&item)?,
                claimed_at: CLAIMED_AT.get_opt(&item)?.map(Timestamp::from_millis),
                cursor: read_cursor(&item)?,
            })
        })
        .transpose()
    }

    // =========================================================================
    // This node's conveniences
    // =========================================================================

    /// Persist `cursor` for `group[segment]`, renewing this node's claim
    pub fn store_cursor(&self, group: &str, segment: u32, cursor: &TrackingCursor) -> Result<()> {
        self.claim(
            group,
            segment,
            &self.node_id,
            Some(cursor),
            ClaimMode::StrictRenewal,
        )
        .map(|_| ())
    }

    /// Renew this node's claim without touching the cursor
    pub fn extend_claim(&self, group: &str, segment: u32) -> Result<()> {
        self.claim(group, segment, &self.node_id, None, ClaimMode::StrictRenewal)
            .map(|_| ())
    }

    /// Claim `group[segment]` for this node (taking over an expired lease)
    /// and return the cursor to resume from
    ///
    /// A segment without a stored cursor, or with one that no longer decodes,
    /// starts from the beginning.
    pub fn fetch_cursor(&self, group: &str, segment: u32) -> Result<TrackingCursor> {
        let cursor = self.claim(
            group,
            segment,
            &self.node_id,
            None,
            ClaimMode::ExpiryAwareClaim,
        )?;
        Ok(cursor.unwrap_or_else(|| GapAwareCursor::initial().into()))
    }

    /// Release this node's claim on `group[segment]`
    pub fn release_claim(&self, group: &str, segment: u32) -> Result<()> {
        self.release(group, segment, &self.node_id)
    }
}

fn read_cursor(item: &Item) -> Result<Option<TrackingCursor>> {
    let Some(body) = CURSOR.get_opt(item)? else {
        return Ok(None);
    };
    let tag = CURSOR_SCHEMA.get(item)?;
    TrackingCursor::decode(&tag, &body).map(Some)
}

impl std::fmt::Debug for SegmentClaimStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentClaimStore")
            .field("table", &self.table)
            .field("node_id", &self.node_id)
            .field("claim_timeout", &self.claim_timeout)
            .finish()
    }
}
