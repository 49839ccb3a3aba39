//! Global sequence allocation
//!
//! One counter row holds the last allocated global sequence. Reserving `n`
//! numbers is a single atomic `ADD n` that returns the previous value, so
//! concurrent callers always receive disjoint, contiguous ranges without any
//! client-side coordination.
//!
//! Numbers reserved by a caller that then fails before writing are never
//! reissued. They become gaps that tracking readers wait for and eventually
//! give up on.

use crate::schema::{COUNTER_KEY, COUNTER_VALUE, HASH_KEY, SEQUENCE_NUMBER};
use ordo_core::{
    Condition, Error, GetItem, Item, ItemKey, ItemStore, PutItem, Result, ReturnValues,
    StoreError, UpdateAction, UpdateItem,
};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Issues contiguous ranges of the global sequence
pub struct SequenceAllocator {
    store: Arc<dyn ItemStore>,
    table: String,
}

impl SequenceAllocator {
    /// Allocator over the counter row of `table`, creating the row at 0 if it
    /// does not exist
    ///
    /// Safe to call from any number of processes at once: the create is
    /// conditional on the row being absent, so an existing value is never
    /// reset.
    pub fn open(store: Arc<dyn ItemStore>, table: impl Into<String>) -> Result<Self> {
        let allocator = Self {
            store,
            table: table.into(),
        };
        allocator.initialize()?;
        Ok(allocator)
    }

    fn counter_key() -> ItemKey {
        ItemKey::new(COUNTER_KEY, 0_i64)
    }

    fn initialize(&self) -> Result<()> {
        let mut item = Item::new();
        HASH_KEY.put(&mut item, COUNTER_KEY.to_string());
        SEQUENCE_NUMBER.put(&mut item, 0);
        COUNTER_VALUE.put(&mut item, 0);

        let request =
            PutItem::new(self.table.clone(), item).with_condition(Condition::not_exists(HASH_KEY));
        match self.store.put_item(request) {
            Ok(()) => {
                info!(target: "ordo::sequence", table = %self.table, "Created global sequence counter");
                Ok(())
            }
            Err(StoreError::ConditionalCheckFailed { .. }) => {
                debug!(target: "ordo::sequence", table = %self.table, "Global sequence counter exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reserve `n` consecutive global sequence numbers
    ///
    /// The first number ever issued is 1.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for `n == 0`
    /// - store failures, unmodified
    pub fn reserve(&self, n: u64) -> Result<RangeInclusive<u64>> {
        if n == 0 {
            return Err(Error::invalid_input("cannot reserve zero sequence numbers"));
        }
        let delta = i64::try_from(n)
            .map_err(|_| Error::invalid_input(format!("cannot reserve {} sequence numbers", n)))?;

        let start = Instant::now();
        let previous = self.store.update_item(
            UpdateItem::new(self.table.clone(), Self::counter_key())
                .action(UpdateAction::add(COUNTER_VALUE, delta))
                .returning(ReturnValues::UpdatedOld),
        )?;
        let old = match previous {
            Some(item) => COUNTER_VALUE.get(&item)?,
            None => 0,
        };
        let old = u64::try_from(old)
            .map_err(|_| Error::corruption(format!("global sequence counter is negative: {}", old)))?;

        let range = (old + 1)..=(old + n);
        debug!(
            target: "ordo::sequence",
            first = *range.start(),
            last = *range.end(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Reserved global sequence range"
        );
        Ok(range)
    }

    /// Last sequence number issued so far (0 before the first reservation)
    pub fn current(&self) -> Result<u64> {
        let item = self.store.get_item(GetItem {
            table: self.table.clone(),
            key: Self::counter_key(),
        })?;
        match item {
            Some(item) => COUNTER_VALUE
                .get(&item)
                .and_then(|v| {
                    u64::try_from(v)
                        .map_err(|_| Error::corruption(format!("global sequence counter is negative: {}", v)))
                }),
            None => Ok(0),
        }
    }
}

impl std::fmt::Debug for SequenceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceAllocator")
            .field("table", &self.table)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::event_table;
    use ordo_storage::{MemoryItemStore, Operation};

    fn store() -> Arc<MemoryItemStore> {
        Arc::new(MemoryItemStore::with_table(event_table("events", "global")))
    }

    #[test]
    fn test_first_range_starts_at_one() {
        let allocator = SequenceAllocator::open(store(), "events").unwrap();
        assert_eq!(allocator.reserve(3).unwrap(), 1..=3);
        assert_eq!(allocator.reserve(1).unwrap(), 4..=4);
        assert_eq!(allocator.current().unwrap(), 4);
    }

    #[test]
    fn test_reopen_does_not_reset_counter() {
        let store = store();
        let first = SequenceAllocator::open(store.clone(), "events").unwrap();
        first.reserve(10).unwrap();

        let second = SequenceAllocator::open(store, "events").unwrap();
        assert_eq!(second.reserve(1).unwrap(), 11..=11);
    }

    #[test]
    fn test_zero_is_invalid() {
        let allocator = SequenceAllocator::open(store(), "events").unwrap();
        assert!(matches!(allocator.reserve(0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_missing_counter_row_counts_from_zero() {
        let store = store();
        let allocator = SequenceAllocator::open(store.clone(), "events").unwrap();
        // a counter row without a value behaves like 0
        store
            .put_item(PutItem::new("events", {
                let mut item = Item::new();
                HASH_KEY.put(&mut item, COUNTER_KEY.to_string());
                SEQUENCE_NUMBER.put(&mut item, 0);
                item
            }))
            .unwrap();
        assert_eq!(allocator.reserve(2).unwrap(), 1..=2);
    }

    #[test]
    fn test_unavailable_store_fails_open() {
        let store = store();
        store.inject_fault(Operation::PutItem, StoreError::Unavailable("down".into()), 1);
        let err = SequenceAllocator::open(store, "events").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_throttled_reserve_propagates() {
        let store = store();
        let allocator = SequenceAllocator::open(store.clone(), "events").unwrap();
        store.inject_fault(Operation::UpdateItem, StoreError::Throttled("slow".into()), 1);
        assert!(matches!(
            allocator.reserve(1),
            Err(Error::Store(StoreError::Throttled(_)))
        ));
        assert_eq!(allocator.reserve(1).unwrap(), 1..=1);
    }
}
