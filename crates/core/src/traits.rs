//! Core trait definitions
//!
//! [`ItemStore`] is the seam between the engine and the backing store. The
//! engine is written purely against it; `ordo-storage` provides an in-process
//! implementation and deployments wire in a client for the real service.
//!
//! ## Contract
//!
//! - Single-item operations are atomic, including evaluation of their
//!   condition.
//! - `update_item` with an `Add` action is an atomic increment.
//! - `transact_write` applies every put or none of them.
//! - Consistent base-table queries observe every write that completed before
//!   the query started. Index queries may lag.
//! - Failures are reported, never retried, by the store.

use crate::attribute::Item;
use crate::error::StoreResult;
use crate::request::{GetItem, PutItem, Query, QueryOutput, TransactWrite, UpdateItem};

/// Schemaless hash/range item store with conditional writes
pub trait ItemStore: Send + Sync {
    /// Read one item by key
    fn get_item(&self, request: GetItem) -> StoreResult<Option<Item>>;

    /// Write a whole item, replacing any existing one
    ///
    /// Fails with `ConditionalCheckFailed` (carrying the existing item) when
    /// the request's condition does not hold.
    fn put_item(&self, request: PutItem) -> StoreResult<()>;

    /// Apply update actions to one item, creating it if absent
    ///
    /// Returns the attributes selected by `return_values`, or `None` when
    /// nothing was selected or there was nothing to return.
    fn update_item(&self, request: UpdateItem) -> StoreResult<Option<Item>>;

    /// Range read over one hash key
    fn query(&self, request: Query) -> StoreResult<QueryOutput>;

    /// All-or-nothing conditional multi-item write
    ///
    /// Fails with `TransactionCanceled` when any condition does not hold.
    fn transact_write(&self, request: TransactWrite) -> StoreResult<()>;
}
