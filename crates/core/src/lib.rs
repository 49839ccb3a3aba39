//! Core types and traits for ordo
//!
//! This crate defines the vocabulary shared by the store and the engine:
//! - AttributeValue / Attribute<T>: typed access to schemaless items
//! - Condition / UpdateAction: server-evaluated write expressions
//! - GetItem, PutItem, UpdateItem, Query, TransactWrite: store requests
//! - TableDefinition: table and index key schemas
//! - ItemStore: the backing store seam
//! - EventMessage / StoredEvent / TrackedEvent: event log records
//! - GapAwareCursor / TrackingCursor: tracking resume positions
//! - GlobalPosition: bucket/offset split of a global sequence
//! - Timestamp / Clock: time
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod clock;
pub mod cursor;
pub mod error;
pub mod event;
pub mod expression;
pub mod position;
pub mod request;
pub mod table;
pub mod timestamp;
pub mod traits;

pub use attribute::{Attribute, AttributeType, AttributeValue, Item, MAX_STORED_U64};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cursor::{
    CursorSchema, EncodedCursor, GapAwareCursor, GlobalSequenceCursor, TrackingCursor,
    DEFAULT_GAP_WINDOW,
};
pub use error::{CancellationReason, ConfigError, Error, Result, StoreError, StoreResult};
pub use event::{EventMessage, SerializedPayload, StoredEvent, TrackedEvent};
pub use expression::{Condition, ReturnValues, UpdateAction};
pub use position::{GlobalPosition, BUCKET_WIDTH};
pub use request::{
    GetItem, ItemKey, PutItem, Query, QueryOutput, RangeCondition, TransactWrite, UpdateItem,
    MAX_TRANSACT_ITEMS,
};
pub use table::{IndexDefinition, TableDefinition};
pub use timestamp::Timestamp;
pub use traits::ItemStore;
