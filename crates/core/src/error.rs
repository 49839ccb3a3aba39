//! Error types for ordo
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Layers
//!
//! - [`StoreError`]: the failure vocabulary of the backing item store
//!   (conditional check failures, cancelled transactions, throttling).
//! - [`Error`]: the engine-facing error. Store failures the engine does not
//!   interpret are carried through unmodified in [`Error::Store`].
//! - [`ConfigError`]: eager configuration validation failures.

use crate::attribute::Item;
use thiserror::Error;

/// Result type alias for ordo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for backing store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for the ordo engine
#[derive(Debug, Error)]
pub enum Error {
    /// A single append hit an occupied (stream, sequence) slot
    #[error("Stream conflict: {stream_id}[{sequence_number}] is already written")]
    StreamConflict {
        /// Stream the append targeted
        stream_id: String,
        /// Occupied sequence number
        sequence_number: u64,
    },

    /// A batch append transaction was cancelled because an item's condition failed.
    ///
    /// The store does not report which item failed; the whole batch must be
    /// resubmitted.
    #[error("Concurrent append conflict: batch of {events} event(s) starting at {first_stream_id} was rejected")]
    ConcurrentAppendConflict {
        /// Number of events in the rejected batch
        events: usize,
        /// Stream of the first event in the batch (for diagnostics only)
        first_stream_id: String,
    },

    /// A segment claim or release was refused
    #[error("Unable to claim {group}[{segment}]: {}", describe_owner(.owner))]
    ClaimDenied {
        /// Consumer group name
        group: String,
        /// Segment id
        segment: u32,
        /// Owner holding the claim when the request was evaluated, if any
        owner: Option<String>,
    },

    /// A cursor of a schema the caller cannot use was supplied
    #[error("Unsupported cursor: {0}")]
    UnsupportedCursor(String),

    /// Backing store failure, propagated unmodified
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compression codec error
    #[error("Codec error: {0}")]
    Codec(String),

    /// Stored row is missing an attribute or has one of the wrong type
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Invalid argument supplied by the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration rejected at validation time
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn describe_owner(owner: &Option<String>) -> String {
    match owner {
        Some(owner) => format!("it is owned by {}", owner),
        None => "it is not owned by the requester".to_string(),
    }
}

impl Error {
    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// True when the underlying failure is a transient store error
    /// (throttling or unavailability) the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(e) if e.is_transient())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Reason a single item in a cancelled transaction was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// The item was not the cause of the cancellation
    None,
    /// The item's condition evaluated to false
    ConditionalCheckFailed,
}

/// Errors reported by an [`ItemStore`](crate::traits::ItemStore)
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A conditional write found its precondition false
    #[error("The conditional request failed")]
    ConditionalCheckFailed {
        /// The item as it existed when the condition was evaluated
        item: Option<Item>,
    },

    /// A multi-item transaction was cancelled; nothing was written
    #[error("Transaction cancelled: {} item(s) failed their condition", count_failed(.reasons))]
    TransactionCanceled {
        /// One reason per request item, in request order
        reasons: Vec<CancellationReason>,
    },

    /// Request rate exceeded, retry later
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Store unreachable or timed out
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Table or index does not exist
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Malformed request
    #[error("Validation error: {0}")]
    Validation(String),
}

fn count_failed(reasons: &[CancellationReason]) -> usize {
    reasons
        .iter()
        .filter(|r| **r == CancellationReason::ConditionalCheckFailed)
        .count()
}

impl StoreError {
    /// Whether the failure is transient (the same request may succeed later)
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Throttled(_) | StoreError::Unavailable(_))
    }

    /// Whether this is a condition failure on a single write or a transaction
    pub fn is_condition_failure(&self) -> bool {
        match self {
            StoreError::ConditionalCheckFailed { .. } => true,
            StoreError::TransactionCanceled { reasons } => reasons
                .iter()
                .any(|r| *r == CancellationReason::ConditionalCheckFailed),
            _ => false,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// One or more required fields are absent (all of them are listed)
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// A field has an unusable value
    #[error("Invalid configuration for '{field}': {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The configuration source could not be read or parsed
    #[error("Failed to load configuration: {0}")]
    Load(String),
}
