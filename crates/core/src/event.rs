//! Event types
//!
//! - [`EventMessage`]: what writers append. Payload and metadata arrive
//!   already serialized; the log never interprets them.
//! - [`StoredEvent`]: an event as read back, with the global sequence it was
//!   allocated.
//! - [`TrackedEvent`]: a stored event delivered by the tracking reader
//!   together with the cursor that resumes right after it.

use crate::cursor::TrackingCursor;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A serialized domain object plus the type information needed to decode it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedPayload {
    /// Fully qualified type name
    pub type_name: String,
    /// Schema revision of the type, if versioned
    pub revision: Option<String>,
    /// Serialized bytes
    pub data: Vec<u8>,
}

impl SerializedPayload {
    /// Unversioned payload
    pub fn new(type_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            type_name: type_name.into(),
            revision: None,
            data: data.into(),
        }
    }

    /// Attach a revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

/// An event to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    /// Unique event identifier
    pub id: String,
    /// Owning stream; `None` for a standalone event
    pub stream_id: Option<String>,
    /// Position within the stream (ignored for standalone events)
    pub sequence_number: u64,
    /// Type of the stream that produced the event
    pub event_type: Option<String>,
    /// Creation time
    pub timestamp: Timestamp,
    /// Serialized payload
    pub payload: SerializedPayload,
    /// Serialized metadata
    pub metadata: Vec<u8>,
}

impl EventMessage {
    /// Event at `sequence_number` of `stream_id`, with a fresh id and the
    /// current time
    pub fn new(
        stream_id: impl Into<String>,
        sequence_number: u64,
        payload: SerializedPayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            stream_id: Some(stream_id.into()),
            sequence_number,
            event_type: None,
            timestamp: Timestamp::now(),
            payload,
            metadata: Vec::new(),
        }
    }

    /// Event that belongs to no stream
    pub fn standalone(payload: SerializedPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            stream_id: None,
            sequence_number: 0,
            event_type: None,
            timestamp: Timestamp::now(),
            payload,
            metadata: Vec::new(),
        }
    }

    /// Set the stream type
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Set the creation time
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the serialized metadata
    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Set the event id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Stream the event is stored under: its stream, or its own id when
    /// standalone
    pub fn storage_stream(&self) -> &str {
        self.stream_id.as_deref().unwrap_or(&self.id)
    }

    /// Sequence the event is stored at: 0 when standalone
    pub fn storage_sequence(&self) -> u64 {
        if self.stream_id.is_some() {
            self.sequence_number
        } else {
            0
        }
    }
}

/// An event as read from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    /// Unique event identifier
    pub id: String,
    /// Stream the event is stored under
    pub stream_id: String,
    /// Position within the stream
    pub sequence_number: u64,
    /// Allocated global sequence
    pub global_sequence: u64,
    /// Type of the stream that produced the event
    pub event_type: Option<String>,
    /// Creation time
    pub timestamp: Timestamp,
    /// Serialized payload
    pub payload: SerializedPayload,
    /// Serialized metadata
    pub metadata: Vec<u8>,
}

/// A stored event plus the cursor positioned just after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEvent {
    /// The event
    pub event: StoredEvent,
    /// Resume position after this event
    pub cursor: TrackingCursor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_storage_key() {
        let event = EventMessage::new("order-1", 4, SerializedPayload::new("Created", b"{}".to_vec()));
        assert_eq!(event.storage_stream(), "order-1");
        assert_eq!(event.storage_sequence(), 4);
    }

    #[test]
    fn test_standalone_event_is_stored_under_its_id() {
        let event = EventMessage::standalone(SerializedPayload::new("Tick", Vec::new()))
            .with_id("evt-9");
        assert_eq!(event.storage_stream(), "evt-9");
        assert_eq!(event.storage_sequence(), 0);
    }

    #[test]
    fn test_fresh_ids_differ() {
        let a = EventMessage::standalone(SerializedPayload::new("T", Vec::new()));
        let b = EventMessage::standalone(SerializedPayload::new("T", Vec::new()));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_builders() {
        let event = EventMessage::new("s", 0, SerializedPayload::new("T", vec![1]).with_revision("2"))
            .with_event_type("Order")
            .with_metadata(vec![7])
            .with_timestamp(Timestamp::from_secs(5));
        assert_eq!(event.event_type.as_deref(), Some("Order"));
        assert_eq!(event.payload.revision.as_deref(), Some("2"));
        assert_eq!(event.metadata, vec![7]);
        assert_eq!(event.timestamp, Timestamp::from_secs(5));
    }
}
