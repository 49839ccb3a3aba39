//! Event row mapping.
//!
//! An event row stores only its keys and index attributes in the clear;
//! everything else is a JSON envelope, compressed, in the `e` attribute:
//!
//! ```json
//! {"id":"…","et":"Order","ts":"2024-05-01T12:00:00.000000Z",
//!  "ptn":"*.OrderCreated","pr":"","p":"<base64>","m":"<base64>"}
//! ```
//!
//! An absent revision is written as `""` and read back as `None`. When a
//! payload type prefix is configured, type names starting with it are stored
//! with the prefix replaced by `*`.

use crate::codec::EnvelopeCodec;
use crate::schema::{
    event_key, ENVELOPE, EVENT_PREFIX, GLOBAL_BUCKET, GLOBAL_OFFSET, HASH_KEY, SEQUENCE_NUMBER,
};
use ordo_core::{
    Error, EventMessage, GlobalPosition, Item, Result, SerializedPayload, StoredEvent, Timestamp,
    MAX_STORED_U64,
};
use serde::{Deserialize, Serialize};

const PREFIX_REPLACEMENT: &str = "*";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "et", default)]
    event_type: Option<String>,
    #[serde(rename = "ts")]
    timestamp: String,
    #[serde(rename = "ptn")]
    payload_type_name: String,
    #[serde(rename = "pr", default)]
    payload_revision: String,
    #[serde(rename = "p", with = "base64_bytes")]
    payload: Vec<u8>,
    #[serde(rename = "m", with = "base64_bytes", default)]
    metadata: Vec<u8>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        BASE64
            .decode(text.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("Invalid base64: {}", e)))
    }
}

/// Converts events to and from stored rows
pub struct EventRowMapper {
    codec: Box<dyn EnvelopeCodec>,
    payload_type_prefix: Option<String>,
}

impl EventRowMapper {
    /// Mapper using `codec` for the envelope and abbreviating `prefix`
    pub fn new(codec: Box<dyn EnvelopeCodec>, payload_type_prefix: Option<String>) -> Self {
        Self {
            codec,
            payload_type_prefix,
        }
    }

    /// Reject events whose stream sequence number cannot be stored exactly
    pub fn check_storable(event: &EventMessage) -> Result<()> {
        let sequence_number = event.storage_sequence();
        if sequence_number > MAX_STORED_U64 {
            return Err(Error::invalid_input(format!(
                "sequence number {} of stream {} exceeds {}",
                sequence_number,
                event.storage_stream(),
                MAX_STORED_U64
            )));
        }
        Ok(())
    }

    /// Build the row for `event` at `global_sequence`
    pub fn to_item(&self, event: &EventMessage, global_sequence: u64) -> Result<Item> {
        Self::check_storable(event)?;
        if global_sequence > MAX_STORED_U64 {
            return Err(Error::invalid_input(format!(
                "global sequence {} exceeds {}",
                global_sequence, MAX_STORED_U64
            )));
        }
        let envelope = Envelope {
            id: event.id.clone(),
            event_type: event.event_type.clone(),
            timestamp: event.timestamp.to_string(),
            payload_type_name: self.abbreviate(&event.payload.type_name),
            payload_revision: event.payload.revision.clone().unwrap_or_default(),
            payload: event.payload.data.clone(),
            metadata: event.metadata.clone(),
        };
        let json = serde_json::to_vec(&envelope)?;
        let position = GlobalPosition::of(global_sequence);

        let mut item = Item::new();
        HASH_KEY.put(&mut item, event_key(event.storage_stream()));
        SEQUENCE_NUMBER.put(&mut item, event.storage_sequence());
        GLOBAL_BUCKET.put(&mut item, position.bucket);
        GLOBAL_OFFSET.put(&mut item, position.offset);
        ENVELOPE.put(&mut item, self.codec.encode(&json)?);
        Ok(item)
    }

    /// Read an event back from its row
    ///
    /// # Errors
    ///
    /// [`Error::Corruption`] for rows missing attributes or carrying an
    /// unreadable timestamp; [`Error::Codec`] / [`Error::Serialization`] for
    /// an envelope that does not decode.
    pub fn from_item(&self, item: &Item) -> Result<StoredEvent> {
        let hash = HASH_KEY.get(item)?;
        let stream_id = hash
            .strip_prefix(EVENT_PREFIX)
            .ok_or_else(|| Error::corruption(format!("'{}' is not an event row", hash)))?
            .to_string();
        let sequence_number = SEQUENCE_NUMBER.get(item)?;
        let global_sequence =
            GlobalPosition::new(GLOBAL_BUCKET.get(item)?, GLOBAL_OFFSET.get(item)?).sequence();

        let json = self.codec.decode(&ENVELOPE.get(item)?)?;
        let envelope: Envelope = serde_json::from_slice(&json)?;
        let timestamp = Timestamp::parse_rfc3339(&envelope.timestamp).ok_or_else(|| {
            Error::corruption(format!(
                "event {} has unreadable timestamp '{}'",
                envelope.id, envelope.timestamp
            ))
        })?;

        Ok(StoredEvent {
            id: envelope.id,
            stream_id,
            sequence_number,
            global_sequence,
            event_type: envelope.event_type,
            timestamp,
            payload: SerializedPayload {
                type_name: self.expand(envelope.payload_type_name),
                revision: Some(envelope.payload_revision).filter(|r| !r.is_empty()),
                data: envelope.payload,
            },
            metadata: envelope.metadata,
        })
    }

    fn abbreviate(&self, type_name: &str) -> String {
        match self
            .payload_type_prefix
            .as_deref()
            .and_then(|p| type_name.strip_prefix(p))
        {
            Some(rest) => format!("{}{}", PREFIX_REPLACEMENT, rest),
            None => type_name.to_string(),
        }
    }

    fn expand(&self, stored: String) -> String {
        match (&self.payload_type_prefix, stored.strip_prefix(PREFIX_REPLACEMENT)) {
            (Some(prefix), Some(rest)) => format!("{}{}", prefix, rest),
            _ => stored,
        }
    }
}

impl std::fmt::Debug for EventRowMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRowMapper")
            .field("codec", &self.codec.codec_id())
            .field("payload_type_prefix", &self.payload_type_prefix)
            .finish()
    }
}
