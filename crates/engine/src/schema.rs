//! Row layout of the shared table
//!
//! Events, the global sequence counter and segment claims all live in one
//! table keyed by `hk` (string) and `sk` (number). The hash key prefix tells
//! the row kinds apart:
//!
//! | Row     | `hk`                      | `sk`            | Other attributes        |
//! |---------|---------------------------|-----------------|-------------------------|
//! | Event   | `e:<stream>`              | stream sequence | `gsh`, `gsl`, `e`       |
//! | Counter | `s:globalEventSequence`   | `0`             | `value`                 |
//! | Claim   | `t:<group>`               | segment id      | `o`, `ts`, `tt`, `ttc`  |
//!
//! The global-order index is keyed by `gsh` (bucket) and `gsl` (offset); only
//! event rows carry those attributes.

use ordo_core::{Attribute, TableDefinition};

/// Table hash key
pub const HASH_KEY: Attribute<String> = Attribute::new("hk");
/// Table range key on event rows
pub const SEQUENCE_NUMBER: Attribute<u64> = Attribute::new("sk");
/// Table range key on claim rows
pub const SEGMENT: Attribute<u32> = Attribute::new("sk");
/// Global-order index hash key
pub const GLOBAL_BUCKET: Attribute<u64> = Attribute::new("gsh");
/// Global-order index range key
pub const GLOBAL_OFFSET: Attribute<u64> = Attribute::new("gsl");
/// Compressed event envelope
pub const ENVELOPE: Attribute<Vec<u8>> = Attribute::new("e");
/// Counter value
pub const COUNTER_VALUE: Attribute<i64> = Attribute::new("value");
/// Claim owner
pub const OWNER: Attribute<String> = Attribute::new("o");
/// Claim time, milliseconds since epoch
pub const CLAIMED_AT: Attribute<u64> = Attribute::new("ts");
/// Serialized cursor body
pub const CURSOR: Attribute<String> = Attribute::new("tt");
/// Cursor schema tag
pub const CURSOR_SCHEMA: Attribute<String> = Attribute::new("ttc");

/// Hash key prefix of event rows
pub const EVENT_PREFIX: &str = "e:";
/// Hash key prefix of claim rows
pub const CLAIM_PREFIX: &str = "t:";
/// Hash key of the global sequence counter row
pub const COUNTER_KEY: &str = "s:globalEventSequence";

/// Hash key of a stream's event rows
pub fn event_key(stream_id: &str) -> String {
    format!("{}{}", EVENT_PREFIX, stream_id)
}

/// Hash key of a consumer group's claim rows
pub fn claim_key(group: &str) -> String {
    format!("{}{}", CLAIM_PREFIX, group)
}

/// Key schema to provision the table with
pub fn event_table(table: &str, index: &str) -> TableDefinition {
    TableDefinition::new(table, HASH_KEY.name(), SEQUENCE_NUMBER.name()).with_index(
        index,
        GLOBAL_BUCKET.name(),
        GLOBAL_OFFSET.name(),
    )
}
