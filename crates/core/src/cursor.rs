//! Tracking cursors
//!
//! A tracking cursor is the resume position a consumer hands back to the
//! tracking reader. Cursors are persisted inside claim rows as a JSON body plus
//! a schema tag; the tag selects the variant explicitly, there is no type
//! lookup by name.
//!
//! # Gap-aware cursors
//!
//! Global sequence numbers are allocated before the events carrying them are
//! written, so a reader can observe 4 before 3 is visible, or 3 may never be
//! written at all. A [`GapAwareCursor`] records the highest sequence seen
//! (`index`) plus every lower sequence that has not been seen yet (`gaps`).
//!
//! ## Invariants
//!
//! - every gap is strictly below `index`
//! - `index` never decreases
//! - gaps never reach further back than `index - window`

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default number of sequence numbers below the index that gaps may cover
pub const DEFAULT_GAP_WINDOW: u64 = 10_000;

// ============================================================================
// GapAwareCursor
// ============================================================================

/// Highest seen global sequence plus outstanding skipped sequences
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GapAwareCursor {
    index: u64,
    #[serde(default)]
    gaps: BTreeSet<u64>,
}

impl GapAwareCursor {
    /// Cursor that has not seen anything
    pub fn initial() -> Self {
        Self::default()
    }

    /// Build from stored parts; gaps at or above `index` are discarded
    pub fn new(index: u64, gaps: impl IntoIterator<Item = u64>) -> Self {
        let gaps = gaps.into_iter().filter(|g| *g < index).collect();
        Self { index, gaps }
    }

    /// Cursor positioned at the first sequence a reader consumed
    ///
    /// With `with_gaps`, every sequence from 1 up to (excluding) `sequence`
    /// that falls inside the window is recorded as a gap.
    pub fn starting_at(sequence: u64, with_gaps: bool, window: u64) -> Self {
        let gaps = if with_gaps {
            let floor = sequence.saturating_sub(window).max(1);
            (floor..sequence).collect()
        } else {
            BTreeSet::new()
        };
        Self {
            index: sequence,
            gaps,
        }
    }

    /// Highest sequence seen
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Sequences below `index` that have not been seen, ascending
    pub fn gaps(&self) -> &BTreeSet<u64> {
        &self.gaps
    }

    /// Whether any gaps are outstanding
    pub fn has_gaps(&self) -> bool {
        !self.gaps.is_empty()
    }

    /// Whether `sequence` has already been consumed
    pub fn covers(&self, sequence: u64) -> bool {
        sequence <= self.index && !self.gaps.contains(&sequence)
    }

    /// Record that `sequence` was consumed
    ///
    /// A sequence that fills a gap removes it and leaves `index` alone. A
    /// sequence beyond `index` records every skipped number as a gap and
    /// becomes the new index. Gaps older than `window` below the resulting
    /// index are dropped. Sequences already covered leave the cursor
    /// unchanged.
    pub fn advance_to(&self, sequence: u64, window: u64) -> Self {
        let mut gaps = self.gaps.clone();
        let index = if gaps.remove(&sequence) {
            self.index
        } else if sequence > self.index {
            let floor = sequence.saturating_sub(window);
            gaps.extend((self.index + 1).max(floor)..sequence);
            sequence
        } else {
            return self.clone();
        };

        let floor = index.saturating_sub(window);
        let gaps = gaps.split_off(&floor);
        Self { index, gaps }
    }

    /// Drop every gap below `sequence`
    pub fn truncate_gaps_below(&self, sequence: u64) -> Self {
        Self {
            index: self.index,
            gaps: self.gaps.clone().split_off(&sequence),
        }
    }
}

impl fmt::Display for GapAwareCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GapAware(index={}, gaps={:?})", self.index, self.gaps)
    }
}

// ============================================================================
// GlobalSequenceCursor
// ============================================================================

/// Plain position in the global sequence, without gap tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalSequenceCursor {
    /// Highest sequence consumed
    pub index: u64,
}

// ============================================================================
// TrackingCursor
// ============================================================================

/// Persisted cursor schema versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorSchema {
    /// [`GapAwareCursor`], version 1
    GapAwareV1,
    /// [`GlobalSequenceCursor`], version 1
    GlobalSequenceV1,
}

impl CursorSchema {
    /// Tag stored next to the cursor body
    pub const fn tag(&self) -> &'static str {
        match self {
            CursorSchema::GapAwareV1 => "gap-aware/v1",
            CursorSchema::GlobalSequenceV1 => "global-sequence/v1",
        }
    }

    /// Resolve a stored tag
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedCursor`] for tags this build does not know.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "gap-aware/v1" => Ok(CursorSchema::GapAwareV1),
            "global-sequence/v1" => Ok(CursorSchema::GlobalSequenceV1),
            other => Err(Error::UnsupportedCursor(format!(
                "unknown cursor schema '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CursorSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Any cursor a consumer may persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingCursor {
    /// Cursor produced by the tracking reader
    GapAware(GapAwareCursor),
    /// Plain global position
    GlobalSequence(GlobalSequenceCursor),
}

/// A cursor serialized for storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCursor {
    /// Schema tag
    pub schema: CursorSchema,
    /// JSON body
    pub body: String,
}

impl TrackingCursor {
    /// Schema of this cursor
    pub fn schema(&self) -> CursorSchema {
        match self {
            TrackingCursor::GapAware(_) => CursorSchema::GapAwareV1,
            TrackingCursor::GlobalSequence(_) => CursorSchema::GlobalSequenceV1,
        }
    }

    /// Highest sequence the cursor has consumed
    pub fn index(&self) -> u64 {
        match self {
            TrackingCursor::GapAware(c) => c.index(),
            TrackingCursor::GlobalSequence(c) => c.index,
        }
    }

    /// Serialize for storage
    pub fn encode(&self) -> Result<EncodedCursor> {
        let body = match self {
            TrackingCursor::GapAware(c) => serde_json::to_string(c)?,
            TrackingCursor::GlobalSequence(c) => serde_json::to_string(c)?,
        };
        Ok(EncodedCursor {
            schema: self.schema(),
            body,
        })
    }

    /// Deserialize a stored cursor
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedCursor`] for an unknown tag
    /// - [`Error::Serialization`] for a body that does not match its tag
    pub fn decode(tag: &str, body: &str) -> Result<Self> {
        match CursorSchema::from_tag(tag)? {
            CursorSchema::GapAwareV1 => {
                let raw: GapAwareCursor = serde_json::from_str(body)?;
                // re-apply the gap invariant on untrusted input
                Ok(TrackingCursor::GapAware(GapAwareCursor::new(
                    raw.index, raw.gaps,
                )))
            }
            CursorSchema::GlobalSequenceV1 => {
                Ok(TrackingCursor::GlobalSequence(serde_json::from_str(body)?))
            }
        }
    }

    /// Borrow as a gap-aware cursor
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedCursor`] for any other schema.
    pub fn as_gap_aware(&self) -> Result<&GapAwareCursor> {
        match self {
            TrackingCursor::GapAware(c) => Ok(c),
            other => Err(Error::UnsupportedCursor(format!(
                "expected {}, got {}",
                CursorSchema::GapAwareV1,
                other.schema()
            ))),
        }
    }
}

impl From<GapAwareCursor> for TrackingCursor {
    fn from(cursor: GapAwareCursor) -> Self {
        TrackingCursor::GapAware(cursor)
    }
}

impl From<GlobalSequenceCursor> for TrackingCursor {
    fn from(cursor: GlobalSequenceCursor) -> Self {
        TrackingCursor::GlobalSequence(cursor)
    }
}

impl fmt::Display for TrackingCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingCursor::GapAware(c) => c.fmt(f),
            TrackingCursor::GlobalSequence(c) => write!(f, "GlobalSequence(index={})", c.index),
        }
    }
}
