//! Global-order index positions
//!
//! A global sequence number is split into a bucket (index hash key) and an
//! offset (index range key) so that no single index partition grows without
//! bound and every tracking query touches at most one bucket's worth of rows.

/// Number of offsets per bucket
pub const BUCKET_WIDTH: u64 = 100;

/// Offsets above this value are in the final fifth of a bucket
pub const LOOK_AHEAD_THRESHOLD: u64 = BUCKET_WIDTH * 4 / 5;

/// (bucket, offset) decomposition of a global sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalPosition {
    /// `sequence / BUCKET_WIDTH`
    pub bucket: u64,
    /// `sequence % BUCKET_WIDTH`
    pub offset: u64,
}

impl GlobalPosition {
    /// Split a global sequence number
    #[inline]
    pub const fn of(sequence: u64) -> Self {
        Self {
            bucket: sequence / BUCKET_WIDTH,
            offset: sequence % BUCKET_WIDTH,
        }
    }

    /// Rebuild from stored parts
    #[inline]
    pub const fn new(bucket: u64, offset: u64) -> Self {
        Self { bucket, offset }
    }

    /// The global sequence number this position encodes
    #[inline]
    pub const fn sequence(&self) -> u64 {
        self.bucket * BUCKET_WIDTH + self.offset
    }

    /// First position of the following bucket
    #[inline]
    pub const fn next_bucket(&self) -> Self {
        Self {
            bucket: self.bucket + 1,
            offset: 0,
        }
    }

    /// Whether a reader that finds nothing here should also look in the
    /// next bucket
    #[inline]
    pub const fn near_bucket_end(&self) -> bool {
        self.offset > LOOK_AHEAD_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split() {
        assert_eq!(GlobalPosition::of(0), GlobalPosition::new(0, 0));
        assert_eq!(GlobalPosition::of(99), GlobalPosition::new(0, 99));
        assert_eq!(GlobalPosition::of(100), GlobalPosition::new(1, 0));
        assert_eq!(GlobalPosition::of(1234), GlobalPosition::new(12, 34));
    }

    #[test]
    fn test_near_bucket_end() {
        assert!(!GlobalPosition::of(80).near_bucket_end());
        assert!(GlobalPosition::of(81).near_bucket_end());
        assert!(GlobalPosition::of(199).near_bucket_end());
        assert!(!GlobalPosition::of(200).near_bucket_end());
    }

    #[test]
    fn test_next_bucket() {
        assert_eq!(GlobalPosition::of(187).next_bucket(), GlobalPosition::of(200));
    }

    proptest! {
        #[test]
        fn split_is_reversible(seq in 0u64..u64::MAX / 2) {
            let pos = GlobalPosition::of(seq);
            prop_assert!(pos.offset < BUCKET_WIDTH);
            prop_assert_eq!(pos.sequence(), seq);
        }

        #[test]
        fn positions_order_like_sequences(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            prop_assert_eq!(GlobalPosition::of(a).cmp(&GlobalPosition::of(b)), a.cmp(&b));
        }
    }
}
