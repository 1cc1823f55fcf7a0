//! Part range math and `Content-Range` descriptors.

use std::fmt;

/// A single part: ordinal plus byte range [start, end) (half-open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    /// Zero-based position of the part within the session.
    pub ordinal: u64,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl PartRange {
    /// Length of this part in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptor sent with the part, inclusive end: `bytes start-(end-1)/total`.
    pub fn content_range(&self, total: u64) -> ContentRange {
        ContentRange {
            start: self.start,
            last: self.end.saturating_sub(1),
            total,
        }
    }
}

/// Byte-range descriptor for one part upload (`bytes {start}-{last}/{total}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    /// Inclusive last byte.
    pub last: u64,
    pub total: u64,
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.last, self.total)
    }
}

/// Number of parts needed to cover `total_size` with parts of at most `max_part` bytes.
pub fn part_count(total_size: u64, max_part: u64) -> u64 {
    if total_size == 0 || max_part == 0 {
        return 0;
    }
    total_size.div_ceil(max_part)
}

/// Range of the part at `ordinal`, or `None` past the last part.
///
/// The final part is clamped to `total_size`, so its descriptor ends at
/// `total_size - 1`, not at `start + max_part - 1`.
pub fn part_at(ordinal: u64, total_size: u64, max_part: u64) -> Option<PartRange> {
    if ordinal >= part_count(total_size, max_part) {
        return None;
    }
    let start = ordinal * max_part;
    let end = start.saturating_add(max_part).min(total_size);
    Some(PartRange {
        ordinal,
        start,
        end,
    })
}

/// Builds the full part plan for a file.
///
/// Returns an empty vec if `total_size` is 0 or `max_part` is 0.
pub fn plan_parts(total_size: u64, max_part: u64) -> Vec<PartRange> {
    (0..part_count(total_size, max_part))
        .filter_map(|i| part_at(i, total_size, max_part))
        .collect()
}
