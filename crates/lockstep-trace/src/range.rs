//! Range arithmetic over source positions.
//!
//! Positions are 1-indexed `(line, column)` pairs ordered lexicographically;
//! ranges are column-half-open by convention. The compiler attaches a range
//! to every node it emits — nothing in this crate ever re-derives source
//! positions, it only merges and compares what the compiler produced.

use serde::{Deserialize, Serialize};

/// A source position: 1-indexed line and column, ordered by line first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line_number: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line_number: u32, column: u32) -> Self {
        Self {
            line_number,
            column,
        }
    }
}

/// A span of source text between two positions.
///
/// Invariant: `start() <= end()` lexicographically. The compiler guarantees
/// this for every node range it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start_line_number: u32,
    pub start_column: u32,
    pub end_line_number: u32,
    pub end_column: u32,
}

impl Range {
    pub fn new(
        start_line_number: u32,
        start_column: u32,
        end_line_number: u32,
        end_column: u32,
    ) -> Self {
        Self {
            start_line_number,
            start_column,
            end_line_number,
            end_column,
        }
    }

    /// The range between two positions.
    pub fn between(start: Position, end: Position) -> Self {
        Self {
            start_line_number: start.line_number,
            start_column: start.column,
            end_line_number: end.line_number,
            end_column: end.column,
        }
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_line_number, self.start_column)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_line_number, self.end_column)
    }

    /// The zero-width range at this range's start position.
    pub fn collapsed_to_start(&self) -> Self {
        Self::between(self.start(), self.start())
    }

    /// True when the range covers no text.
    pub fn is_empty(&self) -> bool {
        self.start() == self.end()
    }
}

/// The smallest range containing every input range.
///
/// # Panics
/// Panics on an empty slice; callers guarantee at least one range.
pub fn merge_ranges(ranges: &[Range]) -> Range {
    assert!(!ranges.is_empty(), "merge_ranges requires at least one range");
    ranges.iter().skip(1).fold(ranges[0], |merged, range| {
        Range::between(
            merged.start().min(range.start()),
            merged.end().max(range.end()),
        )
    })
}

/// True iff `inner` lies within `outer`.
///
/// With `inclusive` (the conventional default), an inner range may touch
/// `outer`'s boundary; without it, edge-touching inner ranges are excluded.
pub fn contains_range(outer: Range, inner: Range, inclusive: bool) -> bool {
    if inclusive {
        outer.start() <= inner.start() && inner.end() <= outer.end()
    } else {
        outer.start() < inner.start() && inner.end() < outer.end()
    }
}
