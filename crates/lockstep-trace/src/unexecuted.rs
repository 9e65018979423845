//! Unexecuted-range reduction.
//!
//! Derives the source ranges whose compiled bytecode was never reached in a
//! given trace — the untaken branch of a conditional, code after a terminal
//! error — as the complement of the sampled ranges within the evaluation
//! range. The output is directly usable as "dim this text" editor
//! decorations.

use crate::extract::EvaluationSample;
use crate::range::{Position, Range};

/// Compute the ordered list of ranges inside `evaluation_range` not covered
/// by any sample.
///
/// Every sample's range counts as executed. Gaps between covered text merge
/// when coverage touches or overlaps, and zero-width gaps are dropped, so
/// the merged union of the sample ranges and the returned ranges is exactly
/// the evaluation range.
///
/// With no samples at all, the entire evaluation range is unexecuted;
/// `start_anchor`, when supplied, starts the sweep at a specific position
/// instead of the evaluation range's start (as if a synthetic zero-width
/// initial sample existed there).
pub fn extract_unexecuted_ranges(
    evaluation_range: Range,
    samples: &[EvaluationSample],
    start_anchor: Option<Position>,
) -> Vec<Range> {
    let mut covered: Vec<Range> = samples
        .iter()
        .map(|sample| sample.range)
        .filter(|range| !range.is_empty())
        .collect();
    covered.sort_by_key(|range| (range.start(), range.end()));

    let mut cursor = start_anchor.unwrap_or_else(|| evaluation_range.start());
    let mut unexecuted = Vec::new();
    for range in covered {
        if range.start() > cursor {
            unexecuted.push(Range::between(cursor, range.start()));
        }
        cursor = cursor.max(range.end());
    }
    if cursor < evaluation_range.end() {
        unexecuted.push(Range::between(cursor, evaluation_range.end()));
    }
    unexecuted
}
