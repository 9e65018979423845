//! Lockstep evaluation-trace source mapping.
//!
//! Reconciles the flat debug trace produced by the `lockstep-vm` stepping
//! engine with the hierarchical node tree produced by the compiler,
//! yielding per-source-node execution samples, unmatched-state reports and
//! unexecuted-range decorations for editor tooling.
//!
//! # Design
//!
//! - [`range`] — pure geometry over 1-indexed `(line, column)` spans
//! - [`node`] — the compiled script-node tree (including compile-time
//!   nested evaluations and their captured traces)
//! - [`extract`] — the trace/node reconciliation algorithm
//! - [`unexecuted`] — complement-based dead-code reporting
//! - [`summary`] — human-readable trace summaries for debugger UIs

pub mod extract;
pub mod node;
pub mod range;
pub mod summary;
pub mod unexecuted;

pub use extract::{
    extract_evaluation_samples, extract_evaluation_samples_recursive, EvaluationSample,
    InternalState, SampleExtractionResult,
};
pub use node::{ScriptNode, ScriptNodeKind};
pub use range::{contains_range, merge_ranges, Position, Range};
pub use summary::{
    stringify_debug_trace_summary, summarize_debug_trace, summarize_stack, TraceSummaryStep,
};
pub use unexecuted::extract_unexecuted_ranges;
