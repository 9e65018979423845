//! Evaluation-sample extraction.
//!
//! Reconciles a VM debug trace against the ordered nodes of a compiled
//! script, pairing every program state with the source range that produced
//! it — a source map for complete evaluations.
//!
//! # Design
//!
//! - the trace cursor starts past the synthetic pre-execution sample and
//!   advances one state per decoded instruction;
//! - a node may hold part of an instruction (a long push split across
//!   nodes): the undecodable tail is carried into the next node and the
//!   closing sample spans the merged ranges;
//! - a node may hold several instructions: the intermediate pairings are
//!   kept as the sample's internal states;
//! - an execution error ends the walk; later nodes get no samples, and the
//!   duplicated terminal error state produced by the stepping engine is
//!   collapsed into the final sample.

use tracing::trace;

use lockstep_vm::instruction::{decode_instructions, Instruction};
use lockstep_vm::ProgramState;

use crate::node::{ScriptNode, ScriptNodeKind};
use crate::range::{merge_ranges, Range};

/// One instruction consumed in the middle of a node's sample.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalState {
    pub instruction: Instruction,
    pub state: ProgramState,
}

/// The reconciliation of one source node with the trace state left after
/// the node's bytecode finished executing.
///
/// The synthetic first sample of every extraction has no `instruction` and
/// a zero-width range: it carries the state before anything executed.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSample {
    /// The range of the whole evaluation this sample belongs to
    pub evaluation_range: Range,
    /// The source range this sample covers
    pub range: Range,
    /// The last instruction the sample consumed, if any
    pub instruction: Option<Instruction>,
    /// Pairings consumed before the final state of a multi-instruction
    /// sample
    pub internal_states: Vec<InternalState>,
    /// The program state after this sample's source finished executing
    pub state: ProgramState,
}

/// Result of a sample extraction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleExtractionResult {
    /// Samples in source order (flat extraction) or range-end order
    /// (recursive extraction)
    pub samples: Vec<EvaluationSample>,
    /// Trace states never matched to a node. Empty when the walk stopped
    /// early on an execution error — the trailing duplicate of the terminal
    /// error state is never reported here.
    pub unmatched_states: Vec<ProgramState>,
}

/// Extract samples from a single evaluation.
///
/// `trace` must begin with the pre-execution state and hold one state per
/// executed instruction (the shape produced by the VM's `state_debug`,
/// sliced of any phase-boundary entries). With no execution error, the
/// instructions decoded across `nodes` consume exactly `trace.len() - 1`
/// states and `unmatched_states` comes back empty.
pub fn extract_evaluation_samples(
    evaluation_range: Range,
    nodes: &[ScriptNode],
    trace: &[ProgramState],
) -> SampleExtractionResult {
    trace!(
        nodes = nodes.len(),
        states = trace.len(),
        "extracting evaluation samples"
    );
    let Some(initial_state) = trace.first() else {
        return SampleExtractionResult::default();
    };

    let initial_position = nodes
        .first()
        .map(|node| node.range.collapsed_to_start())
        .unwrap_or_else(|| evaluation_range.collapsed_to_start());
    let mut samples = vec![EvaluationSample {
        evaluation_range,
        range: initial_position,
        instruction: None,
        internal_states: Vec::new(),
        state: initial_state.clone(),
    }];

    let mut cursor = 1;
    let mut carry: Option<(Vec<u8>, Range)> = None;
    let mut error_stop = false;

    for node in nodes {
        let closes_open_sample = carry.is_some();
        let (bytecode, merged_range) = match carry.take() {
            None => (node.bytecode.clone(), node.range),
            Some((mut carried, carried_range)) => {
                carried.extend_from_slice(&node.bytecode);
                (carried, merge_ranges(&[carried_range, node.range]))
            }
        };

        let decoded = decode_instructions(&bytecode);
        if decoded.instructions.is_empty() {
            match decoded.incomplete {
                Some(_) => {
                    // still not a whole instruction; keep carrying
                    carry = Some((bytecode, merged_range));
                }
                None => {
                    // an empty node (e.g. an empty literal push) re-reports
                    // the previously consumed state
                    samples.push(EvaluationSample {
                        evaluation_range,
                        range: node.range,
                        instruction: None,
                        internal_states: Vec::new(),
                        state: trace[cursor - 1].clone(),
                    });
                }
            }
            continue;
        }

        if cursor >= trace.len() {
            // trace exhausted: no samples for the remaining nodes
            break;
        }

        let available = trace.len() - cursor;
        let take = decoded.instructions.len().min(available);
        let mut pairs: Vec<(Instruction, ProgramState)> = decoded.instructions[..take]
            .iter()
            .cloned()
            .zip(trace[cursor..cursor + take].iter().cloned())
            .collect();
        // an error state ends its sample; the duplicated terminal state
        // that follows it in the trace is never consumed
        let error_position = pairs
            .iter()
            .position(|(_, state)| state.error.is_some());
        if let Some(position) = error_position {
            pairs.truncate(position + 1);
            error_stop = true;
        }
        cursor += pairs.len();

        let mut node_pairs_begin = 0;
        if closes_open_sample {
            let (instruction, state) = pairs[0].clone();
            samples.push(EvaluationSample {
                evaluation_range,
                range: merged_range,
                instruction: Some(instruction),
                internal_states: Vec::new(),
                state,
            });
            node_pairs_begin = 1;
        }

        if node_pairs_begin < pairs.len() {
            let (instruction, state) = pairs.last().expect("nonempty").clone();
            let internal_states = pairs[node_pairs_begin..pairs.len() - 1]
                .iter()
                .cloned()
                .map(|(instruction, state)| InternalState { instruction, state })
                .collect();
            samples.push(EvaluationSample {
                evaluation_range,
                range: node.range,
                instruction: Some(instruction),
                internal_states,
                state,
            });
        }

        if error_stop || take < decoded.instructions.len() {
            break;
        }
        carry = decoded
            .incomplete
            .map(|tail| (tail.bytes, node.range));
    }

    let unmatched_states = if error_stop {
        Vec::new()
    } else {
        trace[cursor..].to_vec()
    };
    SampleExtractionResult {
        samples,
        unmatched_states,
    }
}

/// Extract samples recursively, descending into compile-time evaluations.
///
/// Nodes carrying a nested evaluation contribute the nested extraction over
/// their own captured trace in place of any flat reading of their interior;
/// the outer walk still emits the node's single closing sample from the
/// outer trace. Samples are ordered by the end position of their range, so
/// nested samples precede the closing sample of the node that consumed
/// their result.
pub fn extract_evaluation_samples_recursive(
    evaluation_range: Range,
    nodes: &[ScriptNode],
    trace: &[ProgramState],
) -> SampleExtractionResult {
    let flat = extract_evaluation_samples(evaluation_range, nodes, trace);
    let mut samples = flat.samples;
    for node in nodes {
        collect_nested_samples(node, &mut samples);
    }
    samples.sort_by(|a, b| a.range.end().cmp(&b.range.end()));
    SampleExtractionResult {
        samples,
        unmatched_states: flat.unmatched_states,
    }
}

fn collect_nested_samples(node: &ScriptNode, samples: &mut Vec<EvaluationSample>) {
    match &node.kind {
        ScriptNodeKind::Leaf => {}
        ScriptNodeKind::Compound { children } | ScriptNodeKind::Push { nested: children } => {
            for child in children {
                collect_nested_samples(child, samples);
            }
        }
        ScriptNodeKind::Evaluation { nested, trace } => {
            let nested_result = extract_evaluation_samples(node.range, nested, trace);
            samples.extend(nested_result.samples);
            for child in nested {
                collect_nested_samples(child, samples);
            }
        }
    }
}
