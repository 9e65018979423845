//! Debug-trace summarization for debugger UIs.
//!
//! Debug traces carry the full program state at the start of each step; the
//! summary pairs each step's instruction with the *resulting* stacks, which
//! is what a step-through debugger wants to display.

use std::fmt::Write;

use lockstep_vm::error::VmError;
use lockstep_vm::instruction::{disassemble_instruction, Instruction};
use lockstep_vm::number::decode_vm_number;
use lockstep_vm::ProgramState;

/// Render a stack item as hex, annotated with its numeric value when the
/// bytes form a valid VM number.
fn summarize_stack_item(item: &[u8]) -> String {
    let mut rendered = String::from("0x");
    for byte in item {
        let _ = write!(rendered, "{byte:02x}");
    }
    if let Ok(value) = decode_vm_number(item, false, 8) {
        let _ = write!(rendered, "({value})");
    }
    rendered
}

/// Summaries of every item of a stack, bottom first.
pub fn summarize_stack(stack: &[Vec<u8>]) -> Vec<String> {
    stack.iter().map(|item| summarize_stack_item(item)).collect()
}

/// One step of a summarized debug trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSummaryStep {
    /// Instruction pointer before the step
    pub ip: usize,
    /// The instruction executed, when the step ran one (phase-initial
    /// entries have none)
    pub instruction: Option<Instruction>,
    /// Whether branch markers permitted execution at this step
    pub executing: bool,
    /// The data stack after the step
    pub stack: Vec<String>,
    /// The alternate stack after the step
    pub alternate_stack: Vec<String>,
    /// The error the step produced, if any
    pub error: Option<VmError>,
}

/// Summarize a debug trace into per-step rows.
///
/// Each row pairs the instruction at state *n* with the stacks of state
/// *n + 1*; the final state contributes its stacks to the last row rather
/// than a row of its own.
pub fn summarize_debug_trace(trace: &[ProgramState]) -> Vec<TraceSummaryStep> {
    trace
        .windows(2)
        .map(|window| {
            let (state, next) = (&window[0], &window[1]);
            TraceSummaryStep {
                ip: state.ip,
                instruction: state.instructions.get(state.ip).cloned(),
                executing: state.executing(),
                stack: summarize_stack(&next.stack),
                alternate_stack: summarize_stack(&next.alternate_stack),
                error: next.error,
            }
        })
        .collect()
}

/// Render a summary as one aligned line per step.
pub fn stringify_debug_trace_summary(summary: &[TraceSummaryStep]) -> String {
    const INSTRUCTION_COLUMN: usize = 23;
    summary
        .iter()
        .map(|step| {
            let label = match &step.instruction {
                None => "=>".to_owned(),
                Some(instruction) => format!(
                    "{}. {}{}:",
                    step.ip,
                    if step.executing { "" } else { "(skip)" },
                    disassemble_instruction(instruction)
                ),
            };
            let detail = match step.error {
                Some(error) => error.to_string(),
                None => {
                    let mut detail = step.stack.join(" ");
                    if !step.alternate_stack.is_empty() {
                        let _ = write!(detail, "| alt: {}", step.alternate_stack.join(" "));
                    }
                    detail
                }
            };
            format!("{label:INSTRUCTION_COLUMN$} {detail}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
