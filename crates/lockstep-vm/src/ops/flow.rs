//! Flow control: branches, `OP_VERIFY`, `OP_RETURN` and the upgradable
//! NOPs.
//!
//! The `OP_IF` family must run even while execution is disabled — a skipped
//! branch still tracks its nesting. A skipped `OP_IF`/`OP_NOTIF` pushes a
//! `false` marker without touching the data stack.

use crate::error::VmError;
use crate::number::stack_item_is_truthy;
use crate::opcodes;
use crate::state::{ProgramState, VmFlags};
use crate::vm::Operation;

fn op_nop(_state: &mut ProgramState) {}

fn branch(state: &mut ProgramState, invert: bool) {
    if !state.executing() {
        state.execution_stack.push(false);
        return;
    }
    match state.stack.pop() {
        Some(item) => {
            let active = stack_item_is_truthy(&item) != invert;
            state.execution_stack.push(active);
        }
        None => state.fail(VmError::EmptyStack),
    }
}

fn op_if(state: &mut ProgramState) {
    branch(state, false);
}

fn op_notif(state: &mut ProgramState) {
    branch(state, true);
}

fn op_else(state: &mut ProgramState) {
    match state.execution_stack.last_mut() {
        Some(marker) => *marker = !*marker,
        None => state.fail(VmError::UnexpectedElse),
    }
}

fn op_endif(state: &mut ProgramState) {
    if state.execution_stack.pop().is_none() {
        state.fail(VmError::UnexpectedEndIf);
    }
}

pub(crate) fn op_verify(state: &mut ProgramState) {
    match state.stack.last() {
        None => state.fail(VmError::EmptyStack),
        Some(item) if stack_item_is_truthy(item) => {
            state.stack.pop();
        }
        Some(_) => state.fail(VmError::FailedVerify),
    }
}

fn op_return(state: &mut ProgramState) {
    state.fail(VmError::CalledReturn);
}

/// Branch-marker maintenance; installed without the conditional wrapper.
pub fn unconditional_operations() -> Vec<(u8, Operation)> {
    vec![
        (opcodes::OP_IF, Box::new(op_if) as Operation),
        (opcodes::OP_NOTIF, Box::new(op_notif)),
        (opcodes::OP_ELSE, Box::new(op_else)),
        (opcodes::OP_ENDIF, Box::new(op_endif)),
    ]
}

/// Counted flow operations.
pub fn counted_operations() -> Vec<(u8, Operation)> {
    vec![
        (opcodes::OP_NOP, Box::new(op_nop) as Operation),
        (opcodes::OP_VERIFY, Box::new(op_verify)),
        (opcodes::OP_RETURN, Box::new(op_return)),
    ]
}

/// The reserved NOP range (`OP_NOP1`, `OP_NOP4`–`OP_NOP10`).
pub fn nop_operations(flags: VmFlags) -> Vec<(u8, Operation)> {
    let upgradable = [
        opcodes::OP_NOP1,
        opcodes::OP_NOP4,
        opcodes::OP_NOP5,
        opcodes::OP_NOP6,
        opcodes::OP_NOP7,
        opcodes::OP_NOP8,
        opcodes::OP_NOP9,
        opcodes::OP_NOP10,
    ];
    upgradable
        .into_iter()
        .map(|opcode| {
            let operation: Operation = if flags.disallow_upgradable_nops {
                Box::new(|state: &mut ProgramState| {
                    state.fail(VmError::DisallowedUpgradableNop)
                })
            } else {
                Box::new(op_nop)
            };
            (opcode, operation)
        })
        .collect()
}
