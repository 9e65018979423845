//! Stack and alternate-stack manipulation.

use crate::error::VmError;
use crate::number::{decode_arithmetic_operand, encode_vm_number, stack_item_is_truthy};
use crate::opcodes;
use crate::state::{ProgramState, VmFlags};
use crate::vm::Operation;

/// Check the stack holds at least `depth` items, failing the state
/// otherwise. Precondition checks run before any mutation so a failed
/// operation leaves everything but `error` untouched.
fn require_depth(state: &mut ProgramState, depth: usize) -> bool {
    if state.stack.len() < depth {
        state.fail(VmError::EmptyStack);
        return false;
    }
    true
}

fn op_to_alt_stack(state: &mut ProgramState) {
    match state.stack.pop() {
        Some(item) => state.alternate_stack.push(item),
        None => state.fail(VmError::EmptyStack),
    }
}

fn op_from_alt_stack(state: &mut ProgramState) {
    match state.alternate_stack.pop() {
        Some(item) => state.stack.push(item),
        None => state.fail(VmError::EmptyAlternateStack),
    }
}

fn op_2drop(state: &mut ProgramState) {
    if require_depth(state, 2) {
        state.stack.truncate(state.stack.len() - 2);
    }
}

/// Clone the top `count` items in order.
fn duplicate_top(state: &mut ProgramState, count: usize) {
    if require_depth(state, count) {
        let start = state.stack.len() - count;
        for index in start..state.stack.len() {
            state.stack.push(state.stack[index].clone());
        }
    }
}

fn op_2dup(state: &mut ProgramState) {
    duplicate_top(state, 2);
}

fn op_3dup(state: &mut ProgramState) {
    duplicate_top(state, 3);
}

fn op_2over(state: &mut ProgramState) {
    if require_depth(state, 4) {
        let start = state.stack.len() - 4;
        state.stack.push(state.stack[start].clone());
        state.stack.push(state.stack[start + 2].clone());
    }
}

fn op_2rot(state: &mut ProgramState) {
    if require_depth(state, 6) {
        let start = state.stack.len() - 6;
        let first = state.stack.remove(start);
        let second = state.stack.remove(start);
        state.stack.push(first);
        state.stack.push(second);
    }
}

fn op_2swap(state: &mut ProgramState) {
    if require_depth(state, 4) {
        let start = state.stack.len() - 4;
        state.stack[start..].rotate_left(2);
    }
}

fn op_ifdup(state: &mut ProgramState) {
    match state.stack.last() {
        None => state.fail(VmError::EmptyStack),
        Some(item) if stack_item_is_truthy(item) => {
            let duplicate = item.clone();
            state.stack.push(duplicate);
        }
        Some(_) => {}
    }
}

fn op_depth(state: &mut ProgramState) {
    let depth = encode_vm_number(state.stack.len() as i64);
    state.stack.push(depth);
}

fn op_drop(state: &mut ProgramState) {
    if state.stack.pop().is_none() {
        state.fail(VmError::EmptyStack);
    }
}

fn op_dup(state: &mut ProgramState) {
    duplicate_top(state, 1);
}

fn op_nip(state: &mut ProgramState) {
    if require_depth(state, 2) {
        let index = state.stack.len() - 2;
        state.stack.remove(index);
    }
}

fn op_over(state: &mut ProgramState) {
    if require_depth(state, 2) {
        let item = state.stack[state.stack.len() - 2].clone();
        state.stack.push(item);
    }
}

/// Pop the top item as a depth operand, then pick (clone) or roll (move)
/// the item that many places below the new top.
fn pick_or_roll(state: &mut ProgramState, flags: VmFlags, remove: bool) {
    let Some(top) = state.stack.last() else {
        return state.fail(VmError::EmptyStack);
    };
    let depth = match decode_arithmetic_operand(top, flags.require_minimal_encoding) {
        Ok(value) => value,
        Err(error) => return state.fail(error.into()),
    };
    if depth < 0 || (depth as usize) + 1 >= state.stack.len() {
        return state.fail(VmError::InvalidStackIndex);
    }
    let depth = depth as usize;
    state.stack.pop();
    let index = state.stack.len() - 1 - depth;
    let item = if remove {
        state.stack.remove(index)
    } else {
        state.stack[index].clone()
    };
    state.stack.push(item);
}

fn op_rot(state: &mut ProgramState) {
    if require_depth(state, 3) {
        let start = state.stack.len() - 3;
        state.stack[start..].rotate_left(1);
    }
}

fn op_swap(state: &mut ProgramState) {
    if require_depth(state, 2) {
        let top = state.stack.len() - 1;
        state.stack.swap(top, top - 1);
    }
}

fn op_tuck(state: &mut ProgramState) {
    if require_depth(state, 2) {
        let item = state.stack[state.stack.len() - 1].clone();
        let index = state.stack.len() - 2;
        state.stack.insert(index, item);
    }
}

/// The stack-manipulation group.
pub fn operations(flags: VmFlags) -> Vec<(u8, Operation)> {
    vec![
        (opcodes::OP_TOALTSTACK, Box::new(op_to_alt_stack) as Operation),
        (opcodes::OP_FROMALTSTACK, Box::new(op_from_alt_stack)),
        (opcodes::OP_2DROP, Box::new(op_2drop)),
        (opcodes::OP_2DUP, Box::new(op_2dup)),
        (opcodes::OP_3DUP, Box::new(op_3dup)),
        (opcodes::OP_2OVER, Box::new(op_2over)),
        (opcodes::OP_2ROT, Box::new(op_2rot)),
        (opcodes::OP_2SWAP, Box::new(op_2swap)),
        (opcodes::OP_IFDUP, Box::new(op_ifdup)),
        (opcodes::OP_DEPTH, Box::new(op_depth)),
        (opcodes::OP_DROP, Box::new(op_drop)),
        (opcodes::OP_DUP, Box::new(op_dup)),
        (opcodes::OP_NIP, Box::new(op_nip)),
        (opcodes::OP_OVER, Box::new(op_over)),
        (
            opcodes::OP_PICK,
            Box::new(move |state: &mut ProgramState| pick_or_roll(state, flags, false)),
        ),
        (
            opcodes::OP_ROLL,
            Box::new(move |state: &mut ProgramState| pick_or_roll(state, flags, true)),
        ),
        (opcodes::OP_ROT, Box::new(op_rot)),
        (opcodes::OP_SWAP, Box::new(op_swap)),
        (opcodes::OP_TUCK, Box::new(op_tuck)),
    ]
}
