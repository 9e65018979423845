//! Push and constant operations (`0x00`–`0x60`).

use crate::error::VmError;
use crate::number::encode_vm_number;
use crate::opcodes;
use crate::state::{consensus, ProgramState};
use crate::vm::Operation;

/// All push opcodes share one body: the payload was already captured by the
/// decoder, so the operation only enforces the push-size ceiling. The error
/// surfaces at the instruction that *declares* the oversized length.
fn op_push(state: &mut ProgramState) {
    let instruction = state.current_instruction();
    let data = instruction.data.clone().unwrap_or_default();
    if data.len() > consensus::MAXIMUM_PUSH_SIZE {
        return state.fail(VmError::ExceedsMaximumPush);
    }
    state.stack.push(data);
}

fn constant(value: i64) -> Operation {
    Box::new(move |state: &mut ProgramState| state.stack.push(encode_vm_number(value)))
}

/// The push group: literal pushes, `OP_1NEGATE` and `OP_1`–`OP_16`.
pub fn operations() -> Vec<(u8, Operation)> {
    let mut operations: Vec<(u8, Operation)> = Vec::new();
    for opcode in opcodes::OP_0..=opcodes::OP_PUSHDATA_4 {
        operations.push((opcode, Box::new(op_push)));
    }
    operations.push((opcodes::OP_1NEGATE, constant(-1)));
    for number in 1..=16u8 {
        operations.push((0x50 + number, constant(i64::from(number))));
    }
    operations
}
