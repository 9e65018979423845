//! Bitwise operations and byte-string equality.

use crate::error::VmError;
use crate::number::encode_bool;
use crate::opcodes;
use crate::state::ProgramState;
use crate::vm::Operation;

use super::combinators::combine;
use super::flow::op_verify;

fn binary_bitwise(state: &mut ProgramState, apply: fn(u8, u8) -> u8) {
    if state.stack.len() < 2 {
        return state.fail(VmError::EmptyStack);
    }
    if state.stack[state.stack.len() - 1].len() != state.stack[state.stack.len() - 2].len() {
        return state.fail(VmError::MismatchedBitwiseOperandLength);
    }
    let mask = state.stack.pop().expect("depth checked");
    let target = state.stack.last_mut().expect("depth checked");
    for (byte, mask_byte) in target.iter_mut().zip(mask) {
        *byte = apply(*byte, mask_byte);
    }
}

fn op_and(state: &mut ProgramState) {
    binary_bitwise(state, |a, b| a & b);
}

fn op_or(state: &mut ProgramState) {
    binary_bitwise(state, |a, b| a | b);
}

fn op_xor(state: &mut ProgramState) {
    binary_bitwise(state, |a, b| a ^ b);
}

fn op_equal(state: &mut ProgramState) {
    if state.stack.len() < 2 {
        return state.fail(VmError::EmptyStack);
    }
    let first = state.stack.pop().expect("depth checked");
    let second = state.stack.pop().expect("depth checked");
    state.stack.push(encode_bool(first == second));
}

/// The bitwise/equality group.
pub fn operations() -> Vec<(u8, Operation)> {
    vec![
        (opcodes::OP_AND, Box::new(op_and) as Operation),
        (opcodes::OP_OR, Box::new(op_or)),
        (opcodes::OP_XOR, Box::new(op_xor)),
        (opcodes::OP_EQUAL, Box::new(op_equal)),
        (
            opcodes::OP_EQUALVERIFY,
            combine(Box::new(op_equal), Box::new(op_verify)),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TransactionContext;
    use std::sync::Arc;

    fn state_with(stack: Vec<Vec<u8>>) -> ProgramState {
        let mut state = ProgramState::new(
            Vec::new().into(),
            Vec::new(),
            Arc::new(TransactionContext::placeholder()),
        );
        state.stack = stack;
        state
    }

    #[test]
    fn test_bitwise_pairs() {
        let mut state = state_with(vec![vec![0b1100], vec![0b1010]]);
        op_and(&mut state);
        assert_eq!(state.stack, vec![vec![0b1000]]);

        let mut state = state_with(vec![vec![0b1100], vec![0b1010]]);
        op_or(&mut state);
        assert_eq!(state.stack, vec![vec![0b1110]]);

        let mut state = state_with(vec![vec![0b1100], vec![0b1010]]);
        op_xor(&mut state);
        assert_eq!(state.stack, vec![vec![0b0110]]);
    }

    #[test]
    fn test_bitwise_requires_matching_lengths() {
        let mut state = state_with(vec![vec![0x01, 0x02], vec![0x01]]);
        op_xor(&mut state);
        assert_eq!(state.error, Some(VmError::MismatchedBitwiseOperandLength));
        assert_eq!(state.stack.len(), 2);
    }

    #[test]
    fn test_equal_pushes_boolean() {
        let mut state = state_with(vec![vec![0xab], vec![0xab]]);
        op_equal(&mut state);
        assert_eq!(state.stack, vec![vec![0x01]]);

        let mut state = state_with(vec![vec![0xab], vec![0xac]]);
        op_equal(&mut state);
        assert_eq!(state.stack, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_equalverify_fails_on_mismatch() {
        let operations = operations();
        let equalverify = &operations
            .iter()
            .find(|(opcode, _)| *opcode == opcodes::OP_EQUALVERIFY)
            .expect("defined")
            .1;
        let mut state = state_with(vec![vec![0xab], vec![0xac]]);
        equalverify(&mut state);
        assert_eq!(state.error, Some(VmError::FailedVerify));

        let mut state = state_with(vec![vec![0xab], vec![0xab]]);
        equalverify(&mut state);
        assert!(state.error.is_none());
        assert!(state.stack.is_empty());
    }
}
