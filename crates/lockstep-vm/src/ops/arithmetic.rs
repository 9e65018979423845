//! Arithmetic and numeric comparison operations.
//!
//! Operands are VM numbers of at most 4 bytes (roughly ±2³¹), so every
//! result of these operations fits an `i64` with room to spare. Results are
//! re-encoded minimally; an oversized *result* is legal and only restricts
//! what later operations can do with it.

use crate::error::VmError;
use crate::number::{decode_arithmetic_operand, encode_bool, encode_vm_number};
use crate::opcodes;
use crate::state::{ProgramState, VmFlags};
use crate::vm::Operation;

use super::combinators::combine;
use super::flow::op_verify;

fn unary(flags: VmFlags, apply: fn(i64) -> i64) -> Operation {
    Box::new(move |state: &mut ProgramState| {
        let Some(top) = state.stack.last() else {
            return state.fail(VmError::EmptyStack);
        };
        let value = match decode_arithmetic_operand(top, flags.require_minimal_encoding) {
            Ok(value) => value,
            Err(error) => return state.fail(error.into()),
        };
        state.stack.pop();
        state.stack.push(encode_vm_number(apply(value)));
    })
}

/// Pop two operands; `apply(first, second)` sees them in push order
/// (`first` was pushed before `second`).
fn binary(flags: VmFlags, apply: fn(i64, i64) -> Vec<u8>) -> Operation {
    Box::new(move |state: &mut ProgramState| {
        if state.stack.len() < 2 {
            return state.fail(VmError::EmptyStack);
        }
        let second = decode_arithmetic_operand(
            &state.stack[state.stack.len() - 1],
            flags.require_minimal_encoding,
        );
        let first = decode_arithmetic_operand(
            &state.stack[state.stack.len() - 2],
            flags.require_minimal_encoding,
        );
        let (first, second) = match (first, second) {
            (Ok(first), Ok(second)) => (first, second),
            (Err(error), _) | (_, Err(error)) => return state.fail(error.into()),
        };
        state.stack.pop();
        state.stack.pop();
        state.stack.push(apply(first, second));
    })
}

fn op_within(flags: VmFlags) -> Operation {
    Box::new(move |state: &mut ProgramState| {
        if state.stack.len() < 3 {
            return state.fail(VmError::EmptyStack);
        }
        let top = state.stack.len() - 1;
        let decoded: Result<Vec<i64>, _> = state.stack[top - 2..]
            .iter()
            .map(|item| decode_arithmetic_operand(item, flags.require_minimal_encoding))
            .collect();
        let operands = match decoded {
            Ok(operands) => operands,
            Err(error) => return state.fail(error.into()),
        };
        let (value, minimum, maximum) = (operands[0], operands[1], operands[2]);
        state.stack.truncate(top - 2);
        state
            .stack
            .push(encode_bool(minimum <= value && value < maximum));
    })
}

/// The arithmetic group.
pub fn operations(flags: VmFlags) -> Vec<(u8, Operation)> {
    vec![
        (opcodes::OP_1ADD, unary(flags, |value| value + 1)),
        (opcodes::OP_1SUB, unary(flags, |value| value - 1)),
        (opcodes::OP_NEGATE, unary(flags, |value| -value)),
        (opcodes::OP_ABS, unary(flags, i64::abs)),
        (
            opcodes::OP_NOT,
            unary(flags, |value| i64::from(value == 0)),
        ),
        (
            opcodes::OP_0NOTEQUAL,
            unary(flags, |value| i64::from(value != 0)),
        ),
        (
            opcodes::OP_ADD,
            binary(flags, |first, second| encode_vm_number(first + second)),
        ),
        (
            opcodes::OP_SUB,
            binary(flags, |first, second| encode_vm_number(first - second)),
        ),
        (
            opcodes::OP_BOOLAND,
            binary(flags, |first, second| {
                encode_bool(first != 0 && second != 0)
            }),
        ),
        (
            opcodes::OP_BOOLOR,
            binary(flags, |first, second| {
                encode_bool(first != 0 || second != 0)
            }),
        ),
        (
            opcodes::OP_NUMEQUAL,
            binary(flags, |first, second| encode_bool(first == second)),
        ),
        (
            opcodes::OP_NUMEQUALVERIFY,
            combine(
                binary(flags, |first, second| encode_bool(first == second)),
                Box::new(op_verify),
            ),
        ),
        (
            opcodes::OP_NUMNOTEQUAL,
            binary(flags, |first, second| encode_bool(first != second)),
        ),
        (
            opcodes::OP_LESSTHAN,
            binary(flags, |first, second| encode_bool(first < second)),
        ),
        (
            opcodes::OP_GREATERTHAN,
            binary(flags, |first, second| encode_bool(first > second)),
        ),
        (
            opcodes::OP_LESSTHANOREQUAL,
            binary(flags, |first, second| encode_bool(first <= second)),
        ),
        (
            opcodes::OP_GREATERTHANOREQUAL,
            binary(flags, |first, second| encode_bool(first >= second)),
        ),
        (
            opcodes::OP_MIN,
            binary(flags, |first, second| {
                encode_vm_number(first.min(second))
            }),
        ),
        (
            opcodes::OP_MAX,
            binary(flags, |first, second| {
                encode_vm_number(first.max(second))
            }),
        ),
        (opcodes::OP_WITHIN, op_within(flags)),
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

    fn run(opcode: u8, stack: Vec<Vec<u8>>) -> ProgramState {
        let operations = operations(VmFlags::default());
        let operation = &operations
            .iter()
            .find(|(candidate, _)| *candidate == opcode)
            .expect("operation defined")
            .1;
        let mut state = state_with(stack);
        operation(&mut state);
        state
    }

    #[test]
    fn test_add_and_sub() {
        let state = run(opcodes::OP_ADD, vec![vec![0x02], vec![0x03]]);
        assert_eq!(state.stack, vec![vec![0x05]]);

        let state = run(opcodes::OP_SUB, vec![vec![0x02], vec![0x03]]);
        assert_eq!(state.stack, vec![vec![0x81]]); // -1
    }

    #[test]
    fn test_unary_operations() {
        let state = run(opcodes::OP_1ADD, vec![vec![0x7f]]);
        assert_eq!(state.stack, vec![vec![0x80, 0x00]]); // 128

        let state = run(opcodes::OP_NEGATE, vec![vec![0x05]]);
        assert_eq!(state.stack, vec![vec![0x85]]);

        let state = run(opcodes::OP_ABS, vec![vec![0x85]]);
        assert_eq!(state.stack, vec![vec![0x05]]);

        let state = run(opcodes::OP_NOT, vec![vec![]]);
        assert_eq!(state.stack, vec![vec![0x01]]);

        let state = run(opcodes::OP_0NOTEQUAL, vec![vec![0x07]]);
        assert_eq!(state.stack, vec![vec![0x01]]);
    }

    #[test]
    fn test_comparisons() {
        let state = run(opcodes::OP_LESSTHAN, vec![vec![0x01], vec![0x02]]);
        assert_eq!(state.stack, vec![vec![0x01]]);

        let state = run(opcodes::OP_GREATERTHAN, vec![vec![0x01], vec![0x02]]);
        assert_eq!(state.stack, vec![Vec::<u8>::new()]);

        let state = run(opcodes::OP_NUMEQUAL, vec![vec![0x01, 0x00], vec![0x01]]);
        // non-minimal operand under strict flags
        assert_eq!(state.error, Some(VmError::RequiresMinimalEncoding));
    }

    #[test]
    fn test_min_max_within() {
        let state = run(opcodes::OP_MIN, vec![vec![0x05], vec![0x81]]);
        assert_eq!(state.stack, vec![vec![0x81]]);

        let state = run(opcodes::OP_MAX, vec![vec![0x05], vec![0x81]]);
        assert_eq!(state.stack, vec![vec![0x05]]);

        // 3 within [1, 5)
        let state = run(
            opcodes::OP_WITHIN,
            vec![vec![0x03], vec![0x01], vec![0x05]],
        );
        assert_eq!(state.stack, vec![vec![0x01]]);

        // 5 is outside the half-open bound
        let state = run(
            opcodes::OP_WITHIN,
            vec![vec![0x05], vec![0x01], vec![0x05]],
        );
        assert_eq!(state.stack, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_numequalverify() {
        let state = run(opcodes::OP_NUMEQUALVERIFY, vec![vec![0x02], vec![0x02]]);
        assert!(state.error.is_none());
        assert!(state.stack.is_empty());

        let state = run(opcodes::OP_NUMEQUALVERIFY, vec![vec![0x02], vec![0x03]]);
        assert_eq!(state.error, Some(VmError::FailedVerify));
    }

    #[test]
    fn test_operand_errors_leave_stack_untouched() {
        let state = run(opcodes::OP_ADD, vec![vec![0x01, 0x02, 0x03, 0x04, 0x05], vec![0x01]]);
        assert_eq!(state.error, Some(VmError::ExceedsVmNumberRange));
        assert_eq!(state.stack.len(), 2);
    }
}
