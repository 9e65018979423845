//! Byte-string splicing: `OP_CAT`, `OP_SPLIT`, `OP_NUM2BIN`, `OP_BIN2NUM`
//! and `OP_SIZE`.

use crate::error::VmError;
use crate::number::{decode_arithmetic_operand, encode_vm_number};
use crate::opcodes;
use crate::state::{consensus, ProgramState, VmFlags};
use crate::vm::Operation;

fn op_cat(state: &mut ProgramState) {
    if state.stack.len() < 2 {
        return state.fail(VmError::EmptyStack);
    }
    let combined = state.stack[state.stack.len() - 2].len() + state.stack[state.stack.len() - 1].len();
    if combined > consensus::MAXIMUM_STACK_ITEM_LENGTH {
        return state.fail(VmError::ExceededMaximumStackItemLength);
    }
    let suffix = state.stack.pop().expect("depth checked");
    state
        .stack
        .last_mut()
        .expect("depth checked")
        .extend_from_slice(&suffix);
}

fn op_split(state: &mut ProgramState, flags: VmFlags) {
    if state.stack.len() < 2 {
        return state.fail(VmError::EmptyStack);
    }
    let index = match decode_arithmetic_operand(
        &state.stack[state.stack.len() - 1],
        flags.require_minimal_encoding,
    ) {
        Ok(value) => value,
        Err(error) => return state.fail(error.into()),
    };
    let item_length = state.stack[state.stack.len() - 2].len();
    if index < 0 || index as usize > item_length {
        return state.fail(VmError::InvalidSplitIndex);
    }
    state.stack.pop();
    let mut item = state.stack.pop().expect("depth checked");
    let suffix = item.split_off(index as usize);
    state.stack.push(item);
    state.stack.push(suffix);
}

/// Strip sign-aware zero padding, returning the shortest encoding of the
/// same number (`[]` for any encoding of zero).
fn minimally_encode(item: &[u8]) -> Vec<u8> {
    let mut bytes = item.to_vec();
    let Some(last) = bytes.last_mut() else {
        return bytes;
    };
    let sign = *last & 0x80;
    *last &= 0x7f;
    while bytes.len() > 1 && bytes[bytes.len() - 1] == 0 && bytes[bytes.len() - 2] & 0x80 == 0 {
        bytes.pop();
    }
    if bytes == [0] {
        return Vec::new();
    }
    if bytes[bytes.len() - 1] & 0x80 != 0 {
        bytes.push(sign);
    } else if sign != 0 {
        let last = bytes.len() - 1;
        bytes[last] |= 0x80;
    }
    bytes
}

fn op_num2bin(state: &mut ProgramState, flags: VmFlags) {
    if state.stack.len() < 2 {
        return state.fail(VmError::EmptyStack);
    }
    let length = match decode_arithmetic_operand(
        &state.stack[state.stack.len() - 1],
        flags.require_minimal_encoding,
    ) {
        Ok(value) => value,
        Err(error) => return state.fail(error.into()),
    };
    if length < 0 || length as usize > consensus::MAXIMUM_STACK_ITEM_LENGTH {
        return state.fail(VmError::ExceededMaximumStackItemLength);
    }
    let length = length as usize;
    let mut bytes = minimally_encode(&state.stack[state.stack.len() - 2]);
    if bytes.len() > length {
        return state.fail(VmError::ImpossibleEncoding);
    }
    state.stack.pop();
    state.stack.pop();
    if bytes.len() < length {
        let sign = match bytes.last_mut() {
            Some(last) => {
                let sign = *last & 0x80;
                *last &= 0x7f;
                sign
            }
            None => 0,
        };
        bytes.resize(length - 1, 0);
        bytes.push(sign);
    }
    state.stack.push(bytes);
}

fn op_bin2num(state: &mut ProgramState) {
    let Some(top) = state.stack.last() else {
        return state.fail(VmError::EmptyStack);
    };
    let minimal = minimally_encode(top);
    if minimal.len() > consensus::MAXIMUM_VM_NUMBER_LENGTH {
        return state.fail(VmError::ExceedsVmNumberRange);
    }
    state.stack.pop();
    state.stack.push(minimal);
}

fn op_size(state: &mut ProgramState) {
    match state.stack.last() {
        Some(item) => {
            let size = encode_vm_number(item.len() as i64);
            state.stack.push(size);
        }
        None => state.fail(VmError::EmptyStack),
    }
}

/// The splice group.
pub fn operations(flags: VmFlags) -> Vec<(u8, Operation)> {
    vec![
        (opcodes::OP_CAT, Box::new(op_cat) as Operation),
        (
            opcodes::OP_SPLIT,
            Box::new(move |state: &mut ProgramState| op_split(state, flags)),
        ),
        (
            opcodes::OP_NUM2BIN,
            Box::new(move |state: &mut ProgramState| op_num2bin(state, flags)),
        ),
        (opcodes::OP_BIN2NUM, Box::new(op_bin2num)),
        (opcodes::OP_SIZE, Box::new(op_size)),
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
    fn test_cat_concatenates() {
        let mut state = state_with(vec![vec![0x01, 0x02], vec![0x03]]);
        op_cat(&mut state);
        assert_eq!(state.stack, vec![vec![0x01, 0x02, 0x03]]);
    }

    #[test]
    fn test_cat_enforces_item_length_ceiling() {
        let mut state = state_with(vec![vec![0; 300], vec![0; 221]]);
        op_cat(&mut state);
        assert_eq!(state.error, Some(VmError::ExceededMaximumStackItemLength));
        assert_eq!(state.stack.len(), 2);
    }

    #[test]
    fn test_split_partitions_item() {
        let mut state = state_with(vec![vec![0x01, 0x02, 0x03], vec![0x01]]);
        op_split(&mut state, VmFlags::default());
        assert_eq!(state.stack, vec![vec![0x01], vec![0x02, 0x03]]);

        // splitting at 0 and at the full length both succeed
        let mut state = state_with(vec![vec![0x01, 0x02], vec![]]);
        op_split(&mut state, VmFlags::default());
        assert_eq!(state.stack, vec![vec![], vec![0x01, 0x02]]);
    }

    #[test]
    fn test_split_rejects_out_of_range_index() {
        let mut state = state_with(vec![vec![0x01], vec![0x02]]);
        op_split(&mut state, VmFlags::default());
        assert_eq!(state.error, Some(VmError::InvalidSplitIndex));
    }

    #[test]
    fn test_minimally_encode() {
        assert_eq!(minimally_encode(&[]), Vec::<u8>::new());
        assert_eq!(minimally_encode(&[0x00]), Vec::<u8>::new());
        assert_eq!(minimally_encode(&[0x80]), Vec::<u8>::new());
        assert_eq!(minimally_encode(&[0x01, 0x00]), vec![0x01]);
        assert_eq!(minimally_encode(&[0x01, 0x80]), vec![0x81]);
        assert_eq!(minimally_encode(&[0x80, 0x00]), vec![0x80, 0x00]);
        assert_eq!(minimally_encode(&[0x80, 0x80]), vec![0x80, 0x80]);
        assert_eq!(minimally_encode(&[0x01, 0x00, 0x00]), vec![0x01]);
    }

    #[test]
    fn test_num2bin_pads_to_requested_length() {
        let mut state = state_with(vec![vec![0x02], vec![0x04]]);
        op_num2bin(&mut state, VmFlags::default());
        assert_eq!(state.stack, vec![vec![0x02, 0x00, 0x00, 0x00]]);

        // negative numbers carry the sign in the final byte
        let mut state = state_with(vec![vec![0x85], vec![0x03]]);
        op_num2bin(&mut state, VmFlags::default());
        assert_eq!(state.stack, vec![vec![0x05, 0x00, 0x80]]);
    }

    #[test]
    fn test_num2bin_rejects_impossible_encodings() {
        let mut state = state_with(vec![vec![0x01, 0x02, 0x03], vec![0x02]]);
        op_num2bin(&mut state, VmFlags::default());
        assert_eq!(state.error, Some(VmError::ImpossibleEncoding));
    }

    #[test]
    fn test_bin2num_minimizes() {
        let mut state = state_with(vec![vec![0x02, 0x00, 0x00]]);
        op_bin2num(&mut state);
        assert_eq!(state.stack, vec![vec![0x02]]);

        let mut state = state_with(vec![vec![0x01, 0x02, 0x03, 0x04, 0x00]]);
        op_bin2num(&mut state);
        assert_eq!(state.stack, vec![vec![0x01, 0x02, 0x03, 0x04]]);

        let mut state = state_with(vec![vec![0x01, 0x02, 0x03, 0x04, 0x05]]);
        op_bin2num(&mut state);
        assert_eq!(state.error, Some(VmError::ExceedsVmNumberRange));
    }

    #[test]
    fn test_size_keeps_item() {
        let mut state = state_with(vec![vec![0xaa, 0xbb, 0xcc]]);
        op_size(&mut state);
        assert_eq!(state.stack, vec![vec![0xaa, 0xbb, 0xcc], vec![0x03]]);
    }
}
