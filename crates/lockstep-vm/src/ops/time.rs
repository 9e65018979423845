//! Locktime operations: `OP_CHECKLOCKTIMEVERIFY` and
//! `OP_CHECKSEQUENCEVERIFY`.
//!
//! Both read (without consuming) a 5-byte operand and compare it against the
//! transaction context. Values below [`consensus::LOCKTIME_THRESHOLD`] are
//! block heights; values at or above it are timestamps — the two units never
//! compare against each other.

use crate::error::VmError;
use crate::number::decode_vm_number;
use crate::opcodes;
use crate::state::{consensus, ProgramState, VmFlags};
use crate::vm::Operation;

/// Input sequence number at which locktime checks are disabled.
const FINAL_SEQUENCE_NUMBER: u32 = 0xffff_ffff;
/// Sequence-operand flag disabling `OP_CHECKSEQUENCEVERIFY`.
const SEQUENCE_DISABLE_FLAG: i64 = 1 << 31;
/// Sequence bit selecting time-based (rather than block-based) relative
/// locks.
const SEQUENCE_TYPE_FLAG: i64 = 1 << 22;
/// Bits of a sequence number that carry the relative locktime value.
const SEQUENCE_VALUE_MASK: i64 = 0x0000_ffff;

fn locktime_operand(state: &ProgramState, flags: VmFlags) -> Result<i64, VmError> {
    let Some(top) = state.stack.last() else {
        return Err(VmError::EmptyStack);
    };
    let operand = decode_vm_number(
        top,
        flags.require_minimal_encoding,
        consensus::MAXIMUM_LOCKTIME_OPERAND_LENGTH,
    )
    .map_err(VmError::from)?;
    if operand < 0 {
        return Err(VmError::NegativeLocktime);
    }
    Ok(operand)
}

fn op_check_locktime_verify(state: &mut ProgramState, flags: VmFlags) {
    let operand = match locktime_operand(state, flags) {
        Ok(operand) => operand,
        Err(error) => return state.fail(error),
    };
    let locktime = i64::from(state.context.locktime);
    if (operand < consensus::LOCKTIME_THRESHOLD) != (locktime < consensus::LOCKTIME_THRESHOLD) {
        return state.fail(VmError::IncompatibleLocktimeType);
    }
    if operand > locktime {
        return state.fail(VmError::UnsatisfiedLocktime);
    }
    if state.context.sequence_number == FINAL_SEQUENCE_NUMBER {
        state.fail(VmError::LocktimeDisabled);
    }
}

fn op_check_sequence_verify(state: &mut ProgramState, flags: VmFlags) {
    let operand = match locktime_operand(state, flags) {
        Ok(operand) => operand,
        Err(error) => return state.fail(error),
    };
    if operand & SEQUENCE_DISABLE_FLAG != 0 {
        // the operand opts out of relative locktime enforcement
        return;
    }
    if state.context.version < 2 {
        return state.fail(VmError::InsufficientVersionForSequenceNumber);
    }
    let sequence = i64::from(state.context.sequence_number);
    if sequence & SEQUENCE_DISABLE_FLAG != 0 {
        return state.fail(VmError::LocktimeDisabled);
    }
    if operand & SEQUENCE_TYPE_FLAG != sequence & SEQUENCE_TYPE_FLAG {
        return state.fail(VmError::IncompatibleSequenceType);
    }
    if operand & SEQUENCE_VALUE_MASK > sequence & SEQUENCE_VALUE_MASK {
        state.fail(VmError::UnsatisfiedSequenceNumber);
    }
}

/// The locktime group.
pub fn operations(flags: VmFlags) -> Vec<(u8, Operation)> {
    vec![
        (
            opcodes::OP_CHECKLOCKTIMEVERIFY,
            Box::new(move |state: &mut ProgramState| op_check_locktime_verify(state, flags))
                as Operation,
        ),
        (
            opcodes::OP_CHECKSEQUENCEVERIFY,
            Box::new(move |state: &mut ProgramState| op_check_sequence_verify(state, flags)),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TransactionContext;
    use std::sync::Arc;

    fn state_with(context: TransactionContext, stack: Vec<Vec<u8>>) -> ProgramState {
        let mut state = ProgramState::new(Vec::new().into(), Vec::new(), Arc::new(context));
        state.stack = stack;
        state
    }

    #[test]
    fn test_cltv_satisfied_keeps_operand() {
        let mut context = TransactionContext::placeholder();
        context.locktime = 100;
        context.sequence_number = 0;
        let mut state = state_with(context, vec![vec![0x32]]); // 50
        op_check_locktime_verify(&mut state, VmFlags::default());
        assert!(state.error.is_none());
        assert_eq!(state.stack, vec![vec![0x32]]);
    }

    #[test]
    fn test_cltv_unsatisfied() {
        let mut context = TransactionContext::placeholder();
        context.locktime = 10;
        let mut state = state_with(context, vec![vec![0x32]]);
        op_check_locktime_verify(&mut state, VmFlags::default());
        assert_eq!(state.error, Some(VmError::UnsatisfiedLocktime));
    }

    #[test]
    fn test_cltv_unit_mismatch() {
        let mut context = TransactionContext::placeholder();
        context.locktime = 100; // block height
        let mut state = state_with(
            context,
            // 500,000,001: a timestamp operand
            vec![vec![0x01, 0x65, 0xcd, 0x1d]],
        );
        op_check_locktime_verify(&mut state, VmFlags::default());
        assert_eq!(state.error, Some(VmError::IncompatibleLocktimeType));
    }

    #[test]
    fn test_cltv_negative_operand() {
        let mut state = state_with(TransactionContext::placeholder(), vec![vec![0x81]]);
        op_check_locktime_verify(&mut state, VmFlags::default());
        assert_eq!(state.error, Some(VmError::NegativeLocktime));
    }

    #[test]
    fn test_cltv_disabled_by_final_sequence() {
        let mut context = TransactionContext::placeholder();
        context.locktime = 100;
        context.sequence_number = FINAL_SEQUENCE_NUMBER;
        let mut state = state_with(context, vec![vec![0x32]]);
        op_check_locktime_verify(&mut state, VmFlags::default());
        assert_eq!(state.error, Some(VmError::LocktimeDisabled));
    }

    #[test]
    fn test_csv_satisfied_and_unsatisfied() {
        let mut context = TransactionContext::placeholder();
        context.version = 2;
        context.sequence_number = 20;
        let mut state = state_with(context.clone(), vec![vec![0x0a]]); // 10 blocks
        op_check_sequence_verify(&mut state, VmFlags::default());
        assert!(state.error.is_none());

        let mut state = state_with(context, vec![vec![0x19]]); // 25 blocks
        op_check_sequence_verify(&mut state, VmFlags::default());
        assert_eq!(state.error, Some(VmError::UnsatisfiedSequenceNumber));
    }

    #[test]
    fn test_csv_disable_flag_is_a_no_op() {
        let mut context = TransactionContext::placeholder();
        context.version = 1;
        // operand with bit 31 set: skipped before the version check
        let mut state = state_with(context, vec![vec![0x00, 0x00, 0x00, 0x80, 0x00]]);
        op_check_sequence_verify(&mut state, VmFlags::default());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_csv_requires_version_two() {
        let mut context = TransactionContext::placeholder();
        context.version = 1;
        context.sequence_number = 20;
        let mut state = state_with(context, vec![vec![0x0a]]);
        op_check_sequence_verify(&mut state, VmFlags::default());
        assert_eq!(
            state.error,
            Some(VmError::InsufficientVersionForSequenceNumber)
        );
    }
}
