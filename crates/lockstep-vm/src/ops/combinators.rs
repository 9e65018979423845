//! Operation combinators.
//!
//! Small wrappers composed over the raw operation bodies so each opcode
//! implementation states only its own semantics.

use crate::error::VmError;
use crate::state::{consensus, ProgramState};
use crate::vm::Operation;

/// Skip the wrapped operation while any branch marker disables execution.
pub fn conditionally_evaluate(operation: Operation) -> Operation {
    Box::new(move |state: &mut ProgramState| {
        if state.executing() {
            operation(state);
        }
    })
}

/// Count the wrapped operation toward the operation ceiling.
pub fn increment_operation_count(operation: Operation) -> Operation {
    Box::new(move |state: &mut ProgramState| {
        operation(state);
        if state.error.is_none() {
            state.operation_count += 1;
        }
    })
}

/// Enforce the stack-depth and operation-count ceilings after the wrapped
/// operation runs.
pub fn check_limits(operation: Operation) -> Operation {
    Box::new(move |state: &mut ProgramState| {
        operation(state);
        if state.error.is_some() {
            return;
        }
        if state.stack.len() + state.alternate_stack.len() > consensus::MAXIMUM_STACK_DEPTH {
            state.fail(VmError::ExceededMaximumStackDepth);
        } else if state.operation_count > consensus::MAXIMUM_OPERATION_COUNT {
            state.fail(VmError::ExceededMaximumOperationCount);
        }
    })
}

/// The full wrapper applied to every counted operation.
pub fn counted(operation: Operation) -> Operation {
    conditionally_evaluate(check_limits(increment_operation_count(operation)))
}

/// Run `first`, then `second` unless `first` failed. Used for the
/// `…VERIFY` fusions (`OP_EQUALVERIFY`, `OP_NUMEQUALVERIFY`,
/// `OP_CHECKSIGVERIFY`).
pub fn combine(first: Operation, second: Operation) -> Operation {
    Box::new(move |state: &mut ProgramState| {
        first(state);
        if state.error.is_none() {
            second(state);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TransactionContext;
    use std::sync::Arc;

    fn state() -> ProgramState {
        ProgramState::new(
            Vec::new().into(),
            Vec::new(),
            Arc::new(TransactionContext::placeholder()),
        )
    }

    fn push_marker() -> Operation {
        Box::new(|state: &mut ProgramState| state.stack.push(vec![0x01]))
    }

    #[test]
    fn test_conditionally_evaluate_skips_disabled_branches() {
        let operation = conditionally_evaluate(push_marker());
        let mut active = state();
        operation(&mut active);
        assert_eq!(active.stack.len(), 1);

        let mut skipped = state();
        skipped.execution_stack.push(false);
        operation(&mut skipped);
        assert!(skipped.stack.is_empty());
    }

    #[test]
    fn test_operation_count_not_incremented_on_error() {
        let failing: Operation =
            Box::new(|state: &mut ProgramState| state.fail(VmError::EmptyStack));
        let operation = increment_operation_count(failing);
        let mut state = state();
        operation(&mut state);
        assert_eq!(state.operation_count, 0);
        assert_eq!(state.error, Some(VmError::EmptyStack));
    }

    #[test]
    fn test_check_limits_flags_operation_ceiling() {
        let operation = check_limits(increment_operation_count(push_marker()));
        let mut state = state();
        state.operation_count = consensus::MAXIMUM_OPERATION_COUNT;
        operation(&mut state);
        assert_eq!(state.error, Some(VmError::ExceededMaximumOperationCount));
    }

    #[test]
    fn test_check_limits_flags_stack_depth() {
        let operation = check_limits(push_marker());
        let mut state = state();
        state.stack = vec![vec![]; consensus::MAXIMUM_STACK_DEPTH];
        operation(&mut state);
        assert_eq!(state.error, Some(VmError::ExceededMaximumStackDepth));
    }

    #[test]
    fn test_combine_short_circuits_on_error() {
        let failing: Operation =
            Box::new(|state: &mut ProgramState| state.fail(VmError::EmptyStack));
        let operation = combine(failing, push_marker());
        let mut state = state();
        operation(&mut state);
        assert_eq!(state.error, Some(VmError::EmptyStack));
        assert!(state.stack.is_empty());
    }
}
