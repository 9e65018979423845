//! The authentication virtual machine.
//!
//! A [`Vm`] drives an opcode-indexed dispatch table across a decoded
//! instruction sequence. The stepping contract is a three-state machine:
//!
//! - *Running* — no error, `ip` before the end of the instructions
//! - *Halted-Success* — `ip` at the end, no error
//! - *Halted-Error* — `error` set
//!
//! Stepping a halted state of either kind is a no-op returning an equal
//! state, which makes every halted state idempotent and the stepping loop
//! branch-free. Program evaluation is two-phase: the unlocking bytecode
//! runs first (push-only by rule), its stack is transplanted into a fresh
//! state over the locking bytecode, and the second phase produces the
//! result.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{DecodeError, VmError};
use crate::instruction::{parse_bytecode, Instruction};
use crate::number::stack_item_is_truthy;
use crate::ops;
use crate::primitives::AuthenticationPrimitives;
use crate::state::{consensus, AuthenticationProgram, ProgramState, TransactionContext, VmFlags};

/// A single opcode's behavior: a total function over the program state.
/// Failure is expressed through [`ProgramState::error`], never by panic.
pub type Operation = Box<dyn Fn(&mut ProgramState) + Send + Sync>;

/// An opcode-indexed table of operations.
///
/// Built once, read-only afterwards. Opcodes without an assigned operation
/// dispatch to `undefined`, which marks the state with
/// [`VmError::UnknownOpcode`].
pub struct InstructionSet {
    operations: Vec<Option<Operation>>,
    undefined: Operation,
}

impl InstructionSet {
    /// An empty set: every opcode is undefined.
    pub fn new() -> Self {
        Self {
            operations: (0..=u8::MAX).map(|_| None).collect(),
            undefined: Box::new(|state: &mut ProgramState| state.fail(VmError::UnknownOpcode)),
        }
    }

    /// Assign `operation` to `opcode`, replacing any previous assignment.
    pub fn define(&mut self, opcode: u8, operation: Operation) {
        self.operations[usize::from(opcode)] = Some(operation);
    }

    /// The operation dispatched for `opcode`.
    pub fn operation(&self, opcode: u8) -> &Operation {
        self.operations[usize::from(opcode)]
            .as_ref()
            .unwrap_or(&self.undefined)
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::new()
    }
}

/// The virtual machine: a dispatch table plus the stepping engine.
pub struct Vm {
    instruction_set: InstructionSet,
}

impl Vm {
    /// Build a VM over a custom instruction set.
    pub fn new(instruction_set: InstructionSet) -> Self {
        Self { instruction_set }
    }

    /// Build a VM over the common instruction set with the given behavior
    /// flags and injected cryptographic primitives.
    pub fn common(flags: VmFlags, primitives: Arc<dyn AuthenticationPrimitives>) -> Self {
        Self::new(ops::common_instruction_set(flags, primitives))
    }

    /// True while `state` is Running.
    pub fn state_continue(&self, state: &ProgramState) -> bool {
        state.error.is_none() && state.ip < state.instructions.len()
    }

    /// Advance `state` by one instruction.
    ///
    /// Halted states (either kind) pass through unchanged. The instruction
    /// pointer advances only when the dispatched operation succeeds, so an
    /// error state still points at the instruction that produced it.
    pub fn state_step(&self, mut state: ProgramState) -> ProgramState {
        if !self.state_continue(&state) {
            return state;
        }
        let opcode = state.current_instruction().opcode;
        (self.instruction_set.operation(opcode))(&mut state);
        if state.error.is_none() {
            state.ip += 1;
        }
        state
    }

    /// Run `state` to a halted state, keeping no history.
    pub fn state_evaluate(&self, mut state: ProgramState) -> ProgramState {
        while self.state_continue(&state) {
            state = self.state_step(state);
        }
        state
    }

    /// Run `state` to a halted state, returning every intermediate state.
    ///
    /// The first entry is the input state; each subsequent entry is the
    /// result of one step. When stepping produces an error, the engine
    /// probes the halted state one extra time — a no-op — so the terminal
    /// error state appears twice at the tail. Success traces carry no
    /// duplicate, and a state that was already halted on entry yields a
    /// single-entry trace.
    pub fn state_debug(&self, state: ProgramState) -> Vec<ProgramState> {
        let mut trace = vec![state.clone()];
        let mut state = state;
        let mut stepped = false;
        while self.state_continue(&state) {
            state = self.state_step(state);
            trace.push(state.clone());
            stepped = true;
        }
        if stepped && state.error.is_some() {
            trace.push(self.state_step(state));
        }
        trace
    }

    /// Prepare both phases of `program`, or fail on malformed bytecode.
    fn decode_program(
        &self,
        program: &AuthenticationProgram,
    ) -> Result<(ProgramState, Arc<[Instruction]>, Arc<TransactionContext>), DecodeError> {
        let unlocking = parse_bytecode(&program.unlocking_bytecode)?;
        let locking: Arc<[Instruction]> = parse_bytecode(&program.locking_bytecode)?.into();
        let context = Arc::new(program.context.clone());
        let mut initial = ProgramState::new(unlocking.into(), Vec::new(), context.clone());
        if program.unlocking_bytecode.len() > consensus::MAXIMUM_BYTECODE_LENGTH
            || program.locking_bytecode.len() > consensus::MAXIMUM_BYTECODE_LENGTH
        {
            initial.fail(VmError::ExceededMaximumBytecodeLength);
        } else if !initial
            .instructions
            .iter()
            .all(|instruction| instruction.is_push())
        {
            initial.fail(VmError::RequiresPushOnly);
        }
        Ok((initial, locking, context))
    }

    /// Fully evaluate `program`, returning the final state.
    ///
    /// Decode failures are the only `Err` case; every execution failure is
    /// reported through the returned state's `error` field.
    pub fn evaluate(&self, program: &AuthenticationProgram) -> Result<ProgramState, DecodeError> {
        let (initial, locking, context) = self.decode_program(program)?;
        if initial.error.is_some() {
            return Ok(initial);
        }
        let unlocking_result = self.state_evaluate(initial);
        if let Some(error) = &unlocking_result.error {
            debug!(%error, "unlocking phase failed");
            return Ok(unlocking_result);
        }
        trace!(
            stack_depth = unlocking_result.stack.len(),
            "unlocking phase complete"
        );
        let locking_state = ProgramState::new(locking, unlocking_result.stack, context);
        Ok(self.state_evaluate(locking_state))
    }

    /// Fully evaluate `program`, returning the complete trace.
    ///
    /// The unlocking trace contributes every state except its final
    /// (halted, phase-boundary) entry; the locking trace follows, starting
    /// from the transplanted-stack state. A program whose unlocking
    /// bytecode is rejected before stepping (oversized or not push-only)
    /// contributes exactly one state for that phase.
    pub fn debug(&self, program: &AuthenticationProgram) -> Result<Vec<ProgramState>, DecodeError> {
        let (initial, locking, context) = self.decode_program(program)?;
        if initial.error.is_some() {
            return Ok(vec![initial]);
        }
        let mut trace = self.state_debug(initial);
        let boundary = trace.last().expect("state_debug yields at least one state");
        if boundary.error.is_some() {
            return Ok(trace);
        }
        let boundary = trace.pop().expect("nonempty");
        let locking_state = ProgramState::new(locking, boundary.stack, context);
        trace.extend(self.state_debug(locking_state));
        Ok(trace)
    }

    /// Check that a final state represents a successful authentication:
    /// no error, no open branches, and exactly one truthy stack item.
    pub fn verify(&self, state: &ProgramState) -> Result<(), VmError> {
        if let Some(error) = state.error {
            return Err(error);
        }
        if !state.execution_stack.is_empty() {
            return Err(VmError::NonEmptyExecutionStack);
        }
        if state.stack.len() != 1 {
            return Err(VmError::RequiresCleanStack);
        }
        if !stack_item_is_truthy(&state.stack[0]) {
            return Err(VmError::UnsuccessfulEvaluation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::MockPrimitives;

    fn vm() -> Vm {
        Vm::common(VmFlags::default(), Arc::new(MockPrimitives))
    }

    fn state_for(bytecode: &[u8]) -> ProgramState {
        ProgramState::new(
            parse_bytecode(bytecode).expect("valid bytecode").into(),
            Vec::new(),
            Arc::new(TransactionContext::placeholder()),
        )
    }

    #[test]
    fn test_state_machine_classification() {
        let vm = vm();
        let running = state_for(&[0x51]);
        assert!(vm.state_continue(&running));

        let halted = vm.state_step(running);
        assert!(!vm.state_continue(&halted));
        assert_eq!(halted.ip, 1);
        assert_eq!(halted.stack, vec![vec![0x01]]);
    }

    #[test]
    fn test_halted_states_are_idempotent() {
        let vm = vm();
        let success = vm.state_evaluate(state_for(&[0x51, 0x52]));
        assert_eq!(vm.state_step(success.clone()), success);

        let error = vm.state_evaluate(state_for(&[0x6a]));
        assert!(error.error.is_some());
        assert_eq!(vm.state_step(error.clone()), error);
    }

    #[test]
    fn test_error_does_not_advance_ip() {
        let vm = vm();
        let halted = vm.state_evaluate(state_for(&[0x51, 0x6a, 0x52]));
        assert_eq!(halted.error, Some(VmError::CalledReturn));
        assert_eq!(halted.ip, 1);
    }

    #[test]
    fn test_state_debug_success_length() {
        let vm = vm();
        let trace = vm.state_debug(state_for(&[0x52, 0x52, 0x93]));
        assert_eq!(trace.len(), 4);
        let ips: Vec<usize> = trace.iter().map(|state| state.ip).collect();
        assert_eq!(ips, vec![0, 1, 2, 3]);
        assert_eq!(trace[3].stack, vec![vec![0x04]]);
        assert!(trace[3].error.is_none());
    }

    #[test]
    fn test_state_debug_error_duplicates_terminal_state() {
        let vm = vm();
        // OP_1 executes, OP_RETURN errors as the 2nd instruction
        let trace = vm.state_debug(state_for(&[0x51, 0x6a]));
        assert_eq!(trace.len(), 4); // k + 2 for k = 2, 1-indexed
        assert_eq!(trace[2], trace[3]);
        assert_eq!(trace[3].error, Some(VmError::CalledReturn));
    }

    #[test]
    fn test_state_debug_pre_halted_input_yields_single_entry() {
        let vm = vm();
        let mut state = state_for(&[0x51]);
        state.fail(VmError::CalledReturn);
        assert_eq!(vm.state_debug(state).len(), 1);
    }

    #[test]
    fn test_undefined_opcode_is_an_error() {
        let vm = vm();
        let halted = vm.state_evaluate(state_for(&[0xfe]));
        assert_eq!(halted.error, Some(VmError::UnknownOpcode));
    }

    fn program(unlocking: &[u8], locking: &[u8]) -> AuthenticationProgram {
        AuthenticationProgram {
            unlocking_bytecode: unlocking.to_vec(),
            locking_bytecode: locking.to_vec(),
            context: TransactionContext::placeholder(),
        }
    }

    #[test]
    fn test_evaluate_transplants_unlocking_stack() {
        let vm = vm();
        // unlocking pushes 2 and 3; locking adds and compares to 5
        let result = vm
            .evaluate(&program(&[0x52, 0x53], &[0x93, 0x55, 0x87]))
            .expect("decodes");
        assert!(result.error.is_none());
        assert_eq!(result.stack, vec![vec![0x01]]);
        assert!(vm.verify(&result).is_ok());
    }

    #[test]
    fn test_evaluate_rejects_non_push_unlocking() {
        let vm = vm();
        let result = vm.evaluate(&program(&[0x51, 0x76], &[0x51])).expect("decodes");
        assert_eq!(result.error, Some(VmError::RequiresPushOnly));
        // nothing was executed
        assert_eq!(result.ip, 0);
    }

    #[test]
    fn test_debug_single_state_for_rejected_unlocking_phase() {
        let vm = vm();
        let trace = vm.debug(&program(&[0x51, 0x76], &[0x51])).expect("decodes");
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].error, Some(VmError::RequiresPushOnly));
    }

    #[test]
    fn test_debug_concatenates_phases_without_boundary_state() {
        let vm = vm();
        let trace = vm
            .debug(&program(&[0x52, 0x53], &[0x93, 0x55, 0x87]))
            .expect("decodes");
        // unlocking: states at ip 0, 1 (the halted ip-2 entry is dropped);
        // locking: states at ip 0 through 3
        assert_eq!(trace.len(), 6);
        assert_eq!(trace[2].ip, 0);
        assert_eq!(trace[2].stack, vec![vec![0x02], vec![0x03]]);
        assert!(trace[5].error.is_none());
        assert_eq!(trace[5].stack, vec![vec![0x01]]);
    }

    #[test]
    fn test_decode_errors_are_fatal() {
        let vm = vm();
        let error = vm.evaluate(&program(&[0x05, 0x01], &[0x51])).unwrap_err();
        assert!(matches!(error, DecodeError::TruncatedPush { .. }));
    }

    #[test]
    fn test_verify_rejects_unclean_results() {
        let vm = vm();
        let two_items = vm.state_evaluate(state_for(&[0x51, 0x51]));
        assert_eq!(vm.verify(&two_items), Err(VmError::RequiresCleanStack));

        let falsy = vm.state_evaluate(state_for(&[0x00]));
        assert_eq!(vm.verify(&falsy), Err(VmError::UnsuccessfulEvaluation));

        let open_branch = vm.state_evaluate(state_for(&[0x51, 0x51, 0x63]));
        assert_eq!(
            vm.verify(&open_branch),
            Err(VmError::NonEmptyExecutionStack)
        );
    }

    #[test]
    fn test_oversized_declared_push_errors_at_declaring_instruction() {
        let vm = vm();
        // OP_PUSHDATA_2 declaring 521 bytes, payload present
        let mut bytecode = vec![0x4d, 0x09, 0x02];
        bytecode.extend_from_slice(&[0x00; 521]);
        let halted = vm.state_evaluate(state_for(&bytecode));
        assert_eq!(halted.error, Some(VmError::ExceedsMaximumPush));
        assert_eq!(halted.ip, 0);
    }

    #[test]
    fn test_conditional_branches_skip_untaken_side() {
        let vm = vm();
        // OP_0 OP_IF OP_RETURN OP_ELSE OP_3 OP_ENDIF
        let halted = vm.state_evaluate(state_for(&[0x00, 0x63, 0x6a, 0x67, 0x53, 0x68]));
        assert!(halted.error.is_none());
        assert_eq!(halted.stack, vec![vec![0x03]]);
    }
}
