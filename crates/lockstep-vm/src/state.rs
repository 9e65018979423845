//! Program state and evaluation context.
//!
//! A [`ProgramState`] is the single mutable record threaded through the
//! stepping engine. It is exclusively owned by the call chain that produced
//! it: `state_step` takes ownership and returns it, so in-place mutation is
//! safe and no two live references can observe divergent states.
//!
//! The read-only transaction facts needed by signing and time opcodes live
//! in a [`TransactionContext`] shared behind an `Arc` — cloning a state for
//! a debug trace never copies them.

use std::sync::Arc;

use crate::error::VmError;
use crate::instruction::Instruction;

/// Consensus limits enforced by opcode dispatch.
///
/// These ceilings are the system's sole guard against unbounded work: the
/// instruction pointer only moves forward, so bounding pushes, stack depth
/// and the operation count bounds every evaluation.
pub mod consensus {
    /// Maximum length of either bytecode of a program.
    pub const MAXIMUM_BYTECODE_LENGTH: usize = 10_000;
    /// Maximum payload of a single push operation.
    pub const MAXIMUM_PUSH_SIZE: usize = 520;
    /// Maximum length of any stack item.
    pub const MAXIMUM_STACK_ITEM_LENGTH: usize = 520;
    /// Maximum combined depth of the stack and alternate stack.
    pub const MAXIMUM_STACK_DEPTH: usize = 1_000;
    /// Maximum number of counted operations per evaluation.
    pub const MAXIMUM_OPERATION_COUNT: usize = 201;
    /// Maximum byte length of an arithmetic operand.
    pub const MAXIMUM_VM_NUMBER_LENGTH: usize = 4;
    /// Maximum byte length of a locktime/sequence operand.
    pub const MAXIMUM_LOCKTIME_OPERAND_LENGTH: usize = 5;
    /// Locktime values at or above this threshold are timestamps; below it,
    /// block heights.
    pub const LOCKTIME_THRESHOLD: i64 = 500_000_000;
}

/// Behavior switches of the instruction set.
///
/// Defaults match the strict ruleset (minimal encodings required, upgradable
/// NOPs disallowed, failing signatures must be null).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmFlags {
    /// Reject non-minimally encoded numeric operands.
    pub require_minimal_encoding: bool,
    /// Treat `OP_NOP1`/`OP_NOP4`–`OP_NOP10` as errors.
    pub disallow_upgradable_nops: bool,
    /// Require a failing signature to be the empty item.
    pub require_null_signature_failures: bool,
}

impl Default for VmFlags {
    fn default() -> Self {
        Self {
            require_minimal_encoding: true,
            disallow_upgradable_nops: true,
            require_null_signature_failures: true,
        }
    }
}

/// Read-only transaction facts for one evaluated input.
///
/// Everything here is precomputed by the caller; the digest fields cache the
/// hashes of serialized transaction components so signing opcodes never
/// re-serialize the spending transaction themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    /// Transaction version
    pub version: u32,
    /// Transaction locktime
    pub locktime: u32,
    /// Hash of the outpoint's source transaction
    pub outpoint_transaction_hash: [u8; 32],
    /// Index of the spent output in its source transaction
    pub outpoint_index: u32,
    /// Sequence number of the evaluated input
    pub sequence_number: u32,
    /// Value of the spent output, in the smallest unit
    pub output_value: u64,
    /// Double-hash of all serialized outpoints
    pub transaction_outpoints_hash: [u8; 32],
    /// Double-hash of all serialized sequence numbers
    pub transaction_sequence_numbers_hash: [u8; 32],
    /// Double-hash of all serialized outputs
    pub transaction_outputs_hash: [u8; 32],
    /// Double-hash of the output at the evaluated input's index, if any
    pub corresponding_output_hash: Option<[u8; 32]>,
}

impl TransactionContext {
    /// A meaningless but complete context, useful for testing and
    /// debugging. Each digest field is filled with a distinct byte.
    pub fn placeholder() -> Self {
        Self {
            version: 2,
            locktime: 0,
            outpoint_transaction_hash: [0x01; 32],
            outpoint_index: 0,
            sequence_number: 0,
            output_value: 0,
            transaction_outpoints_hash: [0x02; 32],
            transaction_sequence_numbers_hash: [0x03; 32],
            transaction_outputs_hash: [0x04; 32],
            corresponding_output_hash: Some([0x05; 32]),
        }
    }
}

/// An authentication program: the two bytecodes of one spending input plus
/// its transaction context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationProgram {
    /// Bytecode of the spending input (first phase; must be push-only)
    pub unlocking_bytecode: Vec<u8>,
    /// Bytecode of the spent output (second phase)
    pub locking_bytecode: Vec<u8>,
    /// Read-only transaction facts
    pub context: TransactionContext,
}

/// The mutable execution context of one evaluation phase.
///
/// Once `error` is set the state is *terminal*: stepping it again returns an
/// equal state, and no other field may change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramState {
    /// Decoded instructions, fixed for the whole evaluation
    pub instructions: Arc<[Instruction]>,
    /// Index of the next instruction to execute
    pub ip: usize,
    /// The data stack (top is the last element)
    pub stack: Vec<Vec<u8>>,
    /// The alternate stack
    pub alternate_stack: Vec<Vec<u8>>,
    /// Branch markers for `OP_IF`-family nesting; any `false` entry disables
    /// execution of counted operations
    pub execution_stack: Vec<bool>,
    /// Counted (non-push) operations executed so far
    pub operation_count: usize,
    /// Signature checks executed so far
    pub signature_operation_count: usize,
    /// Instruction index of the last `OP_CODESEPARATOR`, if any
    pub last_code_separator: Option<usize>,
    /// Terminal error, if the evaluation has failed
    pub error: Option<VmError>,
    /// Shared read-only transaction facts
    pub context: Arc<TransactionContext>,
}

impl ProgramState {
    /// Create the initial state for one evaluation phase.
    pub fn new(
        instructions: Arc<[Instruction]>,
        stack: Vec<Vec<u8>>,
        context: Arc<TransactionContext>,
    ) -> Self {
        Self {
            instructions,
            ip: 0,
            stack,
            alternate_stack: Vec::new(),
            execution_stack: Vec::new(),
            operation_count: 0,
            signature_operation_count: 0,
            last_code_separator: None,
            error: None,
            context,
        }
    }

    /// True when every branch marker permits execution.
    pub fn executing(&self) -> bool {
        self.execution_stack.iter().all(|marker| *marker)
    }

    /// The instruction at the current instruction pointer.
    ///
    /// # Panics
    /// Panics if the state is halted (`ip` past the end); the stepping
    /// engine only dispatches on running states.
    pub fn current_instruction(&self) -> &Instruction {
        &self.instructions[self.ip]
    }

    /// Record a terminal error. The first error wins: a state that has
    /// already failed is never modified again.
    pub(crate) fn fail(&mut self, error: VmError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_state() -> ProgramState {
        ProgramState::new(
            Vec::new().into(),
            Vec::new(),
            Arc::new(TransactionContext::placeholder()),
        )
    }

    #[test]
    fn test_new_state_is_pristine() {
        let state = empty_state();
        assert_eq!(state.ip, 0);
        assert!(state.stack.is_empty());
        assert!(state.alternate_stack.is_empty());
        assert!(state.execution_stack.is_empty());
        assert_eq!(state.operation_count, 0);
        assert_eq!(state.last_code_separator, None);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_executing_follows_branch_markers() {
        let mut state = empty_state();
        assert!(state.executing());
        state.execution_stack.push(true);
        assert!(state.executing());
        state.execution_stack.push(false);
        assert!(!state.executing());
    }

    #[test]
    fn test_first_error_wins() {
        let mut state = empty_state();
        state.fail(VmError::EmptyStack);
        state.fail(VmError::CalledReturn);
        assert_eq!(state.error, Some(VmError::EmptyStack));
    }

    #[test]
    fn test_default_flags_are_strict() {
        let flags = VmFlags::default();
        assert!(flags.require_minimal_encoding);
        assert!(flags.disallow_upgradable_nops);
        assert!(flags.require_null_signature_failures);
    }
}
