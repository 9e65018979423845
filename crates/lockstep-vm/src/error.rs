//! Decode and execution errors.
//!
//! Two distinct failure classes cross this crate's boundary:
//!
//! - [`DecodeError`] — malformed bytecode, raised before any program state
//!   exists. Fatal to the whole evaluation and returned as a `Result::Err`.
//! - [`VmError`] — execution failures, recorded in
//!   [`ProgramState::error`](crate::state::ProgramState). Terminal and
//!   idempotent: once set, further stepping is a no-op.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed-bytecode failure raised by the strict decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DecodeError {
    /// A push-data opcode's length prefix extends past the end of the
    /// bytecode.
    #[error(
        "truncated length prefix for opcode 0x{opcode:02x}: expected {expected} length bytes, found {actual}"
    )]
    TruncatedLength {
        /// The push-data opcode that declared the length prefix
        opcode: u8,
        /// Length-prefix bytes required by the opcode
        expected: usize,
        /// Length-prefix bytes actually present
        actual: usize,
    },

    /// A push instruction declares more payload bytes than remain.
    #[error(
        "truncated push for opcode 0x{opcode:02x}: expected {expected} data bytes, found {actual}"
    )]
    TruncatedPush {
        /// The push opcode
        opcode: u8,
        /// Payload bytes declared
        expected: usize,
        /// Payload bytes actually present
        actual: usize,
    },
}

/// Terminal execution error, stored in `ProgramState::error`.
///
/// Every operation is a total function from state to state: all failure is
/// represented as one of these kinds, never as a panic or an early return
/// crossing the stepping loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum VmError {
    #[error("tried to read from an empty stack")]
    EmptyStack,

    #[error("tried to read from an empty alternate stack")]
    EmptyAlternateStack,

    #[error("push exceeds the {} byte push size limit", crate::state::consensus::MAXIMUM_PUSH_SIZE)]
    ExceedsMaximumPush,

    #[error("stack item exceeds the {} byte length limit", crate::state::consensus::MAXIMUM_STACK_ITEM_LENGTH)]
    ExceededMaximumStackItemLength,

    #[error("exceeded the maximum operation count ({} operations)", crate::state::consensus::MAXIMUM_OPERATION_COUNT)]
    ExceededMaximumOperationCount,

    #[error("exceeded the maximum stack depth ({} items)", crate::state::consensus::MAXIMUM_STACK_DEPTH)]
    ExceededMaximumStackDepth,

    #[error("bytecode exceeds the maximum length ({} bytes)", crate::state::consensus::MAXIMUM_BYTECODE_LENGTH)]
    ExceededMaximumBytecodeLength,

    #[error("unlocking bytecode may contain only push operations")]
    RequiresPushOnly,

    #[error("script called an OP_RETURN operation")]
    CalledReturn,

    #[error("script failed a verify operation")]
    FailedVerify,

    #[error("encountered an OP_ELSE outside of an OP_IF ... OP_ENDIF block")]
    UnexpectedElse,

    #[error("encountered an OP_ENDIF without a matching OP_IF")]
    UnexpectedEndIf,

    #[error("number overflows the allowed range")]
    ExceedsVmNumberRange,

    #[error("number is not minimally encoded")]
    RequiresMinimalEncoding,

    #[error("stack index is out of range")]
    InvalidStackIndex,

    #[error("split index is out of range")]
    InvalidSplitIndex,

    #[error("value cannot be represented in the requested byte length")]
    ImpossibleEncoding,

    #[error("bitwise operands must have matching lengths")]
    MismatchedBitwiseOperandLength,

    #[error("encountered an improperly encoded public key")]
    InvalidPublicKeyEncoding,

    #[error("encountered an improperly encoded signature")]
    InvalidSignatureEncoding,

    #[error("a failing signature must be an empty stack item")]
    NonNullSignatureFailure,

    #[error("locktime operand is negative")]
    NegativeLocktime,

    #[error("locktime requirement is not yet satisfied")]
    UnsatisfiedLocktime,

    #[error("locktime operand and transaction locktime use different units")]
    IncompatibleLocktimeType,

    #[error("locktime checks are disabled for this input")]
    LocktimeDisabled,

    #[error("sequence number requirement is not yet satisfied")]
    UnsatisfiedSequenceNumber,

    #[error("sequence operand and input sequence number use different units")]
    IncompatibleSequenceType,

    #[error("sequence number checks require a transaction version of 2 or greater")]
    InsufficientVersionForSequenceNumber,

    #[error("called an unknown opcode")]
    UnknownOpcode,

    #[error("called a disallowed upgradable NOP operation")]
    DisallowedUpgradableNop,

    #[error("execution ended inside an OP_IF ... OP_ENDIF block")]
    NonEmptyExecutionStack,

    #[error("evaluation must finish with exactly one stack item")]
    RequiresCleanStack,

    #[error("evaluation finished with a falsy top stack item")]
    UnsuccessfulEvaluation,
}
