//! Lockstep authentication virtual machine.
//!
//! A deterministic, resumable stack-machine interpreter for
//! transaction-authentication bytecode. Instructions are decoded from flat
//! bytecode, dispatched through an opcode-indexed table of total
//! state-to-state operations, and driven by a stepping engine whose halted
//! states are idempotent — the foundations the `lockstep-trace`
//! source-mapping engine builds on.
//!
//! Cryptographic primitives are injected behind
//! [`primitives::AuthenticationPrimitives`]; this crate performs no hashing
//! or signature verification of its own.

pub mod error;
pub mod instruction;
pub mod number;
pub mod opcodes;
pub mod ops;
pub mod primitives;
pub mod signing;
pub mod state;
pub mod vm;

pub use error::{DecodeError, VmError};
pub use instruction::{
    decode_instructions, disassemble_bytecode, encode_data_push, encode_instructions,
    parse_bytecode, Decoded, IncompleteInstruction, Instruction,
};
pub use primitives::AuthenticationPrimitives;
pub use state::{AuthenticationProgram, ProgramState, TransactionContext, VmFlags};
pub use vm::{InstructionSet, Operation, Vm};
