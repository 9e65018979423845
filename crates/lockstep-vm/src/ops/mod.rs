//! Opcode implementations.
//!
//! Operations are grouped by concern and composed into an
//! [`InstructionSet`](crate::vm::InstructionSet) by
//! [`common_instruction_set`]. The assembly applies the combinator
//! discipline shared by the whole set:
//!
//! - push and constant operations are conditionally evaluated (skipped
//!   inside an untaken branch) but never counted;
//! - every other operation is conditionally evaluated, counted against the
//!   operation ceiling, and limit-checked after it runs;
//! - the `OP_IF` family is installed unwrapped — branch markers must be
//!   maintained even while execution is disabled.

pub mod arithmetic;
pub mod bitwise;
pub mod combinators;
pub mod crypto;
pub mod flow;
pub mod push;
pub mod splice;
pub mod stack;
pub mod time;

use std::sync::Arc;

use crate::primitives::AuthenticationPrimitives;
use crate::state::VmFlags;
use crate::vm::InstructionSet;

/// Assemble the common instruction set over the injected primitives.
pub fn common_instruction_set(
    flags: VmFlags,
    primitives: Arc<dyn AuthenticationPrimitives>,
) -> InstructionSet {
    let mut set = InstructionSet::new();

    for (opcode, operation) in push::operations() {
        set.define(opcode, combinators::conditionally_evaluate(operation));
    }

    let counted = flow::counted_operations()
        .into_iter()
        .chain(flow::nop_operations(flags))
        .chain(stack::operations(flags))
        .chain(splice::operations(flags))
        .chain(bitwise::operations())
        .chain(arithmetic::operations(flags))
        .chain(crypto::operations(flags, primitives))
        .chain(time::operations(flags));
    for (opcode, operation) in counted {
        set.define(opcode, combinators::counted(operation));
    }

    for (opcode, operation) in flow::unconditional_operations() {
        set.define(opcode, operation);
    }

    set
}
