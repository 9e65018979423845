//! Digest and signature-checking operations.
//!
//! All cryptography is delegated to the injected
//! [`AuthenticationPrimitives`]; these operations only manage stack
//! discipline, encodings and the signing-serialization plumbing.

use std::sync::Arc;

use crate::error::VmError;
use crate::instruction::encode_instructions;
use crate::number::encode_bool;
use crate::opcodes;
use crate::primitives::AuthenticationPrimitives;
use crate::signing::{generate_signing_serialization, SigningSerializationType};
use crate::state::{ProgramState, VmFlags};
use crate::vm::Operation;

use super::combinators::combine;
use super::flow::op_verify;

fn digest_op(
    primitives: Arc<dyn AuthenticationPrimitives>,
    apply: fn(&dyn AuthenticationPrimitives, &[u8]) -> Vec<u8>,
) -> Operation {
    Box::new(move |state: &mut ProgramState| {
        let Some(item) = state.stack.pop() else {
            return state.fail(VmError::EmptyStack);
        };
        state.stack.push(apply(primitives.as_ref(), &item));
    })
}

fn op_code_separator(state: &mut ProgramState) {
    state.last_code_separator = Some(state.ip);
}

/// A compressed (33-byte) or uncompressed (65-byte) public key shape.
fn is_valid_public_key_encoding(public_key: &[u8]) -> bool {
    match public_key.first() {
        Some(0x02 | 0x03) => public_key.len() == 33,
        Some(0x04) => public_key.len() == 65,
        _ => false,
    }
}

/// The locking bytecode covered by a signature: everything from the most
/// recent executed `OP_CODESEPARATOR`.
fn covered_bytecode(state: &ProgramState) -> Vec<u8> {
    let start = state
        .last_code_separator
        .map(|separator| separator + 1)
        .unwrap_or(0);
    encode_instructions(&state.instructions[start..])
}

fn op_check_sig(
    state: &mut ProgramState,
    flags: VmFlags,
    primitives: &dyn AuthenticationPrimitives,
) {
    if state.stack.len() < 2 {
        return state.fail(VmError::EmptyStack);
    }
    if !is_valid_public_key_encoding(&state.stack[state.stack.len() - 1]) {
        return state.fail(VmError::InvalidPublicKeyEncoding);
    }
    let type_byte = state.stack[state.stack.len() - 2].last().copied();
    let signing_type = match type_byte {
        None => None,
        Some(byte) => match SigningSerializationType::decode(byte) {
            Some(signing_type) => Some(signing_type),
            None => return state.fail(VmError::InvalidSignatureEncoding),
        },
    };

    let public_key = state.stack.pop().expect("depth checked");
    let signature = state.stack.pop().expect("depth checked");
    state.signature_operation_count += 1;

    let Some(signing_type) = signing_type else {
        // an empty signature never verifies, but it fails politely
        state.stack.push(encode_bool(false));
        return;
    };
    let message = generate_signing_serialization(
        state.context.as_ref(),
        &covered_bytecode(state),
        signing_type,
    );
    let digest = primitives.sha256(&primitives.sha256(&message));
    let body = &signature[..signature.len() - 1];
    if primitives.verify_signature(body, &public_key, &digest) {
        state.stack.push(encode_bool(true));
    } else if flags.require_null_signature_failures {
        state.fail(VmError::NonNullSignatureFailure);
    } else {
        state.stack.push(encode_bool(false));
    }
}

/// The crypto group.
pub fn operations(
    flags: VmFlags,
    primitives: Arc<dyn AuthenticationPrimitives>,
) -> Vec<(u8, Operation)> {
    let check_sig: Operation = {
        let primitives = primitives.clone();
        Box::new(move |state: &mut ProgramState| {
            op_check_sig(state, flags, primitives.as_ref())
        })
    };
    let check_sig_verify: Operation = {
        let primitives = primitives.clone();
        combine(
            Box::new(move |state: &mut ProgramState| {
                op_check_sig(state, flags, primitives.as_ref())
            }),
            Box::new(op_verify),
        )
    };
    vec![
        (
            opcodes::OP_RIPEMD160,
            digest_op(primitives.clone(), |primitives, input| {
                primitives.ripemd160(input).to_vec()
            }),
        ),
        (
            opcodes::OP_SHA1,
            digest_op(primitives.clone(), |primitives, input| {
                primitives.sha1(input).to_vec()
            }),
        ),
        (
            opcodes::OP_SHA256,
            digest_op(primitives.clone(), |primitives, input| {
                primitives.sha256(input).to_vec()
            }),
        ),
        (
            opcodes::OP_HASH160,
            digest_op(primitives.clone(), |primitives, input| {
                primitives.ripemd160(&primitives.sha256(input)).to_vec()
            }),
        ),
        (
            opcodes::OP_HASH256,
            digest_op(primitives, |primitives, input| {
                primitives.sha256(&primitives.sha256(input)).to_vec()
            }),
        ),
        (opcodes::OP_CODESEPARATOR, Box::new(op_code_separator)),
        (opcodes::OP_CHECKSIG, check_sig),
        (opcodes::OP_CHECKSIGVERIFY, check_sig_verify),
    ]
}
