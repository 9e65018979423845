//! Signing-serialization assembly.
//!
//! The message covered by a transaction signature is assembled from the
//! cached component digests in the [`TransactionContext`] plus the covered
//! bytecode slice — the transaction itself is never re-serialized here.
//! The layout follows the fork-id signing algorithm: per-component
//! double-hashes are selected by the signing serialization type carried in
//! the signature's final byte.

use crate::state::TransactionContext;

const FLAG_FORK_ID: u8 = 0x40;
const FLAG_ANYONE_CAN_PAY: u8 = 0x80;
const BASE_TYPE_MASK: u8 = 0x1f;

/// Which outputs a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoveredOutputs {
    /// Commit to every output (`ALL`)
    All,
    /// Commit to no outputs (`NONE`)
    None,
    /// Commit only to the output at the signed input's index (`SINGLE`)
    Corresponding,
}

/// Decoded signing serialization type (the final byte of a signature).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningSerializationType {
    pub covered_outputs: CoveredOutputs,
    /// Commit only to the signed input, not all inputs
    pub anyone_can_pay: bool,
}

impl SigningSerializationType {
    /// Decode a type byte, rejecting undefined base types and missing
    /// fork-id flags.
    pub fn decode(byte: u8) -> Option<Self> {
        if byte & FLAG_FORK_ID == 0 {
            return None;
        }
        let covered_outputs = match byte & BASE_TYPE_MASK {
            0x01 => CoveredOutputs::All,
            0x02 => CoveredOutputs::None,
            0x03 => CoveredOutputs::Corresponding,
            _ => return None,
        };
        Some(Self {
            covered_outputs,
            anyone_can_pay: byte & FLAG_ANYONE_CAN_PAY != 0,
        })
    }

    /// Re-encode as the 1-byte wire form.
    pub fn encode(self) -> u8 {
        let base = match self.covered_outputs {
            CoveredOutputs::All => 0x01,
            CoveredOutputs::None => 0x02,
            CoveredOutputs::Corresponding => 0x03,
        };
        base | FLAG_FORK_ID | if self.anyone_can_pay { FLAG_ANYONE_CAN_PAY } else { 0 }
    }
}

fn push_compact_size(message: &mut Vec<u8>, value: usize) {
    match value {
        0..=0xfc => message.push(value as u8),
        0xfd..=0xffff => {
            message.push(0xfd);
            message.extend_from_slice(&(value as u16).to_le_bytes());
        }
        _ => {
            message.push(0xfe);
            message.extend_from_slice(&(value as u32).to_le_bytes());
        }
    }
}

/// Assemble the message to be double-hashed and signed.
///
/// `covered_bytecode` is the locking bytecode re-serialized from the most
/// recent `OP_CODESEPARATOR` (or its whole length when none executed).
pub fn generate_signing_serialization(
    context: &TransactionContext,
    covered_bytecode: &[u8],
    signing_type: SigningSerializationType,
) -> Vec<u8> {
    const EMPTY_HASH: [u8; 32] = [0; 32];
    let outpoints_hash = if signing_type.anyone_can_pay {
        &EMPTY_HASH
    } else {
        &context.transaction_outpoints_hash
    };
    let sequence_numbers_hash = if signing_type.anyone_can_pay
        || signing_type.covered_outputs != CoveredOutputs::All
    {
        &EMPTY_HASH
    } else {
        &context.transaction_sequence_numbers_hash
    };
    let outputs_hash = match signing_type.covered_outputs {
        CoveredOutputs::All => &context.transaction_outputs_hash,
        CoveredOutputs::Corresponding => context
            .corresponding_output_hash
            .as_ref()
            .unwrap_or(&EMPTY_HASH),
        CoveredOutputs::None => &EMPTY_HASH,
    };

    let mut message = Vec::with_capacity(156 + covered_bytecode.len());
    message.extend_from_slice(&context.version.to_le_bytes());
    message.extend_from_slice(outpoints_hash);
    message.extend_from_slice(sequence_numbers_hash);
    message.extend_from_slice(&context.outpoint_transaction_hash);
    message.extend_from_slice(&context.outpoint_index.to_le_bytes());
    push_compact_size(&mut message, covered_bytecode.len());
    message.extend_from_slice(covered_bytecode);
    message.extend_from_slice(&context.output_value.to_le_bytes());
    message.extend_from_slice(&context.sequence_number.to_le_bytes());
    message.extend_from_slice(outputs_hash);
    message.extend_from_slice(&context.locktime.to_le_bytes());
    message.extend_from_slice(&u32::from(signing_type.encode()).to_le_bytes());
    message
}
