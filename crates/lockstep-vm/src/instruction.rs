//! Instruction decoding and encoding.
//!
//! Bytecode is a flat byte sequence: one opcode byte, followed — for push
//! opcodes — by an optional little-endian length prefix and the declared
//! number of payload bytes, read verbatim. Payload *content* is never
//! validated here, only that enough bytes remain.
//!
//! # Design
//!
//! - [`decode_instructions`] — tolerant decode; a truncated trailing
//!   instruction is preserved as an [`IncompleteInstruction`] so callers can
//!   re-prefix it onto subsequent bytecode (the source-mapping engine relies
//!   on this when one instruction spans several compiled nodes).
//! - [`parse_bytecode`] — strict decode; a truncated tail is a
//!   [`DecodeError`].
//! - [`encode_instruction`] / [`encode_data_push`] — inverse serialization
//!   and minimal push prefixing.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::opcodes::{self, length_bytes_for_push_opcode};

/// A single decoded instruction.
///
/// `data` is present exactly when the opcode is a push opcode
/// (`0x00`–`0x4e`); `OP_0` carries an empty payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// The operation identifier
    pub opcode: u8,
    /// Push payload, present only for push opcodes
    pub data: Option<Vec<u8>>,
}

impl Instruction {
    /// A bare (non-push) instruction.
    pub fn bare(opcode: u8) -> Self {
        Self { opcode, data: None }
    }

    /// A push instruction carrying `data`.
    pub fn push(opcode: u8, data: Vec<u8>) -> Self {
        Self {
            opcode,
            data: Some(data),
        }
    }

    /// True if this instruction pushes literal data or a constant.
    pub fn is_push(&self) -> bool {
        opcodes::is_push_opcode(self.opcode)
    }
}

/// Trailing bytes of a bytecode sequence that do not form a complete
/// instruction.
///
/// The raw bytes (opcode included) are kept verbatim: prefixing them onto
/// the next bytecode fragment and decoding again continues exactly where
/// this decode stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteInstruction {
    /// The push opcode that started the truncated instruction
    pub opcode: u8,
    /// Bytes the instruction still declares but the input no longer holds
    pub missing: usize,
    /// The raw unconsumed suffix, starting at the opcode byte
    pub bytes: Vec<u8>,
}

/// Result of a tolerant decode: complete instructions plus an optional
/// truncated tail. Only the final instruction of a sequence can be
/// incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decoded {
    pub instructions: Vec<Instruction>,
    pub incomplete: Option<IncompleteInstruction>,
}

/// Read little-endian unsigned integers of 1, 2 or 4 bytes.
fn read_little_endian(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rev()
        .fold(0usize, |value, byte| (value << 8) | usize::from(*byte))
}

/// Decode `bytecode` into instructions, preserving a truncated tail.
pub fn decode_instructions(bytecode: &[u8]) -> Decoded {
    let mut instructions = Vec::new();
    let mut index = 0;
    while index < bytecode.len() {
        let opcode = bytecode[index];
        if opcode > opcodes::OP_PUSHDATA_4 {
            instructions.push(Instruction::bare(opcode));
            index += 1;
            continue;
        }

        let length_bytes = length_bytes_for_push_opcode(opcode);
        let length_end = index + 1 + length_bytes;
        if length_end > bytecode.len() {
            return Decoded {
                instructions,
                incomplete: Some(IncompleteInstruction {
                    opcode,
                    missing: length_end - bytecode.len(),
                    bytes: bytecode[index..].to_vec(),
                }),
            };
        }

        let data_length = if length_bytes == 0 {
            usize::from(opcode)
        } else {
            read_little_endian(&bytecode[index + 1..length_end])
        };
        let data_end = length_end + data_length;
        if data_end > bytecode.len() {
            return Decoded {
                instructions,
                incomplete: Some(IncompleteInstruction {
                    opcode,
                    missing: data_end - bytecode.len(),
                    bytes: bytecode[index..].to_vec(),
                }),
            };
        }

        instructions.push(Instruction::push(
            opcode,
            bytecode[length_end..data_end].to_vec(),
        ));
        index = data_end;
    }
    Decoded {
        instructions,
        incomplete: None,
    }
}

/// Strictly decode `bytecode`, rejecting truncated instructions.
pub fn parse_bytecode(bytecode: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let decoded = decode_instructions(bytecode);
    match decoded.incomplete {
        None => Ok(decoded.instructions),
        Some(tail) => {
            let length_bytes = length_bytes_for_push_opcode(tail.opcode);
            let present = tail.bytes.len() - 1;
            if present < length_bytes {
                Err(DecodeError::TruncatedLength {
                    opcode: tail.opcode,
                    expected: length_bytes,
                    actual: present,
                })
            } else {
                Err(DecodeError::TruncatedPush {
                    opcode: tail.opcode,
                    expected: present - length_bytes + tail.missing,
                    actual: present - length_bytes,
                })
            }
        }
    }
}

/// Serialize one instruction back to bytecode.
pub fn encode_instruction(instruction: &Instruction) -> Vec<u8> {
    let mut bytecode = vec![instruction.opcode];
    if let Some(data) = &instruction.data {
        let length_bytes = length_bytes_for_push_opcode(instruction.opcode);
        let mut length = data.len();
        for _ in 0..length_bytes {
            bytecode.push((length & 0xff) as u8);
            length >>= 8;
        }
        bytecode.extend_from_slice(data);
    }
    bytecode
}

/// Serialize a sequence of instructions back to bytecode.
pub fn encode_instructions(instructions: &[Instruction]) -> Vec<u8> {
    instructions.iter().flat_map(encode_instruction).collect()
}

/// Prefix `data` with the smallest push instruction able to carry it.
///
/// Single-byte values `0`–`16` use the constant opcodes (`OP_0`,
/// `OP_1`–`OP_16`); longer payloads use direct-length pushes up to 75 bytes,
/// then the `OP_PUSHDATA` forms.
pub fn encode_data_push(data: &[u8]) -> Vec<u8> {
    const MAXIMUM_PUSHDATA_1: usize = 0xff;
    const MAXIMUM_PUSHDATA_2: usize = 0xffff;
    if data.is_empty() {
        return vec![opcodes::OP_0];
    }
    if data.len() == 1 && data[0] <= 16 {
        return if data[0] == 0 {
            vec![opcodes::OP_0]
        } else {
            vec![0x50 + data[0]]
        };
    }
    let mut bytecode = if data.len() <= usize::from(opcodes::OP_PUSHBYTES_75) {
        vec![data.len() as u8]
    } else if data.len() <= MAXIMUM_PUSHDATA_1 {
        vec![opcodes::OP_PUSHDATA_1, data.len() as u8]
    } else if data.len() <= MAXIMUM_PUSHDATA_2 {
        vec![
            opcodes::OP_PUSHDATA_2,
            (data.len() & 0xff) as u8,
            (data.len() >> 8) as u8,
        ]
    } else {
        vec![
            opcodes::OP_PUSHDATA_4,
            (data.len() & 0xff) as u8,
            ((data.len() >> 8) & 0xff) as u8,
            ((data.len() >> 16) & 0xff) as u8,
            ((data.len() >> 24) & 0xff) as u8,
        ]
    };
    bytecode.extend_from_slice(data);
    bytecode
}

fn format_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::new(), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

/// Disassemble one instruction into its ASM name.
pub fn disassemble_instruction(instruction: &Instruction) -> String {
    match &instruction.data {
        None => opcodes::opcode_name(instruction.opcode)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("OP_UNKNOWN_{:#04x}", instruction.opcode)),
        Some(_) if instruction.opcode == opcodes::OP_0 => "OP_0".to_owned(),
        Some(data) => {
            let prefix = match length_bytes_for_push_opcode(instruction.opcode) {
                0 => format!("OP_PUSHBYTES_{}", instruction.opcode),
                1 => "OP_PUSHDATA_1".to_owned(),
                2 => "OP_PUSHDATA_2".to_owned(),
                _ => "OP_PUSHDATA_4".to_owned(),
            };
            format!("{prefix} 0x{}", format_hex(data))
        }
    }
}

/// Disassemble bytecode, rendering a truncated tail as `[missing n bytes]`.
pub fn disassemble_bytecode(bytecode: &[u8]) -> String {
    let decoded = decode_instructions(bytecode);
    let mut words: Vec<String> = decoded
        .instructions
        .iter()
        .map(disassemble_instruction)
        .collect();
    if let Some(tail) = decoded.incomplete {
        let plural = if tail.missing == 1 { "" } else { "s" };
        words.push(format!(
            "0x{} [missing {} byte{plural}]",
            format_hex(&tail.bytes),
            tail.missing
        ));
    }
    words.join(" ")
}
