//! VM numbers.
//!
//! Numeric stack items use a little-endian sign-magnitude format (the
//! Satoshi implementation's `CScriptNum`): the empty item is `0`, and the
//! high bit of the most significant byte carries the sign. Because the
//! encoding of a result may feed non-numeric operations (hashing,
//! equality), the exact byte representation is consensus-critical.
//!
//! Operand parsing is limited to 4 bytes (5 for the locktime operations);
//! results may exceed that length, in which case later operations can only
//! treat them as raw bytes.

use crate::error::VmError;
use crate::state::consensus;

/// Failure to interpret a stack item as a VM number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmNumberError {
    /// More bytes than the permitted operand length
    ExceedsRange,
    /// Zero-padded (non-minimal) encoding
    RequiresMinimal,
}

impl From<VmNumberError> for VmError {
    fn from(error: VmNumberError) -> Self {
        match error {
            VmNumberError::ExceedsRange => VmError::ExceedsVmNumberRange,
            VmNumberError::RequiresMinimal => VmError::RequiresMinimalEncoding,
        }
    }
}

/// Decode a stack item as a VM number.
///
/// `maximum_length` bounds the operand size in bytes (4 for arithmetic,
/// 5 for locktime operands). With `require_minimal`, zero-padding beyond
/// the shortest possible encoding is rejected.
pub fn decode_vm_number(
    bytes: &[u8],
    require_minimal: bool,
    maximum_length: usize,
) -> Result<i64, VmNumberError> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > maximum_length {
        return Err(VmNumberError::ExceedsRange);
    }
    let most_significant = bytes[bytes.len() - 1];
    if require_minimal && most_significant & 0x7f == 0 {
        // A most significant byte of 0x00/0x80 is only allowed when the
        // next byte needs its high bit for the magnitude.
        if bytes.len() <= 1 || bytes[bytes.len() - 2] & 0x80 == 0 {
            return Err(VmNumberError::RequiresMinimal);
        }
    }

    let mut magnitude = 0i64;
    for (index, byte) in bytes.iter().enumerate() {
        let byte = if index == bytes.len() - 1 {
            byte & 0x7f
        } else {
            *byte
        };
        magnitude |= i64::from(byte) << (8 * index);
    }
    if most_significant & 0x80 != 0 {
        Ok(-magnitude)
    } else {
        Ok(magnitude)
    }
}

/// Decode with the standard 4-byte arithmetic operand limit.
pub fn decode_arithmetic_operand(
    bytes: &[u8],
    require_minimal: bool,
) -> Result<i64, VmNumberError> {
    decode_vm_number(bytes, require_minimal, consensus::MAXIMUM_VM_NUMBER_LENGTH)
}

/// Encode an integer in minimal VM-number form (`0` encodes as empty).
pub fn encode_vm_number(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut bytes = Vec::new();
    while magnitude > 0 {
        bytes.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }
    // If the magnitude occupies the high bit, a sign byte is appended;
    // otherwise the sign lives in the most significant byte itself.
    if bytes[bytes.len() - 1] & 0x80 != 0 {
        bytes.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let last = bytes.len() - 1;
        bytes[last] |= 0x80;
    }
    bytes
}

/// Encode a boolean the way comparison operations do: `true` as `0x01`,
/// `false` as the empty item.
pub fn encode_bool(value: bool) -> Vec<u8> {
    if value {
        vec![0x01]
    } else {
        Vec::new()
    }
}

/// Truthiness of a stack item: false iff the item encodes zero (including
/// negative zero in sign-magnitude form).
pub fn stack_item_is_truthy(item: &[u8]) -> bool {
    for (index, byte) in item.iter().enumerate() {
        let significant = if index == item.len() - 1 {
            byte & 0x7f
        } else {
            *byte
        };
        if significant != 0 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_empty() {
        assert_eq!(encode_vm_number(0), Vec::<u8>::new());
        assert_eq!(decode_vm_number(&[], true, 4), Ok(0));
    }

    #[test]
    fn test_round_trip_small_values() {
        for value in [-130i64, -128, -127, -1, 1, 17, 127, 128, 255, 256, 520] {
            let encoded = encode_vm_number(value);
            assert_eq!(
                decode_vm_number(&encoded, true, 4),
                Ok(value),
                "value {value} failed to round-trip via {encoded:?}"
            );
        }
    }

    #[test]
    fn test_sign_byte_appended_when_high_bit_taken() {
        // 128 needs a second byte for the sign
        assert_eq!(encode_vm_number(128), vec![0x80, 0x00]);
        assert_eq!(encode_vm_number(-128), vec![0x80, 0x80]);
        // 127 fits with its sign in one byte
        assert_eq!(encode_vm_number(127), vec![0x7f]);
        assert_eq!(encode_vm_number(-127), vec![0xff]);
    }

    #[test]
    fn test_non_minimal_encodings_rejected() {
        // 1 padded to two bytes
        assert_eq!(
            decode_vm_number(&[0x01, 0x00], true, 4),
            Err(VmNumberError::RequiresMinimal)
        );
        // negative zero
        assert_eq!(
            decode_vm_number(&[0x80], true, 4),
            Err(VmNumberError::RequiresMinimal)
        );
        // padding that protects the magnitude's high bit is minimal
        assert_eq!(decode_vm_number(&[0x80, 0x00], true, 4), Ok(128));
        // without the minimality requirement, padding decodes fine
        assert_eq!(decode_vm_number(&[0x01, 0x00], false, 4), Ok(1));
    }

    #[test]
    fn test_operand_length_limit() {
        assert_eq!(
            decode_vm_number(&[0x01, 0x02, 0x03, 0x04, 0x05], true, 4),
            Err(VmNumberError::ExceedsRange)
        );
        // the same bytes are accepted under the 5-byte locktime limit
        assert!(decode_vm_number(&[0x01, 0x02, 0x03, 0x04, 0x05], true, 5).is_ok());
    }

    #[test]
    fn test_truthiness() {
        assert!(!stack_item_is_truthy(&[]));
        assert!(!stack_item_is_truthy(&[0x00]));
        assert!(!stack_item_is_truthy(&[0x00, 0x00]));
        // negative zero is falsy
        assert!(!stack_item_is_truthy(&[0x80]));
        assert!(!stack_item_is_truthy(&[0x00, 0x80]));
        assert!(stack_item_is_truthy(&[0x01]));
        assert!(stack_item_is_truthy(&[0x00, 0x01]));
        assert!(stack_item_is_truthy(&[0x80, 0x00]));
    }
}
