//! Cryptographic primitive seam.
//!
//! The VM never implements hashing or signature verification itself: the
//! digest and signature opcodes call out through this trait, and the caller
//! injects a real implementation at VM construction. Tests use
//! [`MockPrimitives`], a deterministic stand-in.

/// Injected cryptographic primitives.
///
/// Implementations must be thread-safe; the VM shares one instance across
/// the whole dispatch table.
pub trait AuthenticationPrimitives: Send + Sync {
    /// SHA-256 digest.
    fn sha256(&self, input: &[u8]) -> [u8; 32];

    /// SHA-1 digest.
    fn sha1(&self, input: &[u8]) -> [u8; 20];

    /// RIPEMD-160 digest.
    fn ripemd160(&self, input: &[u8]) -> [u8; 20];

    /// Verify `signature` over a 32-byte message `digest` with
    /// `public_key`. Encoding has already been shape-checked by the calling
    /// opcode; implementations apply their own stricter rules and simply
    /// return `false` for anything they reject.
    fn verify_signature(&self, signature: &[u8], public_key: &[u8], digest: &[u8; 32]) -> bool;
}

/// Deterministic primitives for tests and offline debugging.
///
/// Digests fold the input into a repeating pattern (nothing resembling a
/// real hash), and a "signature" verifies when it equals the message digest
/// truncated to its own length. This keeps signing-path tests independent of
/// any cryptography crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockPrimitives;

impl MockPrimitives {
    fn fold<const N: usize>(input: &[u8]) -> [u8; N] {
        let mut digest = [0u8; N];
        digest[0] = input.len() as u8;
        for (index, byte) in input.iter().enumerate() {
            digest[index % N] = digest[index % N].wrapping_add(*byte).rotate_left(3);
        }
        digest
    }
}

impl AuthenticationPrimitives for MockPrimitives {
    fn sha256(&self, input: &[u8]) -> [u8; 32] {
        Self::fold::<32>(input)
    }

    fn sha1(&self, input: &[u8]) -> [u8; 20] {
        Self::fold::<20>(input)
    }

    fn ripemd160(&self, input: &[u8]) -> [u8; 20] {
        Self::fold::<20>(input)
    }

    fn verify_signature(&self, signature: &[u8], _public_key: &[u8], digest: &[u8; 32]) -> bool {
        !signature.is_empty() && signature.len() <= digest.len() && *signature == digest[..signature.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_digests_are_deterministic() {
        let primitives = MockPrimitives;
        assert_eq!(primitives.sha256(b"abc"), primitives.sha256(b"abc"));
        assert_ne!(primitives.sha256(b"abc"), primitives.sha256(b"abd"));
        assert_ne!(primitives.sha256(b""), primitives.sha256(b"\0"));
    }

    #[test]
    fn test_mock_signature_matches_digest_prefix() {
        let primitives = MockPrimitives;
        let digest = primitives.sha256(b"message");
        assert!(primitives.verify_signature(&digest[..8], b"key", &digest));
        assert!(!primitives.verify_signature(&[0xff; 8], b"key", &digest));
        assert!(!primitives.verify_signature(&[], b"key", &digest));
    }
}
