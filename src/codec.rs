//! Self-delimiting encoding of byte strings as fixed-width integers.
//!
//! A payload of `len` bytes is placed in the most significant `8 * len` bits of a `bits`-bit
//! integer. The bit immediately below the payload (the "sentinel") is set and every bit below it
//! is zero. Decoding finds the lowest set bit, so no separate length field is needed:
//!
//! ```text
//!  bits-1                                  0
//! [ payload (8 * len bits) | 1 | 0 ... 0 ]
//! ```

use crate::Error;

/// Maps byte strings to and from `bits`-bit unsigned integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Codec {
    bits: u16,
}

impl Codec {
    /// Construct a codec for `bits`-bit values. `bits` must be in `1..=128`.
    pub fn new(bits: u16) -> Result<Self, Error> {
        if bits == 0 || bits > 128 {
            return Err(Error::UnsupportedWidth(bits));
        }
        Ok(Self { bits })
    }

    /// The width of encoded values in bits.
    pub fn bits(&self) -> u16 {
        self.bits
    }

    /// The longest payload, in bytes, that fits alongside the sentinel bit.
    pub fn max_len(&self) -> usize {
        usize::from(self.bits - 1) / 8
    }

    /// Encode `value` as a `bits`-bit integer.
    pub fn encode(&self, value: &[u8]) -> Result<u128, Error> {
        if value.len() > self.max_len() {
            return Err(Error::EncodingOverflow {
                len: value.len(),
                bits: self.bits,
            });
        }

        let shift = u32::from(self.bits) - 8 * value.len() as u32;
        let payload = value
            .iter()
            .fold(0u128, |acc, byte| acc << 8 | u128::from(*byte));
        // An empty payload shifts by the full width, which may be 128.
        let payload = payload.checked_shl(shift).unwrap_or(0);
        Ok(payload | 1u128 << (shift - 1))
    }

    /// Recover the byte string from a value produced by [`Self::encode`].
    ///
    /// Only byte-aligned payloads are supported. A sentinel that is not on a byte boundary is
    /// rejected rather than decoded to a truncated payload.
    pub fn decode(&self, encoded: u128) -> Result<Vec<u8>, Error> {
        if self.bits < 128 && encoded >> self.bits != 0 {
            return Err(Error::MalformedEncoding("value exceeds bit width"));
        }
        if encoded == 0 {
            return Err(Error::MalformedEncoding("no sentinel bit"));
        }

        let sentinel = encoded.trailing_zeros();
        let payload_bits = u32::from(self.bits) - 1 - sentinel;
        if payload_bits % 8 != 0 {
            return Err(Error::MalformedEncoding("payload is not byte-aligned"));
        }

        let len = (payload_bits / 8) as usize;
        let payload = encoded.checked_shr(sentinel + 1).unwrap_or(0);
        Ok(payload.to_be_bytes()[16 - len..].to_vec())
    }
}
