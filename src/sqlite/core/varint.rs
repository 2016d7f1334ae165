//! SQLite variable-length integers (varints).
//!
//! A varint stores an unsigned 64-bit value in 1 to 9 bytes, big-endian,
//! 7 bits per byte. The high bit of each byte is a continuation flag; if
//! eight continuation bytes have been read, the ninth byte contributes
//! all 8 of its bits.

use crate::sqlite::error::{Result, SqliteError};
use tracing::trace;

/// Maximum encoded length of a varint.
pub const MAX_VARINT_LEN: usize = 9;

/// Decodes a varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed. Fails with
/// `TruncatedVarint` if the slice ends before a terminating byte.
pub fn read_varint(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;

    for i in 0..MAX_VARINT_LEN {
        let byte = *bytes
            .get(i)
            .ok_or(SqliteError::TruncatedVarint(bytes.len()))?;

        if i == MAX_VARINT_LEN - 1 {
            // Ninth byte carries all 8 bits.
            value = (value << 8) | byte as u64;
            trace!(value, len = MAX_VARINT_LEN, "decoded varint");
            return Ok((value, MAX_VARINT_LEN));
        }

        value = (value << 7) | (byte & 0x7f) as u64;
        if byte & 0x80 == 0 {
            trace!(value, len = i + 1, "decoded varint");
            return Ok((value, i + 1));
        }
    }

    unreachable!("loop returns on or before the ninth byte")
}

/// Encodes `value` as a varint.
///
/// The inverse of [`read_varint`]; used by tests and fixtures.
pub fn encode_varint(value: u64) -> Vec<u8> {
    // Values needing more than 8*7 = 56 bits take the full 9-byte form.
    if value >> 56 != 0 {
        let mut out = Vec::with_capacity(MAX_VARINT_LEN);
        for i in (0..8).rev() {
            out.push(0x80 | ((value >> (8 + i * 7)) & 0x7f) as u8);
        }
        out.push((value & 0xff) as u8);
        return out;
    }

    let mut groups = vec![(value & 0x7f) as u8];
    let mut rest = value >> 7;
    while rest != 0 {
        groups.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    groups.reverse();
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_values() -> Result<()> {
        assert_eq!(read_varint(&[0x00])?, (0, 1));
        assert_eq!(read_varint(&[0x7f])?, (127, 1));
        Ok(())
    }

    #[test]
    fn two_byte_value() -> Result<()> {
        // 0x81 0x00 => 128
        assert_eq!(read_varint(&[0x81, 0x00])?, (128, 2));
        Ok(())
    }

    #[test]
    fn nine_byte_value_uses_all_bits_of_last_byte() -> Result<()> {
        let bytes = [0xff; 9];
        let (value, len) = read_varint(&bytes)?;
        assert_eq!(value, u64::MAX);
        assert_eq!(len, 9);
        Ok(())
    }

    #[test]
    fn stops_at_terminator_ignoring_trailing_bytes() -> Result<()> {
        assert_eq!(read_varint(&[0x05, 0xff, 0xff])?, (5, 1));
        Ok(())
    }

    #[test]
    fn truncated_input_is_an_error() {
        assert!(read_varint(&[]).is_err());
        assert!(read_varint(&[0x80]).is_err());
        assert!(read_varint(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn round_trip_is_identity() -> Result<()> {
        let samples: &[u64] = &[
            0,
            1,
            127,
            128,
            16383,
            16384,
            241,
            1_000_000,
            u32::MAX as u64,
            (1 << 56) - 1,
            1 << 56,
            u64::MAX - 1,
            u64::MAX,
        ];
        for &v in samples {
            let encoded = encode_varint(v);
            assert!(encoded.len() <= MAX_VARINT_LEN);
            let (decoded, consumed) = read_varint(&encoded)?;
            assert_eq!(decoded, v, "value {v} did not round-trip");
            assert_eq!(consumed, encoded.len());
        }
        Ok(())
    }
}
