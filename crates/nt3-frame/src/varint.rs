//! Unsigned LEB128 length prefixes.
//!
//! Seven payload bits per byte, least-significant group first, high bit set
//! on every byte except the last.

use bytes::BufMut;

use crate::error::{FrameError, Result};

/// Longest accepted length prefix. Five groups cover every 31-bit length.
pub const MAX_VARINT_LEN: usize = 5;

/// Decoded lengths are limited to 31 bits.
const LENGTH_MASK: u64 = 0x7FFF_FFFF;

/// Decode a length prefix from the start of `src`.
///
/// Returns `Ok(None)` when `src` ends before the terminating byte, otherwise
/// the decoded value and the number of bytes it occupied.
pub fn decode_varint(src: &[u8]) -> Result<Option<(u32, usize)>> {
    let mut value: u64 = 0;
    for (index, byte) in src.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u64::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(Some(((value & LENGTH_MASK) as u32, index + 1)));
        }
    }

    if src.len() >= MAX_VARINT_LEN {
        return Err(FrameError::VarintOverflow);
    }
    Ok(None)
}

/// Number of bytes [`encode_varint`] writes for `value`.
pub fn varint_len(value: u32) -> usize {
    let mut len = 1;
    let mut rest = value >> 7;
    while rest != 0 {
        len += 1;
        rest >>= 7;
    }
    len
}

/// Write `value` as a length prefix, returning the number of bytes written.
pub fn encode_varint(value: u32, dst: &mut impl BufMut) -> usize {
    let mut rest = value;
    let mut written = 0;
    loop {
        let byte = (rest & 0x7F) as u8;
        rest >>= 7;
        written += 1;
        if rest == 0 {
            dst.put_u8(byte);
            return written;
        }
        dst.put_u8(byte | 0x80);
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn decode_zero() {
        assert_eq!(decode_varint(&[0x00]).unwrap(), Some((0, 1)));
    }

    #[test]
    fn decode_two_groups() {
        assert_eq!(decode_varint(&[0x81, 0x01]).unwrap(), Some((129, 2)));
    }

    #[test]
    fn decode_stops_at_first_terminal_byte() {
        assert_eq!(decode_varint(&[0x05, 0xFF, 0xFF]).unwrap(), Some((5, 1)));
    }

    #[test]
    fn decode_incomplete_prefix() {
        assert_eq!(decode_varint(&[]).unwrap(), None);
        assert_eq!(decode_varint(&[0x80, 0x80]).unwrap(), None);
    }

    #[test]
    fn decode_masks_to_31_bits() {
        // 0xFFFF_FFFF spread over five groups.
        let (value, used) = decode_varint(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]).unwrap().unwrap();
        assert_eq!(used, 5);
        assert_eq!(value, 0x7FFF_FFFF);
    }

    #[test]
    fn decode_rejects_overlong_prefix() {
        let err = decode_varint(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]).unwrap_err();
        assert!(matches!(err, FrameError::VarintOverflow));
    }

    #[test]
    fn encode_matches_reference_bytes() {
        let mut buf = BytesMut::new();
        assert_eq!(encode_varint(0, &mut buf), 1);
        assert_eq!(encode_varint(129, &mut buf), 2);
        assert_eq!(encode_varint(300, &mut buf), 2);
        assert_eq!(buf.as_ref(), &[0x00, 0x81, 0x01, 0xAC, 0x02]);
    }

    #[test]
    fn len_matches_encoding() {
        for value in [0, 1, 127, 128, 16_383, 16_384, 0x7FFF_FFFF, u32::MAX] {
            let mut buf = BytesMut::new();
            let written = encode_varint(value, &mut buf);
            assert_eq!(written, varint_len(value), "value {value}");
            assert_eq!(buf.len(), written);
        }
    }
}
