use bytes::{BufMut, BytesMut};
use thiserror::Error;

use crate::cursor::StreamCursor;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("VarInt too big")]
    VarIntTooBig,
    #[error("Not enough data")]
    Underflow,
    #[error("Unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),
    #[error("String too long: {0} > {1}")]
    StringTooLong(usize, usize),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Maximum value representable by a 3-byte length-prefix VarInt.
pub const VARINT21_MAX: i32 = (1 << 21) - 1;

/// Read a length-prefix VarInt, capped at 3 bytes (21 bits of magnitude).
/// A fourth continuation bit means the prefix is malformed, not short.
pub fn read_varint21(cur: &mut StreamCursor) -> DecodeResult<i32> {
    let mut result: i32 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = cur.read_u8()?;
        result |= ((byte & 0x7F) as i32) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 21 {
            return Err(DecodeError::VarIntTooBig);
        }
    }
}

/// Write a VarInt in the 3-byte length-prefix encoding.
pub fn write_varint21(buf: &mut BytesMut, mut value: i32) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value = ((value as u32) >> 7) as i32;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Read a big-endian u16.
pub fn read_u16(cur: &mut StreamCursor) -> DecodeResult<u16> {
    let bytes = cur.read_bytes(2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a big-endian i32.
pub fn read_i32(cur: &mut StreamCursor) -> DecodeResult<i32> {
    let bytes = cur.read_bytes(4)?;
    Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a legacy protocol string (u16 code-unit count, then UTF-16BE).
pub fn read_string(cur: &mut StreamCursor, max_len: usize) -> DecodeResult<String> {
    let len = read_u16(cur)? as usize;
    if len > max_len {
        return Err(DecodeError::StringTooLong(len, max_len));
    }
    let bytes = cur.read_bytes(len * 2)?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

/// Write a legacy protocol string.
pub fn write_string(buf: &mut BytesMut, s: &str) {
    let units: Vec<u16> = s.encode_utf16().collect();
    buf.put_u16(units.len() as u16);
    for unit in units {
        buf.put_u16(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(bytes: &[u8]) -> StreamCursor {
        let mut cur = StreamCursor::new();
        cur.extend(bytes);
        cur
    }

    #[test]
    fn test_varint21_roundtrip() {
        let test_cases = vec![
            (0, vec![0x00]),
            (1, vec![0x01]),
            (127, vec![0x7F]),
            (128, vec![0x80, 0x01]),
            (255, vec![0xFF, 0x01]),
            (25565, vec![0xDD, 0xC7, 0x01]),
            (2097151, vec![0xFF, 0xFF, 0x7F]),
        ];

        for (value, expected_bytes) in test_cases {
            // Test write
            let mut buf = BytesMut::new();
            write_varint21(&mut buf, value);
            assert_eq!(
                buf.to_vec(),
                expected_bytes,
                "write_varint21({}) failed",
                value
            );

            // Test read
            let mut cur = cursor(&expected_bytes);
            let result = read_varint21(&mut cur).unwrap();
            assert_eq!(result, value, "read_varint21 for {} failed", value);
        }
    }

    #[test]
    fn test_varint21_max() {
        let mut buf = BytesMut::new();
        write_varint21(&mut buf, VARINT21_MAX);
        assert_eq!(buf.to_vec(), vec![0xFF, 0xFF, 0x7F]);
        let mut cur = cursor(&buf);
        assert_eq!(read_varint21(&mut cur).unwrap(), VARINT21_MAX);
    }

    #[test]
    fn test_varint21_too_big() {
        let mut cur = cursor(&[0x80, 0x80, 0x80, 0x01]);
        assert_eq!(read_varint21(&mut cur), Err(DecodeError::VarIntTooBig));
    }

    #[test]
    fn test_varint21_underflow() {
        let mut cur = cursor(&[0x80]);
        assert_eq!(read_varint21(&mut cur), Err(DecodeError::Underflow));
    }

    #[test]
    fn test_string_roundtrip() {
        let test_str = "Hello, Notch! §1 ♥";
        let mut buf = BytesMut::new();
        write_string(&mut buf, test_str);
        let mut cur = cursor(&buf);
        let result = read_string(&mut cur, 255).unwrap();
        assert_eq!(result, test_str);
    }

    #[test]
    fn test_string_wire_format() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "AB");
        assert_eq!(buf.to_vec(), vec![0x00, 0x02, 0x00, 0x41, 0x00, 0x42]);
    }

    #[test]
    fn test_string_too_long() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "too many chars");
        let mut cur = cursor(&buf);
        assert_eq!(
            read_string(&mut cur, 4),
            Err(DecodeError::StringTooLong(14, 4))
        );
    }

    #[test]
    fn test_string_underflow() {
        // Length says 4 code units but only one follows.
        let mut cur = cursor(&[0x00, 0x04, 0x00, 0x41]);
        assert_eq!(read_string(&mut cur, 16), Err(DecodeError::Underflow));
    }

    #[test]
    fn test_integer_reads() {
        let mut cur = cursor(&[0x63, 0xDD, 0x00, 0x00, 0x63, 0xDD]);
        assert_eq!(read_u16(&mut cur).unwrap(), 25565);
        assert_eq!(read_i32(&mut cur).unwrap(), 25565);
        assert_eq!(read_u16(&mut cur), Err(DecodeError::Underflow));
    }
}
