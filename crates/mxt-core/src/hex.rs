//! Hex text helpers
//!
//! Register data is exchanged as plain hex text: on the command line, in
//! configuration files, in firmware files and on the bridge.

use crate::error::{Error, Result};
use std::fmt::Write as _;

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode a hex string into at most `capacity` bytes
///
/// Supplying fewer bytes than `capacity` is fine; the caller writes only
/// what was decoded. More bytes than `capacity` is `HexOverflow`.
pub fn decode_hex_into(hex: &str, capacity: usize) -> Result<Vec<u8>> {
    let digits = hex.as_bytes();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(Error::HexParse {
            position: digits.len(),
        });
    }

    let given = digits.len() / 2;
    if given > capacity {
        return Err(Error::HexOverflow { given, capacity });
    }

    let mut out = Vec::with_capacity(given);
    for (i, pair) in digits.chunks_exact(2).enumerate() {
        let hi = nibble(pair[0]).ok_or(Error::HexParse { position: i * 2 })?;
        let lo = nibble(pair[1]).ok_or(Error::HexParse { position: i * 2 + 1 })?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

/// Decode hex text that may be split by whitespace
///
/// Each whitespace separated token must hold an even number of digits.
/// Lines starting with `#` are comments.
pub fn decode_hex_text(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in line.split_whitespace() {
            out.extend(decode_hex_into(token, usize::MAX)?);
        }
    }
    Ok(out)
}

/// Encode bytes as upper-case hex with the given separator
pub fn encode_hex(data: &[u8], separator: &str) -> String {
    let mut out = String::with_capacity(data.len() * (2 + separator.len()));
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_exact_and_short() {
        assert_eq!(decode_hex_into("0A0b", 2).unwrap(), vec![0x0A, 0x0B]);
        assert_eq!(decode_hex_into("ff", 8).unwrap(), vec![0xFF]);
    }

    #[test]
    fn test_decode_overflow() {
        assert!(matches!(
            decode_hex_into("000000", 2),
            Err(Error::HexOverflow {
                given: 3,
                capacity: 2
            })
        ));
    }

    #[test]
    fn test_decode_invalid() {
        assert!(matches!(
            decode_hex_into("0g", 4),
            Err(Error::HexParse { position: 1 })
        ));
        assert!(matches!(
            decode_hex_into("123", 4),
            Err(Error::HexParse { .. })
        ));
        assert!(decode_hex_into("", 4).is_err());
    }

    #[test]
    fn test_decode_text() {
        let text = "# header\n01 02\n  0304\n\n";
        assert_eq!(decode_hex_text(text).unwrap(), vec![1, 2, 3, 4]);
        assert!(decode_hex_text("01 2").is_err());
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode_hex(&[0x01, 0xAB], " "), "01 AB");
        assert_eq!(encode_hex(&[0x01, 0xAB], ""), "01AB");
        assert_eq!(encode_hex(&[], " "), "");
    }
}
