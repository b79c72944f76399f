//! maXTouch 24-bit CRC
//!
//! Used for the info block checksum and the configuration checksum. The
//! device processes data two bytes at a time; an odd trailing byte is
//! paired with zero.

const CRC24_POLY: u32 = 0x0080_001B;

fn crc24_step(crc: u32, first: u8, second: u8) -> u32 {
    let data_word = (u32::from(second) << 8) | u32::from(first);
    let mut result = (crc << 1) ^ data_word;

    if result & 0x0100_0000 != 0 {
        result ^= CRC24_POLY;
    }

    result
}

/// Calculate the CRC over `data`
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = 0;
    let mut pairs = data.chunks_exact(2);
    for pair in &mut pairs {
        crc = crc24_step(crc, pair[0], pair[1]);
    }
    if let [last] = pairs.remainder() {
        crc = crc24_step(crc, *last, 0);
    }

    crc & 0x00FF_FFFF
}

/// Decode a little-endian 24-bit value
pub fn read_crc24(bytes: &[u8; 3]) -> u32 {
    u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16)
}
