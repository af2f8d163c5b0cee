//! The CRC-16 the firmware verifies decompressed images with.
//!
//! This is CRC-16/CCITT-FALSE: polynomial `0x1021`, initial value `0xffff`,
//! no reflection and no final XOR.

/// The generator polynomial.
pub const POLYNOMIAL: u16 = 0x1021;

/// The initial register value.
pub const INITIAL: u16 = 0xffff;

/// Computes the CRC-16 of `bytes`.
pub fn crc16(bytes: &[u8]) -> u16 {
  bytes.iter().fold(INITIAL, |crc, &byte| update(crc, byte))
}

/// Feeds a single byte into a running CRC.
#[inline]
pub fn update(mut crc: u16, byte: u8) -> u16 {
  crc ^= (byte as u16) << 8;
  for _ in 0..8 {
    crc = if crc & 0x8000 != 0 {
      (crc << 1) ^ POLYNOMIAL
    } else {
      crc << 1
    };
  }
  crc
}
