// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

#[inline(always)]
pub fn clamp_f64_u8(val: f64) -> u8 {
  if val.is_nan() || val <= 0.0 {
    0
  } else if val >= 255.0 {
    255
  } else {
    val as u8
  }
}

/// Rescale a `bits` wide unsigned sample to the 0..=255 range.
#[inline(always)]
pub fn scale_to_u8(val: u32, bits: u32) -> u8 {
  match bits {
    0 => 0,
    8 => val as u8,
    1..=31 => {
      let max = (1_u64 << bits) - 1;
      ((val as u64 * 255) / max) as u8
    }
    _ => (val >> 24) as u8,
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
  Big,
  Little,
}

impl Default for Endian {
  fn default() -> Self {
    Self::Little
  }
}

impl Endian {
  /// Detect the byte order from the two marker bytes at the start of a TIFF stream.
  pub fn from_marker(marker: [u8; 2]) -> Option<Self> {
    match marker {
      [b'I', b'I'] => Some(Self::Little),
      [b'M', b'M'] => Some(Self::Big),
      _ => None,
    }
  }

  #[inline]
  pub fn read_u16(&self, buf: &[u8], offset: usize) -> u16 {
    match *self {
      Self::Big => BigEndian::read_u16(&buf[offset..]),
      Self::Little => LittleEndian::read_u16(&buf[offset..]),
    }
  }

  #[inline]
  pub fn read_u32(&self, buf: &[u8], offset: usize) -> u32 {
    match *self {
      Self::Big => BigEndian::read_u32(&buf[offset..]),
      Self::Little => LittleEndian::read_u32(&buf[offset..]),
    }
  }

  /// Read an unsigned integer of `bytes` width (1..=4).
  #[inline]
  pub fn read_uint(&self, buf: &[u8], offset: usize, bytes: usize) -> u32 {
    match *self {
      Self::Big => BigEndian::read_uint(&buf[offset..], bytes) as u32,
      Self::Little => LittleEndian::read_uint(&buf[offset..], bytes) as u32,
    }
  }

  /// Return the most significant byte of a sample that spans `bytes` bytes.
  #[inline]
  pub fn msb_of(&self, buf: &[u8], offset: usize, bytes: usize) -> u8 {
    match *self {
      Self::Big => buf[offset],
      Self::Little => buf[offset + bytes - 1],
    }
  }
}

#[allow(non_snake_case)]
#[inline]
pub fn LEu16(buf: &[u8], pos: usize) -> u16 {
  LittleEndian::read_u16(&buf[pos..pos + 2])
}

#[allow(non_snake_case)]
#[inline]
pub fn BEu32(buf: &[u8], pos: usize) -> u32 {
  BigEndian::read_u32(&buf[pos..pos + 4])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn marker_detection() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert_eq!(Endian::from_marker(*b"II"), Some(Endian::Little));
    assert_eq!(Endian::from_marker(*b"MM"), Some(Endian::Big));
    // Only the first byte differs from a valid marker, must not be taken as big endian
    assert_eq!(Endian::from_marker(*b"XM"), None);
    assert_eq!(Endian::from_marker(*b"MI"), None);
    Ok(())
  }

  #[test]
  fn rescale_samples() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert_eq!(scale_to_u8(1, 1), 255);
    assert_eq!(scale_to_u8(0, 1), 0);
    assert_eq!(scale_to_u8(15, 4), 255);
    assert_eq!(scale_to_u8(7, 4), 119);
    assert_eq!(scale_to_u8(4095, 12), 255);
    Ok(())
  }

  #[test]
  fn msb_by_endian() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let buf = [0x12, 0x34];
    assert_eq!(Endian::Big.msb_of(&buf, 0, 2), 0x12);
    assert_eq!(Endian::Little.msb_of(&buf, 0, 2), 0x34);
    assert_eq!(Endian::Big.read_uint(&buf, 0, 2), 0x1234);
    assert_eq!(Endian::Little.read_uint(&buf, 0, 2), 0x3412);
    Ok(())
  }
}
