// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use super::{CodecError, Decompressor, Result};
use crate::buffer::try_with_capacity;

/// Apple PackBits run length decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct PackBitsDecompressor {}

impl PackBitsDecompressor {
  pub fn new() -> Self {
    Self {}
  }

  /// Size of the unpacked data without producing it.
  pub fn unpacked_len(src: &[u8]) -> Result<usize> {
    unpack(src, None)
  }
}

impl Decompressor for PackBitsDecompressor {
  fn decompress(&self, src: &[u8]) -> Result<Vec<u8>> {
    let len = unpack(src, None)?;
    let mut out = try_with_capacity(len)?;
    let written = unpack(src, Some(&mut out))?;
    if written != len || out.len() != len {
      return Err(CodecError::Corrupt(format!("PackBits size scan gave {} bytes, decoding gave {}", len, written)));
    }
    Ok(out)
  }
}

/// Walk the runs of `src`, appending to `out` if given.
///
/// A header `n` in 0..=127 is followed by n+1 literal bytes, -127..=-1
/// by one byte repeated 1-n times, -128 is a no-op.
fn unpack(src: &[u8], mut out: Option<&mut Vec<u8>>) -> Result<usize> {
  let mut pos = 0;
  let mut total: usize = 0;
  while pos < src.len() {
    let header = src[pos] as i8;
    pos += 1;
    match header {
      -128 => {}
      0..=127 => {
        let count = header as usize + 1;
        let literal = src.get(pos..pos + count).ok_or(CodecError::Truncated)?;
        if let Some(out) = out.as_deref_mut() {
          out.extend_from_slice(literal);
        }
        pos += count;
        total += count;
      }
      _ => {
        let count = (1 - header as isize) as usize;
        let value = *src.get(pos).ok_or(CodecError::Truncated)?;
        if let Some(out) = out.as_deref_mut() {
          out.resize(out.len() + count, value);
        }
        pos += 1;
        total += count;
      }
    }
  }
  Ok(total)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn literal_and_runs() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    // Example from the TIFF 6.0 specification
    let src = [
      0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7, 0xAA,
    ];
    let expected = [
      0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
      0xAA, 0xAA, 0xAA,
    ];
    assert_eq!(PackBitsDecompressor::unpacked_len(&src)?, expected.len());
    assert_eq!(PackBitsDecompressor::new().decompress(&src)?, expected);
    Ok(())
  }

  #[test]
  fn noop_and_single_literal() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    // -128 is skipped, header 0 copies exactly one byte
    let src = [0x80, 0x00, 0x11, 0x80];
    assert_eq!(PackBitsDecompressor::new().decompress(&src)?, vec![0x11]);
    Ok(())
  }

  #[test]
  fn truncated() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert!(matches!(PackBitsDecompressor::new().decompress(&[0x05, 1, 2]), Err(CodecError::Truncated)));
    assert!(matches!(PackBitsDecompressor::new().decompress(&[0xF0]), Err(CodecError::Truncated)));
    assert_eq!(PackBitsDecompressor::new().decompress(&[])?, Vec::<u8>::new());
    Ok(())
  }
}
