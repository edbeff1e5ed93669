// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use log::debug;

use super::{CodecError, Decompressor, Result};
use crate::buffer::try_with_capacity;
use crate::pumps::{BitOrder, BitPump};

const CLEAR_CODE: u16 = 256;
const END_CODE: u16 = 257;
const FIRST_CODE: u16 = 258;
const MAX_CODES: usize = 4096;
const MIN_WIDTH: u32 = 9;
const MAX_WIDTH: u32 = 12;

#[derive(Debug, Copy, Clone, Default)]
struct Link {
  prefix: u16,
  suffix: u8,
  first: u8,
  len: u16,
}

/// LZW decoder for TIFF strips and tiles.
///
/// Codes are 9 to 12 bits wide. The bit order is taken from the leading
/// clear code: regular TIFF writers pack MSB first and switch widths one
/// code early, old style writers pack LSB first without the early switch.
#[derive(Debug, Clone, Copy)]
pub struct LzwDecompressor {
  limit: usize,
}

impl Default for LzwDecompressor {
  fn default() -> Self {
    Self::new()
  }
}

impl LzwDecompressor {
  pub fn new() -> Self {
    Self { limit: usize::MAX }
  }

  /// Stop decoding once more than `limit` bytes are produced.
  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = limit;
    self
  }

  /// Guess the bit order from the first code of the stream.
  pub fn detect_order(src: &[u8]) -> BitOrder {
    let msb = BitPump::new(src, BitOrder::Msb).get_bits(MIN_WIDTH);
    if msb == Some(CLEAR_CODE as u32) {
      return BitOrder::Msb;
    }
    let lsb = BitPump::new(src, BitOrder::Lsb).get_bits(MIN_WIDTH);
    if lsb == Some(CLEAR_CODE as u32) {
      debug!("LZW stream uses old style LSB bit order");
      return BitOrder::Lsb;
    }
    debug!("LZW stream does not start with a clear code, assuming MSB bit order");
    BitOrder::Msb
  }
}

impl Decompressor for LzwDecompressor {
  fn decompress(&self, src: &[u8]) -> Result<Vec<u8>> {
    let order = Self::detect_order(src);
    let len = Dictionary::new().run(src, order, self.limit, None)?;
    let mut out = try_with_capacity(len)?;
    let written = Dictionary::new().run(src, order, self.limit, Some(&mut out))?;
    if written != len {
      return Err(CodecError::Corrupt(format!("LZW size scan gave {} bytes, decoding gave {}", len, written)));
    }
    if out.len() > self.limit {
      debug!("LZW data exceeds the unit size of {} bytes, cutting", self.limit);
      out.truncate(self.limit);
    }
    Ok(out)
  }
}

struct Dictionary {
  table: Vec<Link>,
  next: u16,
  width: u32,
}

impl Dictionary {
  fn new() -> Self {
    let mut table = vec![Link::default(); MAX_CODES];
    for (i, link) in table.iter_mut().enumerate().take(256) {
      *link = Link {
        prefix: 0,
        suffix: i as u8,
        first: i as u8,
        len: 1,
      };
    }
    Self {
      table,
      next: FIRST_CODE,
      width: MIN_WIDTH,
    }
  }

  fn reset(&mut self) {
    self.next = FIRST_CODE;
    self.width = MIN_WIDTH;
  }

  /// Write the string for `code` to `out`, returning its length.
  fn emit(&self, code: u16, out: Option<&mut Vec<u8>>) -> usize {
    let len = self.table[code as usize].len as usize;
    if let Some(out) = out {
      let start = out.len();
      out.resize(start + len, 0);
      let mut c = code;
      for pos in (start..start + len).rev() {
        let link = self.table[c as usize];
        out[pos] = link.suffix;
        c = link.prefix;
      }
    }
    len
  }

  fn add(&mut self, prefix: u16, suffix: u8, order: BitOrder) {
    if (self.next as usize) < MAX_CODES {
      let p = self.table[prefix as usize];
      self.table[self.next as usize] = Link {
        prefix,
        suffix,
        first: p.first,
        len: p.len.saturating_add(1),
      };
      self.next += 1;
    }
    let switch = match order {
      BitOrder::Msb => (1 << self.width) - 1,
      BitOrder::Lsb => 1 << self.width,
    };
    if self.next as u32 == switch && self.width < MAX_WIDTH {
      self.width += 1;
    }
  }

  /// Decode the stream until its end code or until more than `limit`
  /// bytes are produced. Without `out` only the size is computed.
  fn run(&mut self, src: &[u8], order: BitOrder, limit: usize, mut out: Option<&mut Vec<u8>>) -> Result<usize> {
    let mut pump = BitPump::new(src, order);
    let mut prev: Option<u16> = None;
    let mut total = 0;
    while let Some(code) = pump.get_bits(self.width) {
      if total > limit {
        break;
      }
      let code = code as u16;
      if code == CLEAR_CODE {
        self.reset();
        prev = None;
        continue;
      }
      if code == END_CODE {
        break;
      }
      match prev {
        None => {
          if code > 255 {
            return Err(CodecError::Corrupt(format!("LZW code {} without a preceding clear code", code)));
          }
          total += self.emit(code, out.as_deref_mut());
        }
        Some(p) => {
          let first = if code < self.next {
            total += self.emit(code, out.as_deref_mut());
            self.table[code as usize].first
          } else if code == self.next {
            // KwKwK: the string of the previous code followed by its own first byte
            let first = self.table[p as usize].first;
            total += self.emit(p, out.as_deref_mut());
            if let Some(out) = out.as_deref_mut() {
              out.push(first);
            }
            total += 1;
            first
          } else {
            return Err(CodecError::Corrupt(format!("LZW code {} beyond table size {}", code, self.next)));
          };
          self.add(p, first, order);
        }
      }
      prev = Some(code);
    }
    Ok(total)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Pack codes of the given widths into a byte stream
  fn pack(codes: &[(u16, u32)], order: BitOrder) -> Vec<u8> {
    let mut out = Vec::new();
    let mut acc: u64 = 0;
    let mut nbits = 0;
    for &(code, width) in codes {
      match order {
        BitOrder::Msb => {
          acc = (acc << width) | code as u64;
          nbits += width;
          while nbits >= 8 {
            out.push((acc >> (nbits - 8)) as u8);
            nbits -= 8;
          }
        }
        BitOrder::Lsb => {
          acc |= (code as u64) << nbits;
          nbits += width;
          while nbits >= 8 {
            out.push(acc as u8);
            acc >>= 8;
            nbits -= 8;
          }
        }
      }
    }
    if nbits > 0 {
      match order {
        BitOrder::Msb => out.push((acc << (8 - nbits)) as u8),
        BitOrder::Lsb => out.push(acc as u8),
      }
    }
    out
  }

  #[test]
  fn kwkwk_sequence() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    // "aaaa": a, 258 ("aa", not yet in the table), a
    let src = pack(&[(256, 9), (97, 9), (258, 9), (97, 9), (257, 9)], BitOrder::Msb);
    assert_eq!(LzwDecompressor::new().decompress(&src)?, b"aaaa".to_vec());
    Ok(())
  }

  #[test]
  fn old_style_lsb() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let src = pack(&[(256, 9), (1, 9), (2, 9), (258, 9), (257, 9)], BitOrder::Lsb);
    assert_eq!(LzwDecompressor::detect_order(&src), BitOrder::Lsb);
    assert_eq!(LzwDecompressor::new().decompress(&src)?, vec![1, 2, 1, 2]);
    Ok(())
  }

  #[test]
  fn code_beyond_table() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let src = pack(&[(256, 9), (1, 9), (300, 9)], BitOrder::Msb);
    assert!(matches!(LzwDecompressor::new().decompress(&src), Err(CodecError::Corrupt(_))));
    Ok(())
  }

  #[test]
  fn missing_end_code() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let src = pack(&[(256, 9), (10, 9), (20, 9)], BitOrder::Msb);
    assert_eq!(LzwDecompressor::new().decompress(&src)?, vec![10, 20]);
    Ok(())
  }

  #[test]
  fn weezl_cross_check() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let data: Vec<u8> = (0..20000_u32).map(|i| ((i * 7) % 251) as u8 ^ (i / 300) as u8).collect();
    let encoded = weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8).encode(&data)?;
    assert_eq!(LzwDecompressor::new().decompress(&encoded)?, data);
    Ok(())
  }

  #[test]
  fn clear_code_mid_stream() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    // The second clear code drops 258 ("AB") and restarts at 9 bit codes
    let src = pack(&[(256, 9), (65, 9), (66, 9), (258, 9), (256, 9), (67, 9), (67, 9), (257, 9)], BitOrder::Msb);
    assert_eq!(LzwDecompressor::new().decompress(&src)?, b"ABABCC".to_vec());
    Ok(())
  }

  #[test]
  fn limit_stops_decoding() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let src = pack(&[(256, 9), (65, 9), (66, 9), (258, 9), (67, 9), (257, 9)], BitOrder::Msb);
    assert_eq!(LzwDecompressor::new().with_limit(3).decompress(&src)?, b"ABA".to_vec());
    assert_eq!(LzwDecompressor::new().with_limit(5).decompress(&src)?, b"ABABC".to_vec());
    Ok(())
  }
}
