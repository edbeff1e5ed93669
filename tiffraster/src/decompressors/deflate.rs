// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use log::debug;

use super::huffman::HuffmanTree;
use super::{CodecError, Decompressor, Result};
use crate::bits::{BEu32, LEu16};
use crate::pumps::{BitOrder, BitPump};

const LENGTH_BASE: [u16; 29] = [
  3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131, 163, 195, 227, 258,
];
const LENGTH_EXTRA: [u8; 29] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0];
const DIST_BASE: [u16; 30] = [
  1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537, 2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DIST_EXTRA: [u8; 30] = [0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13, 13];
const CODE_LENGTH_ORDER: [usize; 19] = [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];

const END_OF_BLOCK: u16 = 256;

/// Adler-32 checksum as used by the zlib trailer
pub fn adler32(data: &[u8]) -> u32 {
  const MOD: u32 = 65521;
  let mut a: u32 = 1;
  let mut b: u32 = 0;
  // 5552 is the largest block that cannot overflow b before the reduction
  for chunk in data.chunks(5552) {
    for &byte in chunk {
      a += byte as u32;
      b += a;
    }
    a %= MOD;
    b %= MOD;
  }
  (b << 16) | a
}

/// zlib wrapped deflate decoder
#[derive(Debug, Clone, Copy)]
pub struct DeflateDecompressor {
  verify_checksum: bool,
  limit: usize,
}

impl DeflateDecompressor {
  pub fn new(verify_checksum: bool) -> Self {
    Self {
      verify_checksum,
      limit: usize::MAX,
    }
  }

  /// Stop inflating once more than `limit` bytes are produced.
  ///
  /// The checksum of a stream cut this way is not verified.
  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = limit;
    self
  }
}

impl Decompressor for DeflateDecompressor {
  fn decompress(&self, src: &[u8]) -> Result<Vec<u8>> {
    if src.len() < 2 {
      return Err(CodecError::Truncated);
    }
    let (cmf, flg) = (src[0], src[1]);
    if cmf & 0x0F != 8 || cmf >> 4 > 7 {
      return Err(CodecError::Corrupt(format!("Invalid zlib header {:02x}{:02x}", cmf, flg)));
    }
    if (cmf as u16 * 256 + flg as u16) % 31 != 0 {
      return Err(CodecError::Corrupt("zlib header check failed".to_string()));
    }
    if flg & 0x20 != 0 {
      return Err(CodecError::Corrupt("zlib preset dictionaries are not supported".to_string()));
    }

    let mut pump = BitPump::new(&src[2..], BitOrder::Lsb);
    let (mut out, complete) = inflate(&mut pump, self.limit)?;
    if !complete {
      debug!("Deflate data exceeds the unit size of {} bytes, cutting", self.limit);
      out.truncate(self.limit);
      return Ok(out);
    }

    if self.verify_checksum {
      pump.align_to_byte();
      let pos = 2 + pump.byte_pos();
      if pos + 4 > src.len() {
        return Err(CodecError::Truncated);
      }
      let expected = BEu32(src, pos);
      let actual = adler32(&out);
      if expected != actual {
        return Err(CodecError::Checksum { expected, actual });
      }
    }
    Ok(out)
  }
}

struct Tables {
  litlen: HuffmanTree,
  dist: HuffmanTree,
}

impl Tables {
  fn fixed() -> Result<Self> {
    let mut lengths = [0_u8; 288];
    lengths[..144].fill(8);
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths[280..].fill(8);
    Ok(Self {
      litlen: HuffmanTree::from_lengths(&lengths)?,
      dist: HuffmanTree::from_lengths(&[5; 30])?,
    })
  }

  fn dynamic(pump: &mut BitPump) -> Result<Self> {
    let hlit = bits(pump, 5)? as usize + 257;
    let hdist = bits(pump, 5)? as usize + 1;
    let hclen = bits(pump, 4)? as usize + 4;

    let mut cl_lengths = [0_u8; 19];
    for &idx in CODE_LENGTH_ORDER.iter().take(hclen) {
      cl_lengths[idx] = bits(pump, 3)? as u8;
    }
    let cl_tree = HuffmanTree::from_lengths(&cl_lengths)?;

    let total = hlit + hdist;
    let mut lengths = Vec::with_capacity(total);
    while lengths.len() < total {
      let (value, repeat) = match cl_tree.decode(pump)? {
        sym @ 0..=15 => (sym as u8, 1),
        16 => {
          let prev = *lengths.last().ok_or_else(|| CodecError::Corrupt("Length repeat without previous length".to_string()))?;
          (prev, 3 + bits(pump, 2)? as usize)
        }
        17 => (0, 3 + bits(pump, 3)? as usize),
        18 => (0, 11 + bits(pump, 7)? as usize),
        sym => return Err(CodecError::Corrupt(format!("Invalid code length symbol {}", sym))),
      };
      if lengths.len() + repeat > total {
        return Err(CodecError::Corrupt("Code lengths overrun the table".to_string()));
      }
      lengths.resize(lengths.len() + repeat, value);
    }
    if lengths[END_OF_BLOCK as usize] == 0 {
      return Err(CodecError::Corrupt("Missing end of block code".to_string()));
    }

    Ok(Self {
      litlen: HuffmanTree::from_lengths(&lengths[..hlit])?,
      dist: HuffmanTree::from_lengths(&lengths[hlit..])?,
    })
  }
}

fn bits(pump: &mut BitPump, n: u8) -> Result<u32> {
  pump.get_bits(n as u32).ok_or(CodecError::Truncated)
}

/// Decode deflate blocks until the final one is done or the output grows
/// past `limit`. The flag tells whether the final block was reached.
fn inflate(pump: &mut BitPump, limit: usize) -> Result<(Vec<u8>, bool)> {
  let mut out: Vec<u8> = Vec::new();
  loop {
    let last = bits(pump, 1)? == 1;
    let btype = bits(pump, 2)?;
    debug!("Deflate block type {}, final: {}", btype, last);
    match btype {
      0 => stored_block(pump, &mut out)?,
      1 => compressed_block(pump, &mut out, &Tables::fixed()?, limit)?,
      2 => {
        let tables = Tables::dynamic(pump)?;
        compressed_block(pump, &mut out, &tables, limit)?;
      }
      _ => return Err(CodecError::Corrupt("Reserved deflate block type".to_string())),
    }
    if out.len() > limit {
      return Ok((out, false));
    }
    if last {
      return Ok((out, true));
    }
  }
}

fn stored_block(pump: &mut BitPump, out: &mut Vec<u8>) -> Result<()> {
  pump.align_to_byte();
  let buf = pump.buffer();
  let pos = pump.byte_pos();
  if pos + 4 > buf.len() {
    return Err(CodecError::Truncated);
  }
  let len = LEu16(buf, pos);
  let nlen = LEu16(buf, pos + 2);
  if len != !nlen {
    return Err(CodecError::Corrupt(format!("Stored block length {} does not match complement {}", len, nlen)));
  }
  let data = buf.get(pos + 4..pos + 4 + len as usize).ok_or(CodecError::Truncated)?;
  out.try_reserve(data.len())?;
  out.extend_from_slice(data);
  pump.skip_bytes(4 + len as usize);
  Ok(())
}

fn compressed_block(pump: &mut BitPump, out: &mut Vec<u8>, tables: &Tables, limit: usize) -> Result<()> {
  loop {
    if out.len() > limit {
      return Ok(());
    }
    match tables.litlen.decode(pump)? {
      sym @ 0..=255 => {
        out.try_reserve(1)?;
        out.push(sym as u8);
      }
      END_OF_BLOCK => return Ok(()),
      sym @ 257..=285 => {
        let idx = (sym - 257) as usize;
        let length = LENGTH_BASE[idx] as usize + bits(pump, LENGTH_EXTRA[idx])? as usize;
        let dsym = tables.dist.decode(pump)? as usize;
        if dsym >= DIST_BASE.len() {
          return Err(CodecError::Corrupt(format!("Invalid distance symbol {}", dsym)));
        }
        let distance = DIST_BASE[dsym] as usize + bits(pump, DIST_EXTRA[dsym])? as usize;
        if distance > out.len() {
          return Err(CodecError::Corrupt(format!("Back reference distance {} exceeds output length {}", distance, out.len())));
        }
        out.try_reserve(length)?;
        let start = out.len() - distance;
        // Source and destination may overlap, copy byte by byte
        for i in 0..length {
          let b = out[start + i];
          out.push(b);
        }
      }
      sym => return Err(CodecError::Corrupt(format!("Invalid literal/length symbol {}", sym))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn zlib(data: &[u8]) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut encoder = libflate::zlib::Encoder::new(Vec::new())?;
    encoder.write_all(data)?;
    Ok(encoder.finish().into_result()?)
  }

  #[test]
  fn adler_known_value() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
    assert_eq!(adler32(&[]), 1);
    Ok(())
  }

  #[test]
  fn stored_block_stream() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut src = vec![0x78, 0x01, 0x01, 0x03, 0x00, 0xFC, 0xFF, b'a', b'b', b'c'];
    src.extend_from_slice(&adler32(b"abc").to_be_bytes());
    assert_eq!(DeflateDecompressor::new(true).decompress(&src)?, b"abc".to_vec());
    Ok(())
  }

  #[test]
  fn libflate_cross_check() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let data: Vec<u8> = (0..50000_u32).map(|i| ((i % 97) as u8).wrapping_mul((i / 1000) as u8)).collect();
    let src = zlib(&data)?;
    assert_eq!(DeflateDecompressor::new(true).decompress(&src)?, data);
    Ok(())
  }

  #[test]
  fn checksum_policy() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut src = zlib(b"checksum me please")?;
    let n = src.len();
    src[n - 1] ^= 0xFF;
    assert!(matches!(DeflateDecompressor::new(true).decompress(&src), Err(CodecError::Checksum { .. })));
    assert_eq!(DeflateDecompressor::new(false).decompress(&src)?, b"checksum me please".to_vec());
    Ok(())
  }

  #[test]
  fn bad_header_and_truncation() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert!(matches!(DeflateDecompressor::new(true).decompress(&[0x78, 0x02]), Err(CodecError::Corrupt(_))));
    let src = zlib(&[7; 1000])?;
    assert!(DeflateDecompressor::new(true).decompress(&src[..src.len() / 2]).is_err());
    Ok(())
  }

  #[test]
  fn fixed_block_back_reference() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    // Final fixed block: literal 'a', length 3 at distance 1, end of block
    let mut src = vec![0x78, 0x01, 0x4B, 0x04, 0x02, 0x00];
    src.extend_from_slice(&adler32(b"aaaa").to_be_bytes());
    assert_eq!(DeflateDecompressor::new(true).decompress(&src)?, b"aaaa".to_vec());
    Ok(())
  }

  #[test]
  fn limit_skips_checksum() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut src = zlib(&[3; 5000])?;
    let n = src.len();
    src[n - 1] ^= 0xFF;
    assert_eq!(DeflateDecompressor::new(true).with_limit(100).decompress(&src)?, vec![3; 100]);
    assert!(matches!(DeflateDecompressor::new(true).with_limit(5000).decompress(&src), Err(CodecError::Checksum { .. })));
    Ok(())
  }
}
