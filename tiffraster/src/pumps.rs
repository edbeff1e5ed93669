// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use crate::decompressors::CodecError;

/// Order in which the bits of a byte are consumed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BitOrder {
  /// Bit 7 first, codes are composed most significant bit first
  Msb,
  /// Bit 0 first, codes are composed least significant bit first
  Lsb,
}

impl BitOrder {
  #[inline(always)]
  fn first_mask(self) -> u8 {
    match self {
      Self::Msb => 0x80,
      Self::Lsb => 0x01,
    }
  }
}

/// Bit granular cursor over an in-memory buffer.
///
/// The pump is `Copy`, a decoder can take a snapshot to look ahead
/// and restore it if the bits turn out not to match.
#[derive(Debug, Copy, Clone)]
pub struct BitPump<'a> {
  buffer: &'a [u8],
  pos: usize,
  mask: u8,
  order: BitOrder,
}

impl<'a> BitPump<'a> {
  pub fn new(src: &'a [u8], order: BitOrder) -> BitPump<'a> {
    BitPump {
      buffer: src,
      pos: 0,
      mask: order.first_mask(),
      order,
    }
  }

  /// Current byte position, a partially consumed byte counts as consumed.
  pub fn byte_pos(&self) -> usize {
    if self.mask == self.order.first_mask() { self.pos } else { self.pos + 1 }
  }

  pub fn is_empty(&self) -> bool {
    self.pos >= self.buffer.len()
  }

  pub fn buffer(&self) -> &'a [u8] {
    self.buffer
  }

  /// Read a single bit, `None` once the buffer is exhausted.
  #[inline(always)]
  pub fn get_bit(&mut self) -> Option<u32> {
    let byte = *self.buffer.get(self.pos)?;
    let bit = if byte & self.mask != 0 { 1 } else { 0 };
    self.advance();
    Some(bit)
  }

  #[inline(always)]
  fn advance(&mut self) {
    match self.order {
      BitOrder::Msb => {
        self.mask >>= 1;
        if self.mask == 0 {
          self.mask = 0x80;
          self.pos += 1;
        }
      }
      BitOrder::Lsb => {
        if self.mask == 0x80 {
          self.mask = 0x01;
          self.pos += 1;
        } else {
          self.mask <<= 1;
        }
      }
    }
  }

  /// Compose `num` bits (at most 32) into an integer.
  ///
  /// With MSB order the first bit read is the most significant one of the
  /// result, with LSB order it is the least significant one.
  pub fn get_bits(&mut self, num: u32) -> Option<u32> {
    debug_assert!(num <= 32);
    let mut val: u32 = 0;
    match self.order {
      BitOrder::Msb => {
        for _ in 0..num {
          val = (val << 1) | self.get_bit()?;
        }
      }
      BitOrder::Lsb => {
        for i in 0..num {
          val |= self.get_bit()? << i;
        }
      }
    }
    Some(val)
  }

  /// Discard the remaining bits of a partially consumed byte.
  pub fn align_to_byte(&mut self) {
    if self.mask != self.order.first_mask() {
      self.mask = self.order.first_mask();
      self.pos += 1;
    }
  }

  /// Skip whole bytes, only valid when aligned.
  pub fn skip_bytes(&mut self, count: usize) {
    self.align_to_byte();
    self.pos = self.pos.saturating_add(count);
  }
}

/// MSB first bit writer with a fixed capacity.
#[derive(Debug)]
pub struct BitWriter {
  buffer: Vec<u8>,
  pos: usize,
  mask: u8,
}

impl BitWriter {
  /// Create a writer over a zeroed buffer.
  pub fn new(buffer: Vec<u8>) -> Self {
    Self { buffer, pos: 0, mask: 0x80 }
  }

  pub fn put_bit(&mut self, bit: u32) -> Result<(), CodecError> {
    let byte = self.buffer.get_mut(self.pos).ok_or(CodecError::Overflow)?;
    if bit != 0 {
      *byte |= self.mask;
    } else {
      *byte &= !self.mask;
    }
    self.mask >>= 1;
    if self.mask == 0 {
      self.mask = 0x80;
      self.pos += 1;
    }
    Ok(())
  }

  pub fn put_run(&mut self, bit: u32, count: usize) -> Result<(), CodecError> {
    for _ in 0..count {
      self.put_bit(bit)?;
    }
    Ok(())
  }

  /// Fill up the current byte with zero bits.
  pub fn pad_to_byte(&mut self) -> Result<(), CodecError> {
    while self.mask != 0x80 {
      self.put_bit(0)?;
    }
    Ok(())
  }

  pub fn bytes_written(&self) -> usize {
    self.pos
  }

  pub fn into_inner(self) -> Vec<u8> {
    self.buffer
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn msb_get_bits() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let buf = [0b1011_0001, 0b0100_0000];
    let mut pump = BitPump::new(&buf, BitOrder::Msb);
    assert_eq!(pump.get_bits(3), Some(0b101));
    assert_eq!(pump.get_bits(7), Some(0b1_0001_01));
    assert_eq!(pump.get_bits(6), Some(0));
    assert_eq!(pump.get_bit(), None);
    Ok(())
  }

  #[test]
  fn lsb_get_bits() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let buf = [0b1011_0001, 0b0000_0011];
    let mut pump = BitPump::new(&buf, BitOrder::Lsb);
    assert_eq!(pump.get_bit(), Some(1));
    assert_eq!(pump.get_bits(3), Some(0b000));
    // remaining bits of byte 0 are 1,1,0,1 -> value 0b1011
    assert_eq!(pump.get_bits(4), Some(0b1011));
    assert_eq!(pump.get_bits(2), Some(0b11));
    Ok(())
  }

  #[test]
  fn align_discards_partial_byte() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let buf = [0xFF, 0x0F];
    let mut pump = BitPump::new(&buf, BitOrder::Msb);
    pump.get_bits(2);
    pump.align_to_byte();
    assert_eq!(pump.byte_pos(), 1);
    assert_eq!(pump.get_bits(8), Some(0x0F));
    // already aligned, no-op
    pump.align_to_byte();
    assert!(pump.is_empty());
    Ok(())
  }

  #[test]
  fn truncated_get_bits() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let buf = [0xAA];
    let mut pump = BitPump::new(&buf, BitOrder::Msb);
    assert_eq!(pump.get_bits(12), None);
    Ok(())
  }

  #[test]
  fn writer_overflow() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut writer = BitWriter::new(vec![0; 1]);
    writer.put_run(1, 3)?;
    writer.pad_to_byte()?;
    assert_eq!(writer.bytes_written(), 1);
    assert!(matches!(writer.put_bit(1), Err(CodecError::Overflow)));
    assert_eq!(writer.into_inner(), vec![0b1110_0000]);
    Ok(())
  }
}
