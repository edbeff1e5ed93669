// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use super::ieee754;
use crate::bits::{clamp_f64_u8, scale_to_u8};
use crate::formats::tiff::SampleFormat;
use crate::header::TiffHeader;
use crate::pumps::{BitOrder, BitPump};

/// Sequential reader for the samples of a decompressed unit.
///
/// When every involved channel is a whole number of bytes, samples are
/// taken byte wise and rows follow each other without padding. Otherwise
/// samples are unpacked MSB first and each row starts on a byte boundary.
pub struct SampleReader<'a> {
  header: &'a TiffHeader,
  data: &'a [u8],
  pos: usize,
  pump: BitPump<'a>,
  byte_path: bool,
}

impl<'a> SampleReader<'a> {
  pub fn new(header: &'a TiffHeader, data: &'a [u8], byte_path: bool) -> Self {
    Self {
      header,
      data,
      pos: 0,
      pump: BitPump::new(data, BitOrder::Msb),
      byte_path,
    }
  }

  /// Reader for interleaved pixels
  pub fn chunky(header: &'a TiffHeader, data: &'a [u8]) -> Self {
    Self::new(header, data, header.byte_aligned())
  }

  /// Reader for a single separate plane
  pub fn plane(header: &'a TiffHeader, data: &'a [u8], sample: usize) -> Self {
    Self::new(header, data, header.bits(sample) % 8 == 0)
  }

  /// Finish a row, drops padding bits in the bit path.
  pub fn end_row(&mut self) {
    if !self.byte_path {
      self.pump.align_to_byte();
    }
  }

  fn take_bytes(&mut self, count: usize) -> Option<&'a [u8]> {
    let buf = self.data.get(self.pos..self.pos + count)?;
    self.pos += count;
    Some(buf)
  }

  /// Unpack a sample of `bits` width. Samples wider than 32 bits keep
  /// their leading 32 bits.
  fn take_bits(&mut self, bits: u32) -> Option<u32> {
    if bits <= 32 {
      return self.pump.get_bits(bits);
    }
    let val = self.pump.get_bits(32)?;
    let mut rest = bits - 32;
    while rest > 0 {
      let n = rest.min(32);
      self.pump.get_bits(n)?;
      rest -= n;
    }
    Some(val)
  }

  /// Next sample of channel `sample`, normalised to 0..=255.
  pub fn next_u8(&mut self, sample: usize) -> Option<u8> {
    let bits = self.header.bits(sample);
    if !self.byte_path {
      return self.take_bits(bits).map(|v| scale_to_u8(v, bits.min(32)));
    }
    let bytes = (bits / 8) as usize;
    let buf = self.take_bytes(bytes)?;
    let endian = self.header.endian;
    Some(match self.header.format(sample) {
      SampleFormat::Uint | SampleFormat::Void => endian.msb_of(buf, 0, bytes),
      SampleFormat::Int => endian.msb_of(buf, 0, bytes) ^ 0x80,
      SampleFormat::IEEEFP => match ieee754::read_float(buf, endian) {
        Some(val) => self.scale_float(val, sample),
        None => endian.msb_of(buf, 0, bytes),
      },
    })
  }

  fn scale_float(&self, val: f64, sample: usize) -> u8 {
    let low = self.header.smin(sample);
    let high = self.header.smax(sample);
    if val.is_nan() || high <= low {
      return 0;
    }
    clamp_f64_u8((val - low) * 255.0 / (high - low))
  }

  /// Next sample of channel `sample` as an unsigned integer, used for
  /// palette indices. Non integer samples yield 0.
  pub fn next_index(&mut self, sample: usize) -> Option<u32> {
    let bits = self.header.bits(sample);
    if !self.byte_path {
      return self.take_bits(bits);
    }
    let bytes = (bits / 8) as usize;
    let buf = self.take_bytes(bytes)?;
    Some(match self.header.format(sample) {
      SampleFormat::Uint | SampleFormat::Void if bytes <= 4 => self.header.endian.read_uint(buf, 0, bytes),
      SampleFormat::Uint | SampleFormat::Void => u32::MAX,
      _ => 0,
    })
  }

  /// Step over one sample of channel `sample`.
  pub fn skip(&mut self, sample: usize) -> Option<()> {
    let bits = self.header.bits(sample);
    if self.byte_path {
      self.take_bytes((bits / 8) as usize).map(|_| ())
    } else {
      self.take_bits(bits).map(|_| ())
    }
  }
}
