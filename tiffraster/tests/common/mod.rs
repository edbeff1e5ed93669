// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Cursor, Seek, SeekFrom, Write};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

pub const IMAGE_WIDTH: u16 = 256;
pub const IMAGE_LENGTH: u16 = 257;
pub const BITS_PER_SAMPLE: u16 = 258;
pub const COMPRESSION: u16 = 259;
pub const PHOTOMETRIC: u16 = 262;
pub const FILL_ORDER: u16 = 266;
pub const STRIP_OFFSETS: u16 = 273;
pub const SAMPLES_PER_PIXEL: u16 = 277;
pub const ROWS_PER_STRIP: u16 = 278;
pub const STRIP_BYTE_COUNTS: u16 = 279;
pub const X_RESOLUTION: u16 = 282;
pub const PLANAR_CONFIG: u16 = 284;
pub const T4_OPTIONS: u16 = 292;
pub const PREDICTOR: u16 = 317;
pub const COLOR_MAP: u16 = 320;
pub const TILE_WIDTH: u16 = 322;
pub const TILE_LENGTH: u16 = 323;
pub const TILE_OFFSETS: u16 = 324;
pub const TILE_BYTE_COUNTS: u16 = 325;
pub const EXTRA_SAMPLES: u16 = 338;
pub const SAMPLE_FORMAT: u16 = 339;
pub const SMAX_SAMPLE_VALUE: u16 = 341;
pub const YCBCR_SUBSAMPLING: u16 = 530;

/// Tag payload for the test writer
#[derive(Debug, Clone)]
pub enum Val {
  Byte(Vec<u8>),
  Short(Vec<u16>),
  Long(Vec<u32>),
  Rational(Vec<(u32, u32)>),
  Double(Vec<f64>),
  /// Arbitrary type id, count and payload bytes, for malformed entries
  Raw(u16, u32, Vec<u8>),
}

impl Val {
  fn type_id(&self) -> u16 {
    match self {
      Self::Byte(_) => 1,
      Self::Short(_) => 3,
      Self::Long(_) => 4,
      Self::Rational(_) => 5,
      Self::Double(_) => 12,
      Self::Raw(t, _, _) => *t,
    }
  }

  fn count(&self) -> u32 {
    match self {
      Self::Byte(v) => v.len() as u32,
      Self::Short(v) => v.len() as u32,
      Self::Long(v) => v.len() as u32,
      Self::Rational(v) => v.len() as u32,
      Self::Double(v) => v.len() as u32,
      Self::Raw(_, c, _) => *c,
    }
  }
}

/// Where the pixel units go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
  Strips,
  Tiles,
}

/// Minimal in-memory TIFF writer: header, unit data, out of line values,
/// then a single directory.
pub struct TestTiff {
  pub big_endian: bool,
  entries: BTreeMap<u16, Val>,
  units: Vec<Vec<u8>>,
  kind: UnitKind,
  /// Replaces the byte count of every unit when set
  pub byte_count_override: Option<u32>,
}

impl TestTiff {
  pub fn new(width: u32, height: u32) -> Self {
    let mut tiff = Self {
      big_endian: false,
      entries: BTreeMap::new(),
      units: Vec::new(),
      kind: UnitKind::Strips,
      byte_count_override: None,
    };
    tiff.entries.insert(IMAGE_WIDTH, Val::Long(vec![width]));
    tiff.entries.insert(IMAGE_LENGTH, Val::Long(vec![height]));
    tiff
  }

  pub fn big_endian(mut self) -> Self {
    self.big_endian = true;
    self
  }

  pub fn tag(mut self, tag: u16, val: Val) -> Self {
    self.entries.insert(tag, val);
    self
  }

  pub fn short(self, tag: u16, v: u16) -> Self {
    self.tag(tag, Val::Short(vec![v]))
  }

  pub fn strips(mut self, units: Vec<Vec<u8>>) -> Self {
    self.units = units;
    self.kind = UnitKind::Strips;
    self
  }

  pub fn tiles(mut self, tile_width: u16, tile_height: u16, units: Vec<Vec<u8>>) -> Self {
    self.units = units;
    self.kind = UnitKind::Tiles;
    self.short(TILE_WIDTH, tile_width).short(TILE_LENGTH, tile_height)
  }

  pub fn build(&self) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    self.write(&mut out).expect("writing to memory cannot fail");
    out.into_inner()
  }

  fn write(&self, w: &mut Cursor<Vec<u8>>) -> std::io::Result<()> {
    let mut entries = self.entries.clone();
    if self.big_endian {
      w.write_all(b"MM")?;
    } else {
      w.write_all(b"II")?;
    }
    self.put16(w, 42)?;
    self.put32(w, 0)?;

    let mut offsets = Vec::new();
    let mut counts = Vec::new();
    for unit in &self.units {
      offsets.push(w.position() as u32);
      counts.push(self.byte_count_override.unwrap_or(unit.len() as u32));
      w.write_all(unit)?;
    }
    let (off_tag, count_tag) = match self.kind {
      UnitKind::Strips => (STRIP_OFFSETS, STRIP_BYTE_COUNTS),
      UnitKind::Tiles => (TILE_OFFSETS, TILE_BYTE_COUNTS),
    };
    entries.insert(off_tag, Val::Long(offsets));
    entries.insert(count_tag, Val::Long(counts));

    let mut slots = Vec::new();
    for (&tag, val) in &entries {
      let payload = self.encode(val)?;
      let slot = if payload.len() > 4 {
        if w.position() % 2 == 1 {
          w.write_all(&[0])?;
        }
        let pos = w.position() as u32;
        w.write_all(&payload)?;
        self.encode(&Val::Long(vec![pos]))?
      } else {
        let mut inline = payload;
        inline.resize(4, 0);
        inline
      };
      slots.push((tag, val.type_id(), val.count(), slot));
    }

    if w.position() % 2 == 1 {
      w.write_all(&[0])?;
    }
    let ifd = w.position() as u32;
    self.put16(w, slots.len() as u16)?;
    for (tag, typ, count, slot) in slots {
      self.put16(w, tag)?;
      self.put16(w, typ)?;
      self.put32(w, count)?;
      w.write_all(&slot)?;
    }
    self.put32(w, 0)?;

    w.seek(SeekFrom::Start(4))?;
    self.put32(w, ifd)?;
    Ok(())
  }

  fn encode(&self, val: &Val) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    match val {
      Val::Byte(v) => buf.extend_from_slice(v),
      Val::Short(v) => v.iter().try_for_each(|&x| self.put16(&mut buf, x))?,
      Val::Long(v) => v.iter().try_for_each(|&x| self.put32(&mut buf, x))?,
      Val::Rational(v) => v.iter().try_for_each(|&(n, d)| {
        self.put32(&mut buf, n)?;
        self.put32(&mut buf, d)
      })?,
      Val::Double(v) => v.iter().try_for_each(|&x| {
        if self.big_endian {
          buf.write_f64::<BigEndian>(x)
        } else {
          buf.write_f64::<LittleEndian>(x)
        }
      })?,
      Val::Raw(_, _, bytes) => buf.extend_from_slice(bytes),
    }
    Ok(buf)
  }

  fn put16<W: Write>(&self, w: &mut W, v: u16) -> std::io::Result<()> {
    if self.big_endian { w.write_u16::<BigEndian>(v) } else { w.write_u16::<LittleEndian>(v) }
  }

  fn put32<W: Write>(&self, w: &mut W, v: u32) -> std::io::Result<()> {
    if self.big_endian { w.write_u32::<BigEndian>(v) } else { w.write_u32::<LittleEndian>(v) }
  }
}

/// Uncompressed 8-bit RGB gradient of the given size
pub fn gradient_rgb(width: usize, height: usize) -> Vec<u8> {
  let mut data = Vec::with_capacity(width * height * 3);
  for y in 0..height {
    for x in 0..width {
      data.extend_from_slice(&[(x * 4) as u8, (y * 8) as u8, ((x + y) * 2) as u8]);
    }
  }
  data
}

/// PackBits encoding using literal runs only
pub fn packbits_literal(data: &[u8]) -> Vec<u8> {
  let mut out = Vec::new();
  for chunk in data.chunks(128) {
    out.push((chunk.len() - 1) as u8);
    out.extend_from_slice(chunk);
  }
  out
}
