// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::io::{Read, Seek};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::buffer::try_alloc;
use crate::formats::tiff::{Rational, SRational, TiffAscii, TiffError, Value, reader::ReadByteOrder};

use super::{Result, reader::EndianReader};

const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_SBYTE: u16 = 6;
const TYPE_UNDEFINED: u16 = 7;
const TYPE_SSHORT: u16 = 8;
const TYPE_SLONG: u16 = 9;
const TYPE_SRATIONAL: u16 = 10;
const TYPE_FLOAT: u16 = 11;
const TYPE_DOUBLE: u16 = 12;

/// Size of a directory entry on disk
pub const ENTRY_SIZE: u64 = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
  pub tag: u16,
  pub value: Value,
  /// Absolute file position of the value, inline or out-of-line
  pub offset: u64,
}

impl std::ops::Deref for Entry {
  type Target = Value;

  fn deref(&self) -> &Self::Target {
    &self.value
  }
}

// 0-1-2-3-4-5-6-7-8-9-10-11-12
const DATASHIFTS: [u8; 13] = [0, 0, 0, 1, 2, 3, 0, 0, 1, 2, 3, 2, 3];

impl Entry {
  pub fn value_type(&self) -> u16 {
    self.value.value_type()
  }

  pub fn count(&self) -> u32 {
    self.value.count() as u32
  }

  /// Entry with an element type this parser does not know
  pub fn is_bad(&self) -> bool {
    matches!(self.value, Value::Unknown(..))
  }

  pub fn type_name(&self) -> String {
    self.value.value_type_name()
  }

  /// Parse the entry whose tag id was just consumed from `reader`.
  ///
  /// On return the reader is positioned at the next 12-byte slot, whatever
  /// the outcome for this entry. Out-of-line values are checked against
  /// `stream_len` before anything is allocated.
  pub fn parse<R: Read + Seek>(reader: &mut EndianReader<R>, stream_len: u64, tag: u16) -> Result<Entry> {
    let pos = reader.position()? - 2; // tag is already read
    let result = Self::parse_value(reader, stream_len, tag);
    reader.goto(pos + ENTRY_SIZE)?;
    result
  }

  fn parse_value<R: Read + Seek>(reader: &mut EndianReader<R>, stream_len: u64, tag: u16) -> Result<Entry> {
    let typ = reader.read_u16()?;
    let count = reader.read_u32()?;

    debug!("Tag: {:#x}, Typ: {:#x}, count: {}", tag, typ, count);

    if typ == 0 || typ > TYPE_DOUBLE {
      return Ok(Entry {
        tag,
        value: Value::Unknown(typ, Vec::new()),
        offset: reader.position()?,
      });
    }
    if count == 0 {
      return Err(TiffError::FormatMismatch(format!("Tag {:#x} has no elements", tag)));
    }

    let bytesize: u64 = (count as u64) << DATASHIFTS[typ as usize];
    let offset: u64 = if bytesize <= 4 { reader.position()? } else { reader.read_u32()? as u64 };
    if offset + bytesize > stream_len {
      return Err(TiffError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("Tag {:#x} data at {} with {} bytes exceeds stream length {}", tag, offset, bytesize, stream_len),
      )));
    }
    let count = count as usize;

    reader.goto(offset)?;
    let value = match typ {
      TYPE_BYTE => {
        let mut v = try_alloc(count, 0)?;
        reader.read_u8_into(&mut v)?;
        Value::Byte(v)
      }
      TYPE_ASCII => {
        let mut v = try_alloc(count, 0)?;
        reader.read_u8_into(&mut v)?;
        Value::Ascii(TiffAscii::new_from_raw(&v))
      }
      TYPE_SHORT => {
        let mut v = try_alloc(count, 0)?;
        reader.read_u16_into(&mut v)?;
        Value::Short(v)
      }
      TYPE_LONG => {
        let mut v = try_alloc(count, 0)?;
        reader.read_u32_into(&mut v)?;
        Value::Long(v)
      }
      TYPE_RATIONAL => {
        let mut tmp = try_alloc(count * 2, 0)?; // Rational is 2x u32
        reader.read_u32_into(&mut tmp)?;
        Value::Rational(tmp.chunks_exact(2).map(|p| Rational::new(p[0], p[1])).collect())
      }
      TYPE_SBYTE => {
        let mut v = try_alloc(count, 0)?;
        reader.read_i8_into(&mut v)?;
        Value::SByte(v)
      }
      TYPE_UNDEFINED => {
        let mut v = try_alloc(count, 0)?;
        reader.read_u8_into(&mut v)?;
        Value::Undefined(v)
      }
      TYPE_SSHORT => {
        let mut v = try_alloc(count, 0)?;
        reader.read_i16_into(&mut v)?;
        Value::SShort(v)
      }
      TYPE_SLONG => {
        let mut v = try_alloc(count, 0)?;
        reader.read_i32_into(&mut v)?;
        Value::SLong(v)
      }
      TYPE_SRATIONAL => {
        let mut tmp = try_alloc(count * 2, 0)?; // SRational is 2x i32
        reader.read_i32_into(&mut tmp)?;
        Value::SRational(tmp.chunks_exact(2).map(|p| SRational::new(p[0], p[1])).collect())
      }
      TYPE_FLOAT => {
        let mut v = try_alloc(count, 0.0)?;
        reader.read_f32_into(&mut v)?;
        Value::Float(v)
      }
      TYPE_DOUBLE => {
        let mut v = try_alloc(count, 0.0)?;
        reader.read_f64_into(&mut v)?;
        Value::Double(v)
      }
      x => Value::Unknown(x, Vec::new()),
    };
    Ok(Entry { tag, value, offset })
  }
}
