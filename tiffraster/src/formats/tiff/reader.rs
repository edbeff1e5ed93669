// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use super::{IFD, Result, TIFF_MAGIC, TiffError};
use crate::bits::Endian;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

/// Reader for the first image of a TIFF file
///
/// Only the root IFD is parsed. The offset of the next IFD is kept
/// in [`IFD::next_ifd()`] but never followed.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericTiffReader {
  root: IFD,
}

impl GenericTiffReader {
  /// Check if buffer looks like a TIFF file
  pub fn is_tiff<T: AsRef<[u8]>>(buffer: T) -> bool {
    let buffer = buffer.as_ref();
    match buffer.get(0..4) {
      Some(head) => match Endian::from_marker([head[0], head[1]]) {
        Some(endian) => endian.read_u16(head, 2) == TIFF_MAGIC,
        None => false,
      },
      None => false,
    }
  }

  /// Construct a TIFF reader from Read capable objects
  ///
  /// The stream is rewound to the start, byte order is detected
  /// from the two marker bytes.
  pub fn new<R: Read + Seek>(file: &mut R) -> Result<Self> {
    file.seek(SeekFrom::Start(0))?;
    let mut marker = [0; 2];
    file.read_exact(&mut marker)?;
    let endian = match Endian::from_marker(marker) {
      Some(endian) => endian,
      None => {
        return Err(TiffError::General(format!("TIFF: don't know marker 0x{:02x}{:02x}", marker[0], marker[1])));
      }
    };
    let mut reader = EndianReader::new(file, endian);
    let magic = reader.read_u16()?;
    if magic != TIFF_MAGIC {
      return Err(TiffError::General(format!("Invalid magic marker for TIFF: {}", magic)));
    }
    let first_ifd = reader.read_u32()?;
    if first_ifd == 0 {
      return Err(TiffError::General("Invalid TIFF header, contains no root IFD".to_string()));
    }

    let root = IFD::new(reader.into_inner(), first_ifd, endian)?;
    Ok(Self { root })
  }

  pub fn root_ifd(&self) -> &IFD {
    &self.root
  }
}

pub trait ReadByteOrder {
  fn read_u8(&mut self) -> std::io::Result<u8>;
  fn read_i8(&mut self) -> std::io::Result<i8>;
  fn read_u16(&mut self) -> std::io::Result<u16>;
  fn read_i16(&mut self) -> std::io::Result<i16>;
  fn read_u32(&mut self) -> std::io::Result<u32>;
  fn read_i32(&mut self) -> std::io::Result<i32>;
  fn read_f32(&mut self) -> std::io::Result<f32>;
  fn read_f64(&mut self) -> std::io::Result<f64>;

  fn read_u8_into(&mut self, dst: &mut [u8]) -> std::io::Result<()>;
  fn read_i8_into(&mut self, dst: &mut [i8]) -> std::io::Result<()>;
  fn read_u16_into(&mut self, dst: &mut [u16]) -> std::io::Result<()>;
  fn read_i16_into(&mut self, dst: &mut [i16]) -> std::io::Result<()>;
  fn read_u32_into(&mut self, dst: &mut [u32]) -> std::io::Result<()>;
  fn read_i32_into(&mut self, dst: &mut [i32]) -> std::io::Result<()>;
  fn read_f32_into(&mut self, dst: &mut [f32]) -> std::io::Result<()>;
  fn read_f64_into(&mut self, dst: &mut [f64]) -> std::io::Result<()>;
}

pub struct EndianReader<'a, R: Read + Seek + 'a> {
  endian: Endian,
  inner: &'a mut R,
}

impl<'a, R: Read + Seek + 'a> EndianReader<'a, R> {
  pub fn new(inner: &'a mut R, endian: Endian) -> Self {
    Self { endian, inner }
  }

  pub fn into_inner(self) -> &'a mut R {
    self.inner
  }

  pub fn endian(&self) -> Endian {
    self.endian
  }

  pub fn position(&mut self) -> Result<u64> {
    Ok(self.inner.stream_position()?)
  }

  pub fn goto(&mut self, offset: u64) -> Result<()> {
    self.inner.seek(SeekFrom::Start(offset))?;
    Ok(())
  }

  /// Total length of the underlying stream, the position is preserved.
  pub fn stream_len(&mut self) -> Result<u64> {
    let pos = self.inner.stream_position()?;
    let len = self.inner.seek(SeekFrom::End(0))?;
    self.inner.seek(SeekFrom::Start(pos))?;
    Ok(len)
  }

  /// Read a NUL terminated string, the terminator is consumed but not returned.
  pub fn read_asciiz(&mut self) -> Result<String> {
    let mut raw = Vec::new();
    loop {
      match self.inner.read_u8()? {
        0 => break,
        c => raw.push(c),
      }
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
  }
}

impl<'a, R: Read + Seek + 'a> ReadByteOrder for EndianReader<'a, R> {
  fn read_u8(&mut self) -> std::io::Result<u8> {
    self.inner.read_u8()
  }

  fn read_i8(&mut self) -> std::io::Result<i8> {
    self.inner.read_i8()
  }

  fn read_u16(&mut self) -> std::io::Result<u16> {
    match self.endian {
      Endian::Little => self.inner.read_u16::<LittleEndian>(),
      Endian::Big => self.inner.read_u16::<BigEndian>(),
    }
  }

  fn read_i16(&mut self) -> std::io::Result<i16> {
    match self.endian {
      Endian::Little => self.inner.read_i16::<LittleEndian>(),
      Endian::Big => self.inner.read_i16::<BigEndian>(),
    }
  }

  fn read_u32(&mut self) -> std::io::Result<u32> {
    match self.endian {
      Endian::Little => self.inner.read_u32::<LittleEndian>(),
      Endian::Big => self.inner.read_u32::<BigEndian>(),
    }
  }

  fn read_i32(&mut self) -> std::io::Result<i32> {
    match self.endian {
      Endian::Little => self.inner.read_i32::<LittleEndian>(),
      Endian::Big => self.inner.read_i32::<BigEndian>(),
    }
  }

  fn read_f32(&mut self) -> std::io::Result<f32> {
    match self.endian {
      Endian::Little => self.inner.read_f32::<LittleEndian>(),
      Endian::Big => self.inner.read_f32::<BigEndian>(),
    }
  }

  fn read_f64(&mut self) -> std::io::Result<f64> {
    match self.endian {
      Endian::Little => self.inner.read_f64::<LittleEndian>(),
      Endian::Big => self.inner.read_f64::<BigEndian>(),
    }
  }

  fn read_u8_into(&mut self, dst: &mut [u8]) -> std::io::Result<()> {
    self.inner.read_exact(dst)
  }

  fn read_i8_into(&mut self, dst: &mut [i8]) -> std::io::Result<()> {
    self.inner.read_i8_into(dst)
  }

  fn read_u16_into(&mut self, dst: &mut [u16]) -> std::io::Result<()> {
    match self.endian {
      Endian::Little => self.inner.read_u16_into::<LittleEndian>(dst),
      Endian::Big => self.inner.read_u16_into::<BigEndian>(dst),
    }
  }

  fn read_i16_into(&mut self, dst: &mut [i16]) -> std::io::Result<()> {
    match self.endian {
      Endian::Little => self.inner.read_i16_into::<LittleEndian>(dst),
      Endian::Big => self.inner.read_i16_into::<BigEndian>(dst),
    }
  }

  fn read_u32_into(&mut self, dst: &mut [u32]) -> std::io::Result<()> {
    match self.endian {
      Endian::Little => self.inner.read_u32_into::<LittleEndian>(dst),
      Endian::Big => self.inner.read_u32_into::<BigEndian>(dst),
    }
  }

  fn read_i32_into(&mut self, dst: &mut [i32]) -> std::io::Result<()> {
    match self.endian {
      Endian::Little => self.inner.read_i32_into::<LittleEndian>(dst),
      Endian::Big => self.inner.read_i32_into::<BigEndian>(dst),
    }
  }

  fn read_f32_into(&mut self, dst: &mut [f32]) -> std::io::Result<()> {
    match self.endian {
      Endian::Little => self.inner.read_f32_into::<LittleEndian>(dst),
      Endian::Big => self.inner.read_f32_into::<BigEndian>(dst),
    }
  }

  fn read_f64_into(&mut self, dst: &mut [f64]) -> std::io::Result<()> {
    match self.endian {
      Endian::Little => self.inner.read_f64_into::<LittleEndian>(dst),
      Endian::Big => self.inner.read_f64_into::<BigEndian>(dst),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn detect_byte_order() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert!(GenericTiffReader::is_tiff(b"II\x2a\x00\x08\x00\x00\x00"));
    assert!(GenericTiffReader::is_tiff(b"MM\x00\x2a\x00\x00\x00\x08"));
    // A second byte equal to itself is not enough, the first one must be 'M'
    assert!(!GenericTiffReader::is_tiff(b"XX\x00\x2a\x00\x00\x00\x08"));
    assert!(!GenericTiffReader::is_tiff(b"MM"));
    Ok(())
  }

  #[test]
  fn reject_garbage_marker() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut cur = Cursor::new(b"QQ\x00\x2a\x00\x00\x00\x08".to_vec());
    assert!(matches!(GenericTiffReader::new(&mut cur), Err(TiffError::General(_))));
    Ok(())
  }

  #[test]
  fn reject_missing_root() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut cur = Cursor::new(b"II\x2a\x00\x00\x00\x00\x00".to_vec());
    assert!(matches!(GenericTiffReader::new(&mut cur), Err(TiffError::General(_))));
    Ok(())
  }

  #[test]
  fn truncated_header_is_eof() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut cur = Cursor::new(b"MM\x00".to_vec());
    match GenericTiffReader::new(&mut cur) {
      Err(TiffError::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof),
      other => panic!("unexpected result: {:?}", other),
    }
    Ok(())
  }

  #[test]
  fn endian_reader_values() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut cur = Cursor::new(b"\x12\x34\xff\xfeabc\x00".to_vec());
    let mut reader = EndianReader::new(&mut cur, Endian::Big);
    assert_eq!(reader.read_u16()?, 0x1234);
    assert_eq!(reader.read_i16()?, -2);
    assert_eq!(reader.read_asciiz()?, "abc");
    assert_eq!(reader.stream_len()?, 8);
    assert_eq!(reader.position()?, 8);
    assert!(reader.read_u8().is_err());
    Ok(())
  }
}
