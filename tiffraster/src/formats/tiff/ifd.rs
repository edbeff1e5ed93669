// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use super::{
  Entry, Result, TiffError,
  entry::ENTRY_SIZE,
  reader::{EndianReader, ReadByteOrder},
};
use crate::{bits::Endian, tags::TiffTag};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
  collections::BTreeMap,
  io::{Read, Seek},
};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IFD {
  pub offset: u32,
  pub next_ifd: u32,
  pub entries: BTreeMap<u16, Entry>,
  pub endian: Endian,
}

impl IFD {
  /// Parse the directory at `offset`.
  ///
  /// Entries with an unknown element type or an empty count are logged and
  /// left out. Reading beyond the end of the stream and allocation failures
  /// abort the whole directory.
  pub fn new<R: Read + Seek>(reader: &mut R, offset: u32, endian: Endian) -> Result<IFD> {
    let mut reader = EndianReader::new(reader, endian);
    let stream_len = reader.stream_len()?;
    reader.goto(offset as u64)?;
    let entry_count = reader.read_u16()?;
    if entry_count == 0 {
      return Err(TiffError::General("TIFF is invalid, IFD must contain at least one entry".to_string()));
    }
    let mut entries = BTreeMap::new();
    let mut next_pos = reader.position()?;
    debug!("Parse {} entries", entry_count);
    for _ in 0..entry_count {
      reader.goto(next_pos)?;
      next_pos += ENTRY_SIZE;
      let tag = reader.read_u16()?;

      match Entry::parse(&mut reader, stream_len, tag) {
        Ok(entry) if entry.is_bad() => {
          log::info!("TIFF tag 0x{:X} has unknown type {}, skipping", tag, entry.value_type());
        }
        Ok(entry) => {
          entries.insert(entry.tag, entry);
        }
        Err(TiffError::FormatMismatch(msg)) => {
          log::info!("Failed to parse TIFF tag 0x{:X}, skipping: {}", tag, msg);
        }
        Err(err) => return Err(err),
      }
    }

    // Some TIFF writers skip the next ifd pointer
    // If we get an I/O error, we fallback to 0, signaling the end of IFD chains.
    reader.goto(next_pos)?;
    let next_ifd = match reader.read_u32() {
      Ok(ptr) => ptr,
      Err(e) => {
        debug!(
          "TIFF IFD reader failed to get next IFD pointer, fallback to 0 and continue. Original error was: {}",
          e
        );
        0
      }
    };

    Ok(IFD {
      offset,
      next_ifd,
      entries,
      endian,
    })
  }

  pub fn entry_count(&self) -> u16 {
    self.entries.len() as u16
  }

  pub fn next_ifd(&self) -> u32 {
    self.next_ifd
  }

  pub fn entries(&self) -> &BTreeMap<u16, Entry> {
    &self.entries
  }

  pub fn get_entry<T: TiffTag>(&self, tag: T) -> Option<&Entry> {
    self.entries.get(&tag.into())
  }

  pub fn has_entry<T: TiffTag>(&self, tag: T) -> bool {
    self.get_entry(tag).is_some()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tags::TiffCommonTag;
  use std::io::Cursor;

  fn le_entry(buf: &mut Vec<u8>, tag: u16, typ: u16, count: u32, value: u32) {
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(&typ.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&value.to_le_bytes());
  }

  #[test]
  fn parse_with_bad_entry() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut buf = vec![3, 0];
    le_entry(&mut buf, 256, 3, 1, 17);
    le_entry(&mut buf, 257, 42, 1, 0); // unknown element type
    le_entry(&mut buf, 259, 3, 1, 1);
    buf.extend_from_slice(&0_u32.to_le_bytes());

    let ifd = IFD::new(&mut Cursor::new(buf), 0, Endian::Little)?;
    assert_eq!(ifd.entry_count(), 2);
    assert_eq!(ifd.get_entry(TiffCommonTag::ImageWidth).and_then(|e| e.get_u32(0)), Some(17));
    assert!(!ifd.has_entry(TiffCommonTag::ImageLength));
    assert!(ifd.has_entry(TiffCommonTag::Compression));
    assert_eq!(ifd.next_ifd(), 0);
    Ok(())
  }

  #[test]
  fn missing_next_pointer() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut buf = vec![1, 0];
    le_entry(&mut buf, 256, 4, 1, 5);
    let ifd = IFD::new(&mut Cursor::new(buf), 0, Endian::Little)?;
    assert_eq!(ifd.next_ifd(), 0);
    Ok(())
  }

  #[test]
  fn empty_directory() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let buf = vec![0, 0, 0, 0, 0, 0];
    assert!(matches!(IFD::new(&mut Cursor::new(buf), 0, Endian::Little), Err(TiffError::General(_))));
    Ok(())
  }

  #[test]
  fn truncated_directory() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut buf = vec![2, 0];
    le_entry(&mut buf, 256, 4, 1, 5);
    assert!(matches!(IFD::new(&mut Cursor::new(buf), 0, Endian::Little), Err(TiffError::Io(_))));
    Ok(())
  }
}
