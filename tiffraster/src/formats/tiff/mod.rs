// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use thiserror::Error;

pub mod entry;
pub mod ifd;
pub mod reader;
pub mod value;

pub use entry::Entry;
pub use ifd::IFD;
pub use reader::GenericTiffReader;
pub use value::{Rational, SRational, TiffAscii, Value};

pub(crate) const TIFF_MAGIC: u16 = 42;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompressionMethod {
  None = 1,
  Huffman = 2,
  Fax3 = 3,
  Fax4 = 4,
  LZW = 5,
  JPEG = 6,
  // "Extended JPEG" or "new JPEG" style
  ModernJPEG = 7,
  Deflate = 8,
  OldDeflate = 0x80B2,
  PackBits = 0x8005,
}

impl CompressionMethod {
  pub fn from_id(id: u16) -> Option<Self> {
    Some(match id {
      1 => Self::None,
      2 => Self::Huffman,
      3 => Self::Fax3,
      4 => Self::Fax4,
      5 => Self::LZW,
      6 => Self::JPEG,
      7 => Self::ModernJPEG,
      8 => Self::Deflate,
      0x80B2 => Self::OldDeflate,
      0x8005 => Self::PackBits,
      _ => return None,
    })
  }

  /// Fax codecs emit bilevel rows already normalised to white = 1.
  pub fn is_fax(self) -> bool {
    matches!(self, Self::Huffman | Self::Fax3 | Self::Fax4)
  }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PhotometricInterpretation {
  WhiteIsZero = 0,
  BlackIsZero = 1,
  RGB = 2,
  RGBPalette = 3,
  TransparencyMask = 4,
  CMYK = 5,
  YCbCr = 6,
  CIELab = 8,
}

impl PhotometricInterpretation {
  pub fn from_id(id: u16) -> Option<Self> {
    Some(match id {
      0 => Self::WhiteIsZero,
      1 => Self::BlackIsZero,
      2 => Self::RGB,
      3 => Self::RGBPalette,
      4 => Self::TransparencyMask,
      5 => Self::CMYK,
      6 => Self::YCbCr,
      8 => Self::CIELab,
      _ => return None,
    })
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlanarConfiguration {
  Chunky = 1,
  Planar = 2,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Predictor {
  None = 1,
  Horizontal = 2,
}

/// Type to represent resolution units
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResolutionUnit {
  None = 1,
  Inch = 2,
  Centimeter = 3,
}

impl ResolutionUnit {
  pub fn from_id(id: u16) -> Option<Self> {
    Some(match id {
      1 => Self::None,
      2 => Self::Inch,
      3 => Self::Centimeter,
      _ => return None,
    })
  }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SampleFormat {
  Uint = 1,
  Int = 2,
  IEEEFP = 3,
  Void = 4,
}

impl SampleFormat {
  pub fn from_id(id: u16) -> Option<Self> {
    Some(match id {
      1 => Self::Uint,
      2 => Self::Int,
      3 => Self::IEEEFP,
      4 => Self::Void,
      _ => return None,
    })
  }
}

/// Error variants for the container parser
#[derive(Debug, Error)]
pub enum TiffError {
  /// Overflow of input, size constraints...
  #[error("Overflow error: {}", _0)]
  Overflow(String),

  #[error("General error: {}", _0)]
  General(String),

  /// A single entry does not match its declared layout
  #[error("Format mismatch: {}", _0)]
  FormatMismatch(String),

  #[error("Out of memory while reading TIFF structure")]
  OutOfMemory,

  /// Error on internal cursor type
  #[error("I/O error: {:?}", _0)]
  Io(#[from] std::io::Error),
}

impl From<std::collections::TryReserveError> for TiffError {
  fn from(_: std::collections::TryReserveError) -> Self {
    Self::OutOfMemory
  }
}

/// Result type for parser results
pub type Result<T> = std::result::Result<T, TiffError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compression_ids() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert_eq!(CompressionMethod::from_id(32773), Some(CompressionMethod::PackBits));
    assert_eq!(CompressionMethod::from_id(32946), Some(CompressionMethod::OldDeflate));
    assert!(CompressionMethod::Fax4.is_fax());
    assert!(!CompressionMethod::LZW.is_fax());
    assert_eq!(CompressionMethod::from_id(34712), None);
    Ok(())
  }
}
