// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

use std::collections::TryReserveError;

use log::debug;
use thiserror::Error;

use crate::formats::tiff::CompressionMethod;
use crate::pumps::BitOrder;

pub mod ccitt;
pub mod ccitt_tables;
pub mod deflate;
pub mod huffman;
pub mod lzw;
pub mod packbits;

pub use ccitt::{CcittDecompressor, FaxMode};
pub use deflate::DeflateDecompressor;
pub use lzw::LzwDecompressor;
pub use packbits::PackBitsDecompressor;

/// Error variants for the codecs
#[derive(Debug, Error)]
pub enum CodecError {
  #[error("Compressed data ends prematurely")]
  Truncated,

  #[error("Corrupt compressed data: {}", _0)]
  Corrupt(String),

  #[error("Checksum mismatch, expected {expected:#010x}, got {actual:#010x}")]
  Checksum { expected: u32, actual: u32 },

  /// Decoded data does not fit into the output buffer
  #[error("Output buffer overflow")]
  Overflow,

  #[error("Unsupported compression method {}", _0)]
  Unsupported(u16),

  #[error("Out of memory in decompressor")]
  OutOfMemory,
}

impl From<TryReserveError> for CodecError {
  fn from(_: TryReserveError) -> Self {
    Self::OutOfMemory
  }
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Trait for decompressors turning one strip or tile into raw sample bytes.
pub trait Decompressor: Send + Sync {
  /// Decompress the complete unit in `src`.
  fn decompress(&self, src: &[u8]) -> Result<Vec<u8>>;
}

/// Everything a codec needs to know about the unit it decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecParams {
  pub compression: u16,
  /// Unit width in pixels
  pub width: usize,
  /// Unit height in rows
  pub height: usize,
  pub t4_options: u32,
  pub fill_order: u16,
  pub verify_checksum: bool,
  /// Bytes the unit can possibly hold, decoders stop once past it
  pub max_output: usize,
}

/// Decompress a single unit according to `params.compression`.
///
/// Uncompressed data is handed back without a copy.
pub fn decompress(src: Vec<u8>, params: &CodecParams) -> Result<Vec<u8>> {
  let method = CompressionMethod::from_id(params.compression).ok_or(CodecError::Unsupported(params.compression))?;
  debug!("Decompress {} bytes with {:?}", src.len(), method);
  let fax_order = if params.fill_order == 2 { BitOrder::Lsb } else { BitOrder::Msb };
  match method {
    CompressionMethod::None => Ok(src),
    CompressionMethod::PackBits => PackBitsDecompressor::new().decompress(&src),
    CompressionMethod::LZW => LzwDecompressor::new().with_limit(params.max_output).decompress(&src),
    CompressionMethod::Deflate | CompressionMethod::OldDeflate => DeflateDecompressor::new(params.verify_checksum)
      .with_limit(params.max_output)
      .decompress(&src),
    CompressionMethod::Huffman => CcittDecompressor::new(FaxMode::ModifiedHuffman, params.width, params.height, params.t4_options, fax_order).decompress(&src),
    CompressionMethod::Fax3 => CcittDecompressor::new(FaxMode::Group3, params.width, params.height, params.t4_options, fax_order).decompress(&src),
    CompressionMethod::Fax4 => CcittDecompressor::new(FaxMode::Group4, params.width, params.height, params.t4_options, fax_order).decompress(&src),
    CompressionMethod::JPEG | CompressionMethod::ModernJPEG => Err(CodecError::Unsupported(params.compression)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn params(compression: u16) -> CodecParams {
    CodecParams {
      compression,
      width: 8,
      height: 1,
      t4_options: 0,
      fill_order: 1,
      verify_checksum: true,
      max_output: 8,
    }
  }

  #[test]
  fn store_passes_through() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert_eq!(decompress(vec![1, 2, 3], &params(1))?, vec![1, 2, 3]);
    Ok(())
  }

  #[test]
  fn unsupported_methods() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    for id in [6, 7, 34661, 34712, 32809, 32908, 32909, 34676, 34677, 32766, 32895, 32898, 0, 9] {
      assert!(matches!(decompress(vec![0; 4], &params(id)), Err(CodecError::Unsupported(x)) if x == id));
    }
    Ok(())
  }

  #[test]
  fn dispatch_packbits() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert_eq!(decompress(vec![0xFE, 0xAA, 0x01, 1, 2], &params(32773))?, vec![0xAA, 0xAA, 0xAA, 1, 2]);
    Ok(())
  }

  #[test]
  fn output_is_capped_at_unit_size() -> std::result::Result<(), Box<dyn std::error::Error>> {
    use std::io::Write;
    crate::init_test_logger();
    let data = vec![0_u8; 100_000];
    let mut encoder = libflate::zlib::Encoder::new(Vec::new())?;
    encoder.write_all(&data)?;
    let deflated = encoder.finish().into_result()?;
    assert_eq!(decompress(deflated, &params(8))?, vec![0; 8]);

    let lzw = weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8).encode(&data)?;
    assert_eq!(decompress(lzw, &params(5))?, vec![0; 8]);
    Ok(())
  }
}
