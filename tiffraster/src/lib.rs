// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

//! Library to decode TIFF images into plain 8-bit rasters.
//! Given a TIFF file using one of the common compression schemes
//! (none, PackBits, LZW, CCITT fax, Deflate) and colour models
//! (grey, palette, RGB, CMYK, YCbCr) you will get a tightly packed
//! pixel buffer without any external image library involved.
//!
//! # Example
//! ```rust,no_run
//! use std::env;
//! use std::fs::File;
//! use std::io::prelude::*;
//! use std::io::BufWriter;
//!
//! fn main() {
//!   let args: Vec<_> = env::args().collect();
//!   if args.len() != 2 {
//!     println!("Usage: {} <file>", args[0]);
//!     std::process::exit(2);
//!   }
//!   let file = &args[1];
//!   let params = tiffraster::DecodeParams {
//!     output: tiffraster::ColorFormat::Rgb,
//!     ..Default::default()
//!   };
//!   let mut input = File::open(file).unwrap();
//!   let image = tiffraster::decode(&mut input, params).unwrap();
//!
//!   // Write out the image as a PPM
//!   let mut f = BufWriter::new(File::create(format!("{}.ppm", file)).unwrap());
//!   let preamble = format!("P6 {} {} {}\n", image.width, image.height, 255).into_bytes();
//!   f.write_all(&preamble).unwrap();
//!   f.write_all(&image.data).unwrap();
//! }
//! ```

#![deny(
    //missing_docs,
    //missing_debug_implementations,
    //missing_copy_implementations,
    //unsafe_code,
    unstable_features,
    //unused_import_braces,
    //unused_qualifications
  )]

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use thiserror::Error;

pub mod bits;
pub mod buffer;
pub mod decompressors;
pub(crate) mod envparams;
pub mod formats;
pub mod header;
pub mod imgop;
pub mod params;
pub mod pumps;
pub mod raster;
pub mod tags;

pub use header::{Layout, TiffHeader};
pub use params::DecodeParams;
pub use raster::{ColorFormat, RasterImage};

use decompressors::CodecError;
use formats::tiff::TiffError;

#[derive(Error, Debug)]
pub enum TiffRasterError {
  /// Structural problem in the container: magic, directory, header consistency
  #[error("Parse error: {}", _0)]
  Parse(String),

  /// An allocation could not be satisfied
  #[error("Out of memory")]
  OutOfMemory,

  #[error("File is unsupported: {}", _0)]
  Unsupported(String),

  #[error("Decompression failed: {}", _0)]
  Codec(CodecError),

  #[error("I/O error: {:?}", _0)]
  Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, TiffRasterError>;

impl TiffRasterError {
  pub fn with_io_error(path: impl AsRef<Path>, error: std::io::Error) -> Self {
    Self::Parse(format!("I/O error on file: {:?}, {}", path.as_ref(), error))
  }
}

impl From<String> for TiffRasterError {
  fn from(str: String) -> Self {
    Self::Parse(str)
  }
}

impl From<TiffError> for TiffRasterError {
  fn from(err: TiffError) -> Self {
    match err {
      TiffError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => Self::Parse(format!("Premature end of stream: {}", io)),
      TiffError::Io(io) => Self::Io(io),
      TiffError::OutOfMemory => Self::OutOfMemory,
      err => Self::Parse(err.to_string()),
    }
  }
}

impl From<std::collections::TryReserveError> for TiffRasterError {
  fn from(_: std::collections::TryReserveError) -> Self {
    Self::OutOfMemory
  }
}

impl From<CodecError> for TiffRasterError {
  fn from(err: CodecError) -> Self {
    match err {
      CodecError::Unsupported(id) => Self::Unsupported(format!("compression method {}", id)),
      CodecError::OutOfMemory => Self::OutOfMemory,
      err => Self::Codec(err),
    }
  }
}

/// Take a readable and seekable source and return a decoded image or an error
///
/// # Example
/// ```rust,ignore
/// let mut file = File::open(path).unwrap();
/// let image = match tiffraster::decode(&mut file, DecodeParams::default()) {
///   Ok(val) => val,
///   Err(e) => ... some appropriate action when the file is unreadable ...
/// };
/// ```
pub fn decode<R: Read + Seek>(reader: &mut R, params: DecodeParams) -> Result<RasterImage> {
  let header = read_header(reader)?;
  raster::load_raster(reader, &header, &params)
}

/// Take a path to a TIFF file and return a decoded image or an error
///
/// Parameters are taken from [`DecodeParams::from_env()`].
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<RasterImage> {
  let path = path.as_ref();
  let file = match File::open(path) {
    Ok(val) => val,
    Err(e) => return Err(TiffRasterError::with_io_error(path, e)),
  };
  let mut buffered = BufReader::new(file);
  decode(&mut buffered, DecodeParams::from_env())
}

/// Parse the container structure and return the reconciled header
/// without touching any pixel data.
pub fn read_header<R: Read + Seek>(reader: &mut R) -> Result<TiffHeader> {
  let tiff = formats::tiff::GenericTiffReader::new(reader)?;
  let header = header::HeaderBuilder::from_ifd(tiff.root_ifd())?.build()?;
  Ok(header)
}

#[cfg(test)]
pub(crate) fn init_test_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}
