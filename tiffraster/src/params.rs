// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use serde::{Deserialize, Serialize};

use crate::envparams::{tiffraster_ignore_checksum, tiffraster_single_thread};
use crate::raster::ColorFormat;

/// Options for a single decode call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeParams {
  /// Pixel layout of the returned buffer
  pub output: ColorFormat,
  /// Verify the Adler-32 trailer of deflate streams
  pub verify_checksum: bool,
  /// Decode strips and tiles on the rayon thread pool
  pub parallel: bool,
}

impl Default for DecodeParams {
  fn default() -> Self {
    Self {
      output: ColorFormat::Rgba,
      verify_checksum: true,
      parallel: true,
    }
  }
}

impl DecodeParams {
  /// Defaults, overridden by `TIFFRASTER_IGNORE_CHECKSUM=1` and
  /// `TIFFRASTER_SINGLE_THREAD=1`.
  pub fn from_env() -> Self {
    let mut params = Self::default();
    if tiffraster_ignore_checksum() {
      params.verify_checksum = false;
    }
    if tiffraster_single_thread() {
      params.parallel = false;
    }
    params
  }
}
