// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use serde::{Deserialize, Serialize};

pub trait TiffTag: Into<u16> + Copy {}

impl TiffTag for u16 {}

/// Baseline and extension tags consumed by the header builder
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum TiffCommonTag {
  NewSubFileType = 0x00FE,
  ImageWidth = 0x0100,
  ImageLength = 0x0101,
  BitsPerSample = 0x0102,
  Compression = 0x0103,
  PhotometricInt = 0x0106,
  FillOrder = 0x010A,
  StripOffsets = 0x0111,
  SamplesPerPixel = 0x0115,
  RowsPerStrip = 0x0116,
  StripByteCounts = 0x0117,
  XResolution = 0x011A,
  YResolution = 0x011B,
  PlanarConfig = 0x011C,
  T4Options = 0x0124,
  ResolutionUnit = 0x0128,
  Predictor = 0x013D,
  ColorMap = 0x0140,
  TileWidth = 0x0142,
  TileLength = 0x0143,
  TileOffsets = 0x0144,
  TileByteCounts = 0x0145,
  ExtraSamples = 0x0152,
  SampleFormat = 0x0153,
  SMinSampleValue = 0x0154,
  SMaxSampleValue = 0x0155,
  YCbCrCoefficients = 0x0211,
  YCbCrSubSampling = 0x0212,
  YCbCrPositioning = 0x0213,
}

impl From<TiffCommonTag> for u16 {
  fn from(tag: TiffCommonTag) -> Self {
    tag as u16
  }
}

impl TiffTag for TiffCommonTag {}

impl TryFrom<u16> for TiffCommonTag {
  type Error = u16;

  fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
    Ok(match value {
      0x00FE => Self::NewSubFileType,
      0x0100 => Self::ImageWidth,
      0x0101 => Self::ImageLength,
      0x0102 => Self::BitsPerSample,
      0x0103 => Self::Compression,
      0x0106 => Self::PhotometricInt,
      0x010A => Self::FillOrder,
      0x0111 => Self::StripOffsets,
      0x0115 => Self::SamplesPerPixel,
      0x0116 => Self::RowsPerStrip,
      0x0117 => Self::StripByteCounts,
      0x011A => Self::XResolution,
      0x011B => Self::YResolution,
      0x011C => Self::PlanarConfig,
      0x0124 => Self::T4Options,
      0x0128 => Self::ResolutionUnit,
      0x013D => Self::Predictor,
      0x0140 => Self::ColorMap,
      0x0142 => Self::TileWidth,
      0x0143 => Self::TileLength,
      0x0144 => Self::TileOffsets,
      0x0145 => Self::TileByteCounts,
      0x0152 => Self::ExtraSamples,
      0x0153 => Self::SampleFormat,
      0x0154 => Self::SMinSampleValue,
      0x0155 => Self::SMaxSampleValue,
      0x0211 => Self::YCbCrCoefficients,
      0x0212 => Self::YCbCrSubSampling,
      0x0213 => Self::YCbCrPositioning,
      x => return Err(x),
    })
  }
}
