// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::io::{Read, Seek, SeekFrom};

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buffer::{try_alloc, try_with_capacity};
use crate::decompressors::{self, CodecParams};
use crate::formats::tiff::{CompressionMethod, PhotometricInterpretation, PlanarConfiguration};
use crate::header::{TiffHeader, Unit};
use crate::imgop::{self, Dim2};
use crate::params::DecodeParams;
use crate::{Result, TiffRasterError};

/// Pixel layout of a [`RasterImage`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorFormat {
  #[default]
  Rgba,
  Rgb,
  Grey,
}

impl ColorFormat {
  /// Components per pixel
  pub fn cpp(&self) -> usize {
    match self {
      Self::Rgba => 4,
      Self::Rgb => 3,
      Self::Grey => 1,
    }
  }
}

/// Decoded image, 8 bits per component, rows tightly packed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
  pub width: usize,
  pub height: usize,
  pub format: ColorFormat,
  pub data: Vec<u8>,
}

impl RasterImage {
  pub fn cpp(&self) -> usize {
    self.format.cpp()
  }

  /// Components of the pixel at `x`, `y`
  pub fn pixel(&self, x: usize, y: usize) -> Option<&[u8]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let cpp = self.cpp();
    self.data.get((y * self.width + x) * cpp..(y * self.width + x + 1) * cpp)
  }
}

/// Decoded content of a single unit
enum Pixels {
  Rgba(Vec<u8>),
  Plane(Vec<u16>),
}

/// Decode all strips or tiles described by `header` and assemble the image.
pub fn load_raster<R: Read + Seek>(reader: &mut R, header: &TiffHeader, params: &DecodeParams) -> Result<RasterImage> {
  let planar = header.planar_config == PlanarConfiguration::Planar && header.samples_per_pixel > 1;
  imgop::color_channels(header)?;
  if planar
    && !matches!(
      header.photometric,
      PhotometricInterpretation::WhiteIsZero
        | PhotometricInterpretation::BlackIsZero
        | PhotometricInterpretation::RGBPalette
        | PhotometricInterpretation::RGB
        | PhotometricInterpretation::CMYK
    )
  {
    return Err(TiffRasterError::Unsupported(format!("separate planes for {:?}", header.photometric)));
  }

  let units = header.units();
  let raw = read_units(reader, &units)?;
  let codec_inverts = CompressionMethod::from_id(header.compression).is_some_and(|c| c.is_fax());

  let decode_unit = |(unit, src): (&Unit, Vec<u8>)| -> Result<Pixels> {
    let codec = CodecParams {
      compression: header.compression,
      width: unit.width,
      height: unit.height,
      t4_options: header.t4_options,
      fill_order: header.fill_order,
      verify_checksum: params.verify_checksum,
      max_output: header.unit_bytes(unit),
    };
    let data = decompressors::decompress(src, &codec)?;
    let dim = Dim2::new(unit.width, unit.height);
    debug!("Unit {} at {},{} ({}x{}) decompressed to {} bytes", unit.index, unit.x, unit.y, dim.w, dim.h, data.len());
    match unit.sample {
      Some(sample) if planar => Ok(Pixels::Plane(imgop::reconstruct_plane(header, &data, dim, sample, codec_inverts)?)),
      _ => Ok(Pixels::Rgba(imgop::reconstruct(header, &data, dim, codec_inverts)?)),
    }
  };

  let jobs: Vec<(&Unit, Vec<u8>)> = units.iter().zip(raw).collect();
  let decoded: Vec<Pixels> = if params.parallel {
    jobs.into_par_iter().map(decode_unit).collect::<Result<_>>()?
  } else {
    jobs.into_iter().map(decode_unit).collect::<Result<_>>()?
  };

  let (width, height) = (header.width, header.height);
  let rgba = if planar {
    let alpha = header.alpha_sample();
    let mut planes = Vec::with_capacity(header.samples_per_pixel);
    for s in 0..header.samples_per_pixel {
      planes.push(try_alloc(width * height, if Some(s) == alpha { 255_u16 } else { 0 })?);
    }
    for (unit, pixels) in units.iter().zip(decoded) {
      if let (Some(sample), Pixels::Plane(values)) = (unit.sample, pixels) {
        if let Some(plane) = planes.get_mut(sample) {
          paste(plane, width, height, 1, unit, &values);
        }
      }
    }
    imgop::merge_planes(header, &planes, width * height)?
  } else {
    let mut rgba = imgop::blank_rgba(width * height)?;
    for (unit, pixels) in units.iter().zip(decoded) {
      if let Pixels::Rgba(values) = pixels {
        paste(&mut rgba, width, height, 4, unit, &values);
      }
    }
    rgba
  };

  Ok(RasterImage {
    width,
    height,
    format: params.output,
    data: convert(rgba, params.output)?,
  })
}

/// Read the compressed bytes of every unit.
///
/// Byte counts reaching past the end of the source are cut short.
fn read_units<R: Read + Seek>(reader: &mut R, units: &[Unit]) -> Result<Vec<Vec<u8>>> {
  let stream_len = reader.seek(SeekFrom::End(0)).map_err(TiffRasterError::Io)?;
  let mut out = try_with_capacity(units.len())?;
  for unit in units {
    let available = stream_len.saturating_sub(unit.offset);
    let len = unit.byte_count.min(available);
    if len < unit.byte_count {
      warn!("Unit {} claims {} bytes at offset {}, only {} available", unit.index, unit.byte_count, unit.offset, len);
    }
    let mut buf = try_alloc(len as usize, 0_u8)?;
    if len > 0 {
      reader.seek(SeekFrom::Start(unit.offset)).map_err(TiffRasterError::Io)?;
      reader.read_exact(&mut buf).map_err(TiffRasterError::Io)?;
    }
    out.push(buf);
  }
  Ok(out)
}

/// Copy a unit into the image, clipping it against the image bounds.
fn paste<T: Copy>(dst: &mut [T], width: usize, height: usize, cpp: usize, unit: &Unit, src: &[T]) {
  let cols = unit.width.min(width.saturating_sub(unit.x));
  let rows = unit.height.min(height.saturating_sub(unit.y));
  for row in 0..rows {
    let s = row * unit.width * cpp;
    let d = ((unit.y + row) * width + unit.x) * cpp;
    if let (Some(dst), Some(src)) = (dst.get_mut(d..d + cols * cpp), src.get(s..s + cols * cpp)) {
      dst.copy_from_slice(src);
    }
  }
}

/// Turn the RGBA working buffer into the requested output layout
pub fn convert(rgba: Vec<u8>, format: ColorFormat) -> Result<Vec<u8>> {
  let pixels = rgba.len() / 4;
  match format {
    ColorFormat::Rgba => Ok(rgba),
    ColorFormat::Rgb => {
      let mut out = try_alloc(pixels * 3, 0_u8)?;
      out.par_chunks_exact_mut(3).zip(rgba.par_chunks_exact(4)).for_each(|(dst, src)| {
        dst.copy_from_slice(&src[..3]);
      });
      Ok(out)
    }
    ColorFormat::Grey => {
      let mut out = try_alloc(pixels, 0_u8)?;
      out.par_iter_mut().zip(rgba.par_chunks_exact(4)).for_each(|(dst, src)| {
        // Rec. 601 luma, rounded
        *dst = ((src[0] as u32 * 299 + src[1] as u32 * 587 + src[2] as u32 * 114 + 500) / 1000) as u8;
      });
      Ok(out)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn unit(x: usize, y: usize, width: usize, height: usize) -> Unit {
    Unit {
      index: 0,
      offset: 0,
      byte_count: 0,
      x,
      y,
      width,
      height,
      sample: None,
    }
  }

  #[test]
  fn paste_clips_tiles() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    // 3x3 image, 2x2 tile at 2,2 only contributes its top left pixel
    let mut dst = vec![0_u8; 9];
    paste(&mut dst, 3, 3, 1, &unit(2, 2, 2, 2), &[1, 2, 3, 4]);
    assert_eq!(dst, vec![0, 0, 0, 0, 0, 0, 0, 0, 1]);
    paste(&mut dst, 3, 3, 1, &unit(0, 0, 2, 2), &[5, 6, 7, 8]);
    assert_eq!(dst, vec![5, 6, 0, 7, 8, 0, 0, 0, 1]);
    Ok(())
  }

  #[test]
  fn output_formats() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let rgba = vec![255, 0, 0, 10, 255, 255, 255, 20];
    assert_eq!(convert(rgba.clone(), ColorFormat::Rgb)?, vec![255, 0, 0, 255, 255, 255]);
    assert_eq!(convert(rgba.clone(), ColorFormat::Grey)?, vec![76, 255]);
    assert_eq!(convert(rgba.clone(), ColorFormat::Rgba)?, rgba);
    Ok(())
  }

  #[test]
  fn short_units_are_cut() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut src = std::io::Cursor::new(vec![1_u8, 2, 3, 4, 5]);
    let mut u = unit(0, 0, 1, 1);
    u.offset = 3;
    u.byte_count = 10;
    let mut beyond = u;
    beyond.offset = 100;
    assert_eq!(read_units(&mut src, &[u, beyond])?, vec![vec![4, 5], vec![]]);
    Ok(())
  }

  #[test]
  fn pixel_access() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let img = RasterImage {
      width: 2,
      height: 1,
      format: ColorFormat::Rgb,
      data: vec![1, 2, 3, 4, 5, 6],
    };
    assert_eq!(img.pixel(1, 0), Some(&[4_u8, 5, 6][..]));
    assert_eq!(img.pixel(2, 0), None);
    Ok(())
  }
}
