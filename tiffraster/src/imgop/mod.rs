// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

pub mod color;
pub mod ieee754;
pub mod predictor;
pub mod samples;

use log::debug;

use crate::buffer::{try_alloc, try_with_capacity};
use crate::formats::tiff::{PhotometricInterpretation, Predictor};
use crate::header::TiffHeader;
use crate::{Result, TiffRasterError};
use samples::SampleReader;

/// Descriptor of a two-dimensional area
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Dim2 {
  pub w: usize,
  pub h: usize,
}

impl Dim2 {
  pub fn new(w: usize, h: usize) -> Self {
    Self { w, h }
  }

  pub fn area(&self) -> usize {
    self.w * self.h
  }
}

/// RGBA buffer of `pixels` opaque black pixels
pub fn blank_rgba(pixels: usize) -> Result<Vec<u8>> {
  let mut out = try_alloc(pixels * 4, 0_u8)?;
  out.chunks_exact_mut(4).for_each(|p| p[3] = 255);
  Ok(out)
}

/// Number of colour channels the photometric interpretation takes from
/// each pixel, before any extra samples.
pub fn color_channels(header: &TiffHeader) -> Result<usize> {
  let channels = match header.photometric {
    PhotometricInterpretation::WhiteIsZero | PhotometricInterpretation::BlackIsZero => 1,
    PhotometricInterpretation::RGBPalette => {
      if header.palette.is_empty() {
        return Err(TiffRasterError::Parse("Palette image without a ColorMap".to_string()));
      }
      1
    }
    PhotometricInterpretation::RGB | PhotometricInterpretation::YCbCr => 3,
    PhotometricInterpretation::CMYK => 4,
    other => return Err(TiffRasterError::Unsupported(format!("photometric interpretation {:?}", other))),
  };
  if header.samples_per_pixel < channels {
    return Err(TiffRasterError::Parse(format!(
      "{:?} needs {} samples per pixel, image has {}",
      header.photometric, channels, header.samples_per_pixel
    )));
  }
  Ok(channels)
}

/// Turn the decompressed bytes of one chunky unit into RGBA pixels.
///
/// `codec_inverts` is set when the codec already produced white as 1,
/// as the fax decoders do, so WhiteIsZero must not be inverted again.
pub fn reconstruct(header: &TiffHeader, data: &[u8], dim: Dim2, codec_inverts: bool) -> Result<Vec<u8>> {
  let channels = color_channels(header)?;
  match header.photometric {
    PhotometricInterpretation::RGBPalette => palette_to_rgba(header, data, dim),
    PhotometricInterpretation::YCbCr => ycbcr_to_rgba(header, data, dim),
    _ => {
      let alpha = header.alpha_sample();
      let cpp = channels + alpha.is_some() as usize;
      let mut buf = try_alloc(dim.area() * cpp, 0_u8)?;
      if alpha.is_some() {
        buf.chunks_exact_mut(cpp).for_each(|p| p[channels] = 255);
      }
      read_interleaved(header, data, dim, channels, alpha, &mut buf);
      if header.predictor == Predictor::Horizontal {
        predictor::unpredict_rows(&mut buf, dim.w, cpp);
      }
      if header.photometric == PhotometricInterpretation::WhiteIsZero && !codec_inverts {
        buf.chunks_exact_mut(cpp).for_each(|p| p[0] = 255 - p[0]);
      }
      to_rgba(header.photometric, &buf, alpha.is_some())
    }
  }
}

fn to_rgba(photometric: PhotometricInterpretation, buf: &[u8], has_alpha: bool) -> Result<Vec<u8>> {
  match photometric {
    PhotometricInterpretation::RGB => color::rgb_to_rgba(buf, has_alpha),
    PhotometricInterpretation::CMYK => color::cmyk_to_rgba(buf, has_alpha),
    _ => color::grey_to_rgba(buf, has_alpha),
  }
}

fn read_interleaved(header: &TiffHeader, data: &[u8], dim: Dim2, channels: usize, alpha: Option<usize>, buf: &mut [u8]) {
  let cpp = channels + alpha.is_some() as usize;
  if dim.area() == 0 {
    return;
  }
  let mut reader = SampleReader::chunky(header, data);
  'rows: for row in buf.chunks_exact_mut(dim.w * cpp) {
    for px in row.chunks_exact_mut(cpp) {
      if read_pixel(&mut reader, header, channels, alpha, px).is_none() {
        debug!("Unit data exhausted before the last pixel");
        break 'rows;
      }
    }
    reader.end_row();
  }
}

fn read_pixel(reader: &mut SampleReader, header: &TiffHeader, channels: usize, alpha: Option<usize>, px: &mut [u8]) -> Option<()> {
  for (s, value) in px.iter_mut().take(channels).enumerate() {
    *value = reader.next_u8(s)?;
  }
  read_extra(reader, header, channels, alpha, &mut px[channels..])
}

/// Consume the samples behind the colour channels, storing alpha in
/// `alpha_out[0]` when present.
fn read_extra(reader: &mut SampleReader, header: &TiffHeader, first: usize, alpha: Option<usize>, alpha_out: &mut [u8]) -> Option<()> {
  for s in first..header.samples_per_pixel {
    if Some(s) == alpha {
      let a = reader.next_u8(s)?;
      if let Some(out) = alpha_out.first_mut() {
        *out = a;
      }
    } else {
      reader.skip(s)?;
    }
  }
  Some(())
}

fn palette_to_rgba(header: &TiffHeader, data: &[u8], dim: Dim2) -> Result<Vec<u8>> {
  let mut out = blank_rgba(dim.area())?;
  if dim.area() == 0 {
    return Ok(out);
  }
  let alpha = header.alpha_sample();
  let mut reader = SampleReader::chunky(header, data);
  'rows: for row in out.chunks_exact_mut(dim.w * 4) {
    for px in row.chunks_exact_mut(4) {
      let Some(index) = reader.next_index(0) else {
        break 'rows;
      };
      // Out of range indices leave the pixel untouched
      if let Some(rgb) = header.palette.get(index as usize) {
        px[..3].copy_from_slice(rgb);
      }
      if read_extra(&mut reader, header, 1, alpha, &mut px[3..]).is_none() {
        break 'rows;
      }
    }
    reader.end_row();
  }
  Ok(out)
}

/// Chroma subsampled data comes in blocks of h*v luma samples followed by
/// one Cb and one Cr sample. Block pixels outside the unit are dropped.
fn ycbcr_to_rgba(header: &TiffHeader, data: &[u8], dim: Dim2) -> Result<Vec<u8>> {
  let mut out = blank_rgba(dim.area())?;
  let (h, v) = header.ycbcr_subsampling;
  let alpha = header.alpha_sample();
  let mut reader = SampleReader::chunky(header, data);
  let mut lumas = [0_u8; 16];
  let mut alpha_value = [255_u8; 1];

  'blocks: for by in (0..dim.h).step_by(v) {
    for bx in (0..dim.w).step_by(h) {
      let mut block = || -> Option<(u8, u8)> {
        for luma in lumas.iter_mut().take(h * v) {
          *luma = reader.next_u8(0)?;
        }
        let cb = reader.next_u8(1)?;
        let cr = reader.next_u8(2)?;
        read_extra(&mut reader, header, 3, alpha, &mut alpha_value)?;
        Some((cb, cr))
      };
      let Some((cb, cr)) = block() else {
        debug!("YCbCr data exhausted at block {},{}", bx, by);
        break 'blocks;
      };
      for j in 0..v {
        for i in 0..h {
          let (x, y) = (bx + i, by + j);
          if x < dim.w && y < dim.h {
            let px = &mut out[(y * dim.w + x) * 4..][..4];
            px[..3].copy_from_slice(&color::ycbcr_to_rgb(lumas[j * h + i], cb, cr, header.luma));
            px[3] = alpha_value[0];
          }
        }
      }
    }
    reader.end_row();
  }
  Ok(out)
}

/// Turn the decompressed bytes of one unit holding a single channel into
/// plane values. Palette indices are kept as is, all other channels are
/// normalised to 0..=255.
pub fn reconstruct_plane(header: &TiffHeader, data: &[u8], dim: Dim2, sample: usize, codec_inverts: bool) -> Result<Vec<u16>> {
  let mut reader = SampleReader::plane(header, data, sample);
  if dim.area() == 0 {
    return Ok(Vec::new());
  }

  if header.photometric == PhotometricInterpretation::RGBPalette && sample == 0 {
    let mut out = try_alloc(dim.area(), 0_u16)?;
    'rows: for row in out.chunks_exact_mut(dim.w) {
      for value in row.iter_mut() {
        let Some(index) = reader.next_index(0) else {
          break 'rows;
        };
        *value = index.min(u16::MAX as u32) as u16;
      }
      reader.end_row();
    }
    return Ok(out);
  }

  let mut buf = try_alloc(dim.area(), 0_u8)?;
  'rows: for row in buf.chunks_exact_mut(dim.w) {
    for value in row.iter_mut() {
      let Some(v) = reader.next_u8(sample) else {
        break 'rows;
      };
      *value = v;
    }
    reader.end_row();
  }
  if header.predictor == Predictor::Horizontal {
    predictor::unpredict_rows(&mut buf, dim.w, 1);
  }
  if header.photometric == PhotometricInterpretation::WhiteIsZero && sample == 0 && !codec_inverts {
    buf.iter_mut().for_each(|v| *v = 255 - *v);
  }
  let mut out = try_with_capacity(buf.len())?;
  out.extend(buf.into_iter().map(u16::from));
  Ok(out)
}

/// Combine full size planes, one per sample, into RGBA pixels.
pub fn merge_planes(header: &TiffHeader, planes: &[Vec<u16>], pixels: usize) -> Result<Vec<u8>> {
  let channels = color_channels(header)?;
  let alpha = header.alpha_sample();
  let plane = |s: usize| {
    planes
      .get(s)
      .filter(|p| p.len() == pixels)
      .ok_or_else(|| TiffRasterError::Parse(format!("Missing plane for sample {}", s)))
  };

  match header.photometric {
    PhotometricInterpretation::YCbCr => Err(TiffRasterError::Unsupported("YCbCr with separate planes".to_string())),
    PhotometricInterpretation::RGBPalette => {
      let mut out = blank_rgba(pixels)?;
      for (px, &index) in out.chunks_exact_mut(4).zip(plane(0)?) {
        if let Some(rgb) = header.palette.get(index as usize) {
          px[..3].copy_from_slice(rgb);
        }
      }
      if let Some(a) = alpha {
        for (px, &value) in out.chunks_exact_mut(4).zip(plane(a)?) {
          px[3] = value as u8;
        }
      }
      Ok(out)
    }
    photometric => {
      let cpp = channels + alpha.is_some() as usize;
      let mut buf = try_alloc(pixels * cpp, 0_u8)?;
      for (c, s) in (0..channels).chain(alpha).enumerate() {
        for (px, &value) in buf.chunks_exact_mut(cpp).zip(plane(s)?) {
          px[c] = value as u8;
        }
      }
      to_rgba(photometric, &buf, alpha.is_some())
    }
  }
}
