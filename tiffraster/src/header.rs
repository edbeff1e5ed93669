// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::bits::Endian;
use crate::formats::tiff::{Entry, IFD, PhotometricInterpretation, PlanarConfiguration, Predictor, ResolutionUnit, SampleFormat};
use crate::tags::TiffCommonTag;
use crate::{Result, TiffRasterError};

/// Maximum number of channels per pixel
pub const MAX_SAMPLES: usize = 16;

/// Location of the compressed pixel data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
  Strips {
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    rows_per_strip: usize,
  },
  Tiles {
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    tile_width: usize,
    tile_height: usize,
  },
}

impl Layout {
  pub fn offsets(&self) -> &[u64] {
    match self {
      Self::Strips { offsets, .. } | Self::Tiles { offsets, .. } => offsets,
    }
  }

  pub fn byte_counts(&self) -> &[u64] {
    match self {
      Self::Strips { byte_counts, .. } | Self::Tiles { byte_counts, .. } => byte_counts,
    }
  }
}

/// One strip or tile: where its bytes are and which pixels it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
  pub index: usize,
  pub offset: u64,
  pub byte_count: u64,
  pub x: usize,
  pub y: usize,
  /// Natural size of the unit, tiles are not clipped here
  pub width: usize,
  pub height: usize,
  /// Channel held by this unit for separate planes
  pub sample: Option<usize>,
}

/// Reconciled description of the first image in a TIFF file
#[derive(Debug, Clone, PartialEq)]
pub struct TiffHeader {
  pub width: usize,
  pub height: usize,
  pub samples_per_pixel: usize,
  pub bits_per_sample: Vec<u32>,
  pub sample_format: Vec<SampleFormat>,
  pub compression: u16,
  pub photometric: PhotometricInterpretation,
  pub planar_config: PlanarConfiguration,
  pub predictor: Predictor,
  pub fill_order: u16,
  pub x_resolution: f64,
  pub y_resolution: f64,
  pub resolution_unit: ResolutionUnit,
  pub palette: Vec<[u8; 3]>,
  /// Luma coefficients for red, green and blue
  pub luma: [f64; 3],
  /// Horizontal and vertical chroma subsampling
  pub ycbcr_subsampling: (usize, usize),
  pub ycbcr_positioning: u16,
  pub t4_options: u32,
  pub smin_sample_value: Vec<f64>,
  pub smax_sample_value: Vec<f64>,
  pub extra_samples: Vec<u16>,
  pub endian: Endian,
  pub layout: Layout,
}

impl TiffHeader {
  pub fn bits(&self, sample: usize) -> u32 {
    self.bits_per_sample.get(sample).copied().unwrap_or(8)
  }

  pub fn format(&self, sample: usize) -> SampleFormat {
    self.sample_format.get(sample).copied().unwrap_or(SampleFormat::Uint)
  }

  /// Every channel can be read at byte granularity
  pub fn byte_aligned(&self) -> bool {
    self.bits_per_sample.iter().all(|b| b % 8 == 0)
  }

  /// Lower bound of floating point samples, 0.0 unless SMinSampleValue says otherwise.
  pub fn smin(&self, sample: usize) -> f64 {
    per_sample(&self.smin_sample_value, sample).unwrap_or(0.0)
  }

  /// Upper bound of floating point samples, 1.0 unless SMaxSampleValue says otherwise.
  pub fn smax(&self, sample: usize) -> f64 {
    per_sample(&self.smax_sample_value, sample).unwrap_or(1.0)
  }

  /// Index of the channel carrying alpha, associated or unassociated.
  pub fn alpha_sample(&self) -> Option<usize> {
    let base = self.samples_per_pixel.checked_sub(self.extra_samples.len())?;
    self.extra_samples.iter().position(|&s| s == 1 || s == 2).map(|i| base + i)
  }

  pub fn is_tiled(&self) -> bool {
    matches!(self.layout, Layout::Tiles { .. })
  }

  /// Largest number of bytes the decompressed `unit` can hold.
  ///
  /// Subsampled YCbCr is counted as if it carried three full channels.
  pub fn unit_bytes(&self, unit: &Unit) -> usize {
    let (h, v) = if self.photometric == PhotometricInterpretation::YCbCr { self.ycbcr_subsampling } else { (1, 1) };
    let width = unit.width.next_multiple_of(h.max(1));
    let height = unit.height.next_multiple_of(v.max(1));
    let bits: usize = match unit.sample {
      Some(sample) => self.bits(sample) as usize,
      None => (0..self.samples_per_pixel).map(|s| self.bits(s) as usize).sum(),
    };
    width.saturating_mul(bits).div_ceil(8).saturating_mul(height)
  }

  /// Number of units making up one plane of the image
  pub fn units_per_plane(&self) -> usize {
    match &self.layout {
      Layout::Strips { rows_per_strip, .. } => self.height.div_ceil(*rows_per_strip),
      Layout::Tiles { tile_width, tile_height, .. } => self.width.div_ceil(*tile_width) * self.height.div_ceil(*tile_height),
    }
  }

  /// Expand the layout into decodable units.
  ///
  /// Units that start beyond the image or refer to a channel the image
  /// does not have are dropped.
  pub fn units(&self) -> Vec<Unit> {
    let planar = self.planar_config == PlanarConfiguration::Planar;
    let per_plane = self.units_per_plane().max(1);
    let offsets = self.layout.offsets();
    let counts = self.layout.byte_counts();
    let mut units = Vec::with_capacity(offsets.len());
    for (index, (&offset, &byte_count)) in offsets.iter().zip(counts.iter()).enumerate() {
      let (plane_index, sample) = if planar { (index % per_plane, Some(index / per_plane)) } else { (index, None) };
      if let Some(s) = sample {
        if s >= self.samples_per_pixel {
          debug!("Unit {} refers to sample {}, ignoring", index, s);
          continue;
        }
      }
      let (x, y, width, height) = match &self.layout {
        Layout::Strips { rows_per_strip, .. } => {
          let y = plane_index * rows_per_strip;
          (0, y, self.width, (*rows_per_strip).min(self.height.saturating_sub(y)))
        }
        Layout::Tiles { tile_width, tile_height, .. } => {
          let across = self.width.div_ceil(*tile_width);
          ((plane_index % across) * tile_width, (plane_index / across) * tile_height, *tile_width, *tile_height)
        }
      };
      if y >= self.height {
        debug!("Unit {} starts at row {} beyond image height, ignoring", index, y);
        continue;
      }
      units.push(Unit {
        index,
        offset,
        byte_count,
        x,
        y,
        width,
        height,
        sample,
      });
    }
    units
  }
}

fn per_sample(values: &[f64], sample: usize) -> Option<f64> {
  match values.len() {
    0 => None,
    1 => Some(values[0]),
    _ => values.get(sample).copied(),
  }
}

/// Collects tag values and turns them into a [`TiffHeader`]
#[derive(Debug, Clone, Default)]
pub struct HeaderBuilder {
  width: Option<u32>,
  height: Option<u32>,
  samples_per_pixel: Option<u32>,
  bits_per_sample: Vec<u32>,
  sample_format: Vec<u16>,
  compression: Option<u16>,
  photometric: Option<u16>,
  planar_config: Option<u16>,
  predictor: Option<u16>,
  fill_order: Option<u16>,
  x_resolution: Option<f64>,
  y_resolution: Option<f64>,
  resolution_unit: Option<u16>,
  palette: Vec<[u8; 3]>,
  luma: Option<[f64; 3]>,
  ycbcr_subsampling: Option<(u32, u32)>,
  ycbcr_positioning: Option<u16>,
  t4_options: Option<u32>,
  smin_sample_value: Vec<f64>,
  smax_sample_value: Vec<f64>,
  extra_samples: Vec<u16>,
  rows_per_strip: Option<u32>,
  strip_offsets: Vec<u64>,
  strip_byte_counts: Vec<u64>,
  tile_width: Option<u32>,
  tile_height: Option<u32>,
  tile_offsets: Vec<u64>,
  tile_byte_counts: Vec<u64>,
  endian: Endian,
}

fn scalar_u32(entry: &Entry) -> Option<u32> {
  let v = entry.get_u32(0);
  if v.is_none() {
    log::info!("TIFF tag 0x{:X} of type {} is not an integer, ignoring", entry.tag, entry.type_name());
  }
  v
}

fn scalar_u16(entry: &Entry) -> Option<u16> {
  let v = entry.get_u16(0);
  if v.is_none() {
    log::info!("TIFF tag 0x{:X} of type {} is not a 16 bit value, ignoring", entry.tag, entry.type_name());
  }
  v
}

fn list_u64(entry: &Entry) -> Vec<u64> {
  match entry.as_u32_vec() {
    Some(v) => v.into_iter().map(u64::from).collect(),
    None => {
      log::info!("TIFF tag 0x{:X} of type {} is not an integer list, ignoring", entry.tag, entry.type_name());
      Vec::new()
    }
  }
}

fn list_f64(entry: &Entry) -> Vec<f64> {
  (0..entry.count()).filter_map(|i| entry.get_f64(i as usize)).collect()
}

impl HeaderBuilder {
  /// Apply all recognized tags of the directory
  pub fn from_ifd(ifd: &IFD) -> Result<Self> {
    let mut builder = Self {
      endian: ifd.endian,
      ..Default::default()
    };
    for entry in ifd.entries().values() {
      builder.apply(entry)?;
    }
    Ok(builder)
  }

  pub fn endian(mut self, endian: Endian) -> Self {
    self.endian = endian;
    self
  }

  /// Apply a single tag. Tags this decoder does not use are ignored.
  pub fn apply(&mut self, entry: &Entry) -> Result<()> {
    let tag = match TiffCommonTag::try_from(entry.tag) {
      Ok(tag) => tag,
      Err(_) => return Ok(()),
    };
    match tag {
      TiffCommonTag::ImageWidth => self.width = scalar_u32(entry),
      TiffCommonTag::ImageLength => self.height = scalar_u32(entry),
      TiffCommonTag::BitsPerSample => {
        if entry.count() as usize > MAX_SAMPLES {
          return Err(TiffRasterError::Parse(format!("BitsPerSample has {} entries, at most {} supported", entry.count(), MAX_SAMPLES)));
        }
        self.bits_per_sample = entry
          .as_u32_vec()
          .ok_or_else(|| TiffRasterError::Parse(format!("BitsPerSample has invalid type {}", entry.type_name())))?;
      }
      TiffCommonTag::SampleFormat => {
        if entry.count() as usize > MAX_SAMPLES {
          return Err(TiffRasterError::Parse(format!("SampleFormat has {} entries, at most {} supported", entry.count(), MAX_SAMPLES)));
        }
        self.sample_format = (0..entry.count() as usize)
          .map(|i| entry.get_u16(i))
          .collect::<Option<Vec<u16>>>()
          .ok_or_else(|| TiffRasterError::Parse(format!("SampleFormat has invalid type {}", entry.type_name())))?;
      }
      TiffCommonTag::Compression => self.compression = scalar_u16(entry),
      TiffCommonTag::PhotometricInt => self.photometric = scalar_u16(entry),
      TiffCommonTag::FillOrder => self.fill_order = scalar_u16(entry),
      TiffCommonTag::StripOffsets => self.strip_offsets = list_u64(entry),
      TiffCommonTag::StripByteCounts => self.strip_byte_counts = list_u64(entry),
      TiffCommonTag::SamplesPerPixel => self.samples_per_pixel = scalar_u32(entry),
      TiffCommonTag::RowsPerStrip => self.rows_per_strip = scalar_u32(entry),
      TiffCommonTag::XResolution => self.x_resolution = entry.get_f64(0),
      TiffCommonTag::YResolution => self.y_resolution = entry.get_f64(0),
      TiffCommonTag::ResolutionUnit => self.resolution_unit = scalar_u16(entry),
      TiffCommonTag::PlanarConfig => self.planar_config = scalar_u16(entry),
      TiffCommonTag::T4Options => self.t4_options = scalar_u32(entry),
      TiffCommonTag::Predictor => self.predictor = scalar_u16(entry),
      TiffCommonTag::ColorMap => {
        // Three blocks of 16 bit values: all red, all green, all blue
        let n = entry.count() as usize / 3;
        let mut palette = Vec::new();
        palette.try_reserve_exact(n).map_err(|_| TiffRasterError::OutOfMemory)?;
        for i in 0..n {
          let c = |idx: usize| (entry.get_u32(idx).unwrap_or(0) >> 8) as u8;
          palette.push([c(i), c(i + n), c(i + 2 * n)]);
        }
        self.palette = palette;
      }
      TiffCommonTag::TileWidth => self.tile_width = scalar_u32(entry),
      TiffCommonTag::TileLength => self.tile_height = scalar_u32(entry),
      TiffCommonTag::TileOffsets => self.tile_offsets = list_u64(entry),
      TiffCommonTag::TileByteCounts => self.tile_byte_counts = list_u64(entry),
      TiffCommonTag::ExtraSamples => {
        self.extra_samples = (0..entry.count() as usize).filter_map(|i| entry.get_u16(i)).collect();
      }
      TiffCommonTag::SMinSampleValue => self.smin_sample_value = list_f64(entry),
      TiffCommonTag::SMaxSampleValue => self.smax_sample_value = list_f64(entry),
      TiffCommonTag::YCbCrCoefficients => {
        let coeff = list_f64(entry);
        if coeff.len() < 3 {
          return Err(TiffRasterError::Parse(format!("YCbCrCoefficients needs 3 values, got {}", coeff.len())));
        }
        self.luma = Some([coeff[0], coeff[1], coeff[2]]);
      }
      TiffCommonTag::YCbCrSubSampling => match (entry.get_u32(0), entry.get_u32(1)) {
        (Some(h), Some(v)) => self.ycbcr_subsampling = Some((h, v)),
        _ => return Err(TiffRasterError::Parse("YCbCrSubSampling needs 2 values".to_string())),
      },
      TiffCommonTag::YCbCrPositioning => self.ycbcr_positioning = scalar_u16(entry),
      TiffCommonTag::NewSubFileType => {}
    }
    Ok(())
  }

  /// Reconcile strip and tile fields into a single layout.
  ///
  /// Some writers store tile offsets and byte counts in the strip fields,
  /// those are moved over when tile dimensions are present.
  fn reconcile_layout(&mut self, height: usize) -> Result<Layout> {
    let tw = self.tile_width.unwrap_or(0) as usize;
    let th = self.tile_height.unwrap_or(0) as usize;
    match (tw, th) {
      (0, 0) => {
        let offsets = std::mem::take(&mut self.strip_offsets);
        let byte_counts = std::mem::take(&mut self.strip_byte_counts);
        if offsets.is_empty() || offsets.len() != byte_counts.len() || !self.tile_offsets.is_empty() || !self.tile_byte_counts.is_empty() {
          return Err(TiffRasterError::Parse(format!(
            "Inconsistent strip layout: {} offsets, {} byte counts, {} tile offsets",
            offsets.len(),
            byte_counts.len(),
            self.tile_offsets.len()
          )));
        }
        let rows_per_strip = match self.rows_per_strip {
          None => height,
          Some(0) => return Err(TiffRasterError::Parse("RowsPerStrip must not be 0".to_string())),
          Some(rps) => (rps as usize).min(height),
        };
        Ok(Layout::Strips {
          offsets,
          byte_counts,
          rows_per_strip,
        })
      }
      (tw, th) if tw > 0 && th > 0 => {
        if self.tile_byte_counts.is_empty() {
          debug!("Moving strip byte counts to tile byte counts");
          self.tile_byte_counts = std::mem::take(&mut self.strip_byte_counts);
        }
        if self.tile_offsets.is_empty() {
          debug!("Moving strip offsets to tile offsets");
          self.tile_offsets = std::mem::take(&mut self.strip_offsets);
        }
        let offsets = std::mem::take(&mut self.tile_offsets);
        let byte_counts = std::mem::take(&mut self.tile_byte_counts);
        if offsets.is_empty() || offsets.len() != byte_counts.len() || !self.strip_offsets.is_empty() || !self.strip_byte_counts.is_empty() {
          return Err(TiffRasterError::Parse(format!(
            "Inconsistent tile layout: {} offsets, {} byte counts, {} strip offsets",
            offsets.len(),
            byte_counts.len(),
            self.strip_offsets.len()
          )));
        }
        let area = tw.checked_mul(th).and_then(|a| a.checked_mul(4)).filter(|a| *a <= i32::MAX as usize);
        if area.is_none() {
          return Err(TiffRasterError::Parse(format!("Tile size {}x{} is too large", tw, th)));
        }
        Ok(Layout::Tiles {
          offsets,
          byte_counts,
          tile_width: tw,
          tile_height: th,
        })
      }
      (tw, th) => Err(TiffRasterError::Parse(format!("Incomplete tile dimensions {}x{}", tw, th))),
    }
  }

  /// Validate and produce the immutable header
  pub fn build(mut self) -> Result<TiffHeader> {
    let width = self.width.unwrap_or(0) as usize;
    let height = self.height.unwrap_or(0) as usize;
    if width == 0 || height == 0 {
      return Err(TiffRasterError::Parse(format!("Invalid image dimensions {}x{}", width, height)));
    }
    match width.checked_mul(height).and_then(|a| a.checked_mul(4)) {
      Some(size) if size <= i32::MAX as usize => {}
      _ => return Err(TiffRasterError::Parse(format!("Image dimensions {}x{} are too large", width, height))),
    }

    let samples_per_pixel = self.samples_per_pixel.unwrap_or(1) as usize;
    if !(1..=MAX_SAMPLES).contains(&samples_per_pixel) {
      return Err(TiffRasterError::Parse(format!("Invalid samples per pixel: {}", samples_per_pixel)));
    }

    let bits_per_sample = match self.bits_per_sample.len() {
      0 => vec![1; samples_per_pixel],
      1 => vec![self.bits_per_sample[0]; samples_per_pixel],
      n if n >= samples_per_pixel => self.bits_per_sample[..samples_per_pixel].to_vec(),
      n => {
        return Err(TiffRasterError::Parse(format!("BitsPerSample has {} entries for {} samples", n, samples_per_pixel)));
      }
    };
    if let Some(bad) = bits_per_sample.iter().find(|&&b| b == 0 || (b > 32 && b % 8 != 0)) {
      return Err(TiffRasterError::Parse(format!("Invalid bits per sample: {}", bad)));
    }

    let sample_format = match self.sample_format.len() {
      0 => vec![SampleFormat::Uint; samples_per_pixel],
      1 => vec![sample_format_of(self.sample_format[0]); samples_per_pixel],
      n if n == samples_per_pixel => self.sample_format.iter().map(|&f| sample_format_of(f)).collect(),
      n => {
        return Err(TiffRasterError::Parse(format!("SampleFormat has {} entries for {} samples", n, samples_per_pixel)));
      }
    };

    let luma = self.luma.unwrap_or([0.299, 0.587, 0.114]);
    if luma.iter().any(|&l| l.is_nan() || l <= 0.0) {
      return Err(TiffRasterError::Parse(format!("Invalid luma coefficients {:?}", luma)));
    }

    let planar_config = match self.planar_config.unwrap_or(1) {
      1 => PlanarConfiguration::Chunky,
      2 => PlanarConfiguration::Planar,
      x => return Err(TiffRasterError::Parse(format!("Invalid planar configuration: {}", x))),
    };

    let (h, v) = self.ycbcr_subsampling.unwrap_or((2, 2));
    if ![1, 2, 4].contains(&h) || ![1, 2, 4].contains(&v) {
      return Err(TiffRasterError::Parse(format!("Invalid YCbCr subsampling {}x{}", h, v)));
    }

    let photometric = match self.photometric {
      Some(id) => PhotometricInterpretation::from_id(id).ok_or_else(|| TiffRasterError::Unsupported(format!("photometric interpretation {}", id)))?,
      None => {
        let inferred = if samples_per_pixel >= 3 {
          PhotometricInterpretation::RGB
        } else {
          PhotometricInterpretation::BlackIsZero
        };
        warn!("PhotometricInterpretation missing, assuming {:?} for {} samples", inferred, samples_per_pixel);
        inferred
      }
    };

    let predictor = match self.predictor.unwrap_or(1) {
      1 => Predictor::None,
      2 => Predictor::Horizontal,
      x => return Err(TiffRasterError::Unsupported(format!("predictor {}", x))),
    };

    let resolution_unit = match self.resolution_unit.map(|id| (id, ResolutionUnit::from_id(id))) {
      None => ResolutionUnit::Inch,
      Some((_, Some(unit))) => unit,
      Some((id, None)) => {
        warn!("Unknown ResolutionUnit {}, assuming inch", id);
        ResolutionUnit::Inch
      }
    };

    let fill_order = match self.fill_order.unwrap_or(1) {
      2 => 2,
      1 => 1,
      x => {
        warn!("Invalid FillOrder {}, assuming 1", x);
        1
      }
    };

    let layout = self.reconcile_layout(height)?;

    Ok(TiffHeader {
      width,
      height,
      samples_per_pixel,
      bits_per_sample,
      sample_format,
      compression: self.compression.unwrap_or(1),
      photometric,
      planar_config,
      predictor,
      fill_order,
      x_resolution: self.x_resolution.unwrap_or(1.0),
      y_resolution: self.y_resolution.unwrap_or(1.0),
      resolution_unit,
      palette: self.palette,
      luma,
      ycbcr_subsampling: (h as usize, v as usize),
      ycbcr_positioning: self.ycbcr_positioning.unwrap_or(1),
      t4_options: self.t4_options.unwrap_or(0),
      smin_sample_value: self.smin_sample_value,
      smax_sample_value: self.smax_sample_value,
      extra_samples: self.extra_samples,
      endian: self.endian,
      layout,
    })
  }
}

fn sample_format_of(id: u16) -> SampleFormat {
  SampleFormat::from_id(id).unwrap_or_else(|| {
    warn!("Unknown SampleFormat {}, treating samples as opaque", id);
    SampleFormat::Void
  })
}
