// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use log::{debug, warn};

use super::ccitt_tables::*;
use super::huffman::HuffmanTree;
use super::{CodecError, Decompressor, Result};
use crate::buffer::try_alloc;
use crate::pumps::{BitOrder, BitPump, BitWriter};

const WHITE: u8 = 0;
const BLACK: u8 = 1;

/// T4 option bit for two dimensional coding
const T4_2D: u32 = 0x01;
/// T4 option bit for uncompressed mode
const T4_UNCOMPRESSED: u32 = 0x02;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FaxMode {
  /// Compression 2, one dimensional rows padded to whole bytes
  ModifiedHuffman,
  /// Compression 3, T.4 with optional EOLs and 2D rows
  Group3,
  /// Compression 4, T.6
  Group4,
}

struct FaxTrees {
  white: HuffmanTree,
  black: HuffmanTree,
  mode: HuffmanTree,
}

impl FaxTrees {
  fn build() -> Result<Self> {
    let mut white = HuffmanTree::new();
    let mut black = HuffmanTree::new();
    let mut mode = HuffmanTree::new();
    for (run, code) in WHITE_CODES {
      white.insert_str(code, run)?;
    }
    for (run, code) in BLACK_CODES {
      black.insert_str(code, run)?;
    }
    for (run, code) in EXTENDED_MAKEUP_CODES {
      white.insert_str(code, run)?;
      black.insert_str(code, run)?;
    }
    white.insert_str(EOL, EOL_SYMBOL)?;
    black.insert_str(EOL, EOL_SYMBOL)?;
    for (symbol, code) in MODE_CODES {
      mode.insert_str(code, symbol)?;
    }
    Ok(Self { white, black, mode })
  }

  fn runs(&self, color: u8) -> &HuffmanTree {
    if color == WHITE { &self.white } else { &self.black }
  }
}

/// Decoder for CCITT bilevel compression.
///
/// Produces rows of `ceil(width / 8)` bytes, one bit per pixel with
/// white = 1. Undecoded rows stay white.
#[derive(Debug, Clone, Copy)]
pub struct CcittDecompressor {
  mode: FaxMode,
  width: usize,
  height: usize,
  t4_options: u32,
  order: BitOrder,
}

/// Outcome of a page that stopped before its last row
enum PageEnd {
  Complete,
  Partial(usize, CodecError),
}

impl CcittDecompressor {
  pub fn new(mode: FaxMode, width: usize, height: usize, t4_options: u32, order: BitOrder) -> Self {
    Self {
      mode,
      width,
      height,
      t4_options,
      order,
    }
  }

  fn decode_rows(&self, trees: &FaxTrees, pump: &mut BitPump, writer: &mut BitWriter) -> Result<PageEnd> {
    let mut reference = try_alloc(self.width, WHITE)?;
    let mut current = try_alloc(self.width, WHITE)?;
    for y in 0..self.height {
      let row = match self.mode {
        FaxMode::ModifiedHuffman => {
          let row = decode_1d_row(trees, pump, &mut current);
          pump.align_to_byte();
          row
        }
        FaxMode::Group3 => {
          let had_eol = skip_eol(pump);
          if self.t4_options & T4_2D != 0 {
            if !had_eol {
              debug!("Row {} is not preceded by EOL", y);
            }
            match pump.get_bit() {
              Some(1) => decode_1d_row(trees, pump, &mut current),
              Some(_) => decode_2d_row(trees, pump, &reference, &mut current),
              None => Err(CodecError::Truncated),
            }
          } else {
            decode_1d_row(trees, pump, &mut current)
          }
        }
        FaxMode::Group4 => decode_2d_row(trees, pump, &reference, &mut current),
      };
      if let Err(err) = row {
        return match err {
          // A run longer than the row is a hard error in 1D rows
          CodecError::Overflow => Err(CodecError::Corrupt(format!("Run exceeds row width {} in row {}", self.width, y))),
          err => Ok(PageEnd::Partial(y, err)),
        };
      }
      for &px in current.iter() {
        writer.put_bit(px as u32)?;
      }
      writer.pad_to_byte()?;
      std::mem::swap(&mut reference, &mut current);
    }
    Ok(PageEnd::Complete)
  }
}

impl Decompressor for CcittDecompressor {
  fn decompress(&self, src: &[u8]) -> Result<Vec<u8>> {
    if self.t4_options & T4_UNCOMPRESSED != 0 && self.mode == FaxMode::Group3 {
      return Err(CodecError::Corrupt("Uncompressed mode in T.4 data is not supported".to_string()));
    }
    let trees = FaxTrees::build()?;
    let row_bytes = self.width.div_ceil(8);
    let size = row_bytes.checked_mul(self.height).ok_or(CodecError::Overflow)?;
    let mut writer = BitWriter::new(try_alloc(size, 0_u8)?);
    let mut pump = BitPump::new(src, self.order);

    match self.decode_rows(&trees, &mut pump, &mut writer)? {
      PageEnd::Complete => {}
      PageEnd::Partial(row, err) => warn!("{:?} data ends in row {} of {}: {}, keeping partial page", self.mode, row, self.height, err),
    }

    // Runs were written with black = 1
    let mut out = writer.into_inner();
    out.iter_mut().for_each(|b| *b = !*b);
    Ok(out)
  }
}

/// Consume fill bits and an EOL code if one follows, otherwise leave the
/// pump untouched.
fn skip_eol(pump: &mut BitPump) -> bool {
  let mut ahead = *pump;
  let mut zeros = 0;
  loop {
    match ahead.get_bit() {
      Some(0) => zeros += 1,
      Some(_) if zeros >= 11 => {
        *pump = ahead;
        return true;
      }
      _ => return false,
    }
  }
}

/// Read a run length, make-up codes are summed up until a terminating
/// code follows.
fn read_run(tree: &HuffmanTree, pump: &mut BitPump) -> Result<usize> {
  let mut total = 0;
  loop {
    match tree.decode(pump)? {
      EOL_SYMBOL => return Err(CodecError::Corrupt("Unexpected EOL inside a row".to_string())),
      run if run < 64 => return Ok(total + run as usize),
      run => total += run as usize,
    }
  }
}

fn fill(row: &mut [u8], from: usize, to: usize, color: u8) {
  row[from..to].fill(color);
}

fn decode_1d_row(trees: &FaxTrees, pump: &mut BitPump, row: &mut [u8]) -> Result<()> {
  let width = row.len();
  let mut a0 = 0;
  let mut color = WHITE;
  while a0 < width {
    let run = read_run(trees.runs(color), pump)?;
    if a0 + run > width {
      return Err(CodecError::Overflow);
    }
    fill(row, a0, a0 + run, color);
    a0 += run;
    color = if color == WHITE { BLACK } else { WHITE };
  }
  Ok(())
}

/// Changing elements `b1` and `b2` on the reference row.
///
/// `b1` is the first change right of `a0` to the colour opposite of
/// `color`, `b2` the change following it. Missing changes are `width`.
fn changing_elements(reference: &[u8], a0: Option<usize>, color: u8) -> (usize, usize) {
  let width = reference.len();
  let prev = |p: usize| if p == 0 { WHITE } else { reference[p - 1] };
  let start = a0.map_or(0, |a| a + 1);
  let b1 = (start..width).find(|&p| reference[p] != prev(p) && reference[p] != color).unwrap_or(width);
  let b2 = (b1 + 1..width).find(|&p| reference[p] != prev(p)).unwrap_or(width);
  (b1, b2)
}

fn decode_2d_row(trees: &FaxTrees, pump: &mut BitPump, reference: &[u8], row: &mut [u8]) -> Result<()> {
  let width = row.len();
  // None is the imaginary position before the first pixel
  let mut a0: Option<usize> = None;
  let mut color = WHITE;
  while a0.is_none_or(|a| a < width) {
    let start = a0.unwrap_or(0);
    let mode = trees.mode.decode(pump)?;
    let (b1, b2) = changing_elements(reference, a0, color);
    match mode {
      MODE_PASS => {
        if b2 < start {
          return Err(CodecError::Corrupt(format!("Pass mode moves back from {} to {}", start, b2)));
        }
        fill(row, start, b2, color);
        a0 = Some(b2);
      }
      MODE_HORIZONTAL => {
        let r1 = read_run(trees.runs(color), pump)?;
        let r2 = read_run(trees.runs(color ^ 1), pump)?;
        let a1 = start + r1;
        let a2 = a1 + r2;
        if a2 > width {
          return Err(CodecError::Corrupt(format!("Horizontal runs end at {} beyond width {}", a2, width)));
        }
        fill(row, start, a1, color);
        fill(row, a1, a2, color ^ 1);
        a0 = Some(a2);
      }
      MODE_EXTENSION => return Err(CodecError::Corrupt("Extension mode is not supported".to_string())),
      MODE_EOL => return Err(CodecError::Corrupt("End of facsimile block".to_string())),
      mode => {
        let delta = vertical_offset(mode).ok_or_else(|| CodecError::Corrupt(format!("Invalid mode symbol {}", mode)))?;
        let a1 = b1 as isize + delta;
        if a1 < start as isize || a1 > width as isize {
          return Err(CodecError::Corrupt(format!("Vertical mode position {} outside {}..={}", a1, start, width)));
        }
        let a1 = a1 as usize;
        fill(row, start, a1, color);
        a0 = Some(a1);
        color ^= 1;
      }
    }
  }
  Ok(())
}
