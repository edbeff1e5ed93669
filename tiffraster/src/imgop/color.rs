// SPDX-License-Identifier: LGPL-2.1
// Copyright 2022 Daniel Vogelbacher <daniel@chaospixel.com>

use rayon::prelude::*;

use crate::Result;
use crate::bits::clamp_f64_u8;
use crate::buffer::try_alloc;

/// Color conversion for Y Cb Cr to RGB
///
/// `luma` holds the coefficients for red, green and blue.
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8, luma: [f64; 3]) -> [u8; 3] {
  let [lr, lg, lb] = luma;
  let y = y as f64;
  let r = (cr as f64 - 128.0) * (2.0 - 2.0 * lr) + y;
  let b = (cb as f64 - 128.0) * (2.0 - 2.0 * lb) + y;
  let g = (y - lb * b - lr * r) / lg;
  [clamp_f64_u8(r.round()), clamp_f64_u8(g.round()), clamp_f64_u8(b.round())]
}

/// Naive ink to light conversion
pub fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
  let k = 255 - k as u32;
  let conv = |v: u8| ((255 - v as u32) * k / 255) as u8;
  [conv(c), conv(m), conv(y)]
}

/// Expand interleaved pixels of `N` colour channels, optionally followed
/// by alpha, into RGBA.
fn expand<const N: usize, F>(src: &[u8], has_alpha: bool, f: F) -> Result<Vec<u8>>
where
  F: Fn(&[u8]) -> [u8; 3] + Sync,
{
  let cpp = N + has_alpha as usize;
  let pixels = src.len() / cpp;
  let mut out = try_alloc(pixels * 4, 255_u8)?;
  out.par_chunks_exact_mut(4).zip(src.par_chunks_exact(cpp)).for_each(|(dst, pix)| {
    dst[..3].copy_from_slice(&f(&pix[..N]));
    if has_alpha {
      dst[3] = pix[N];
    }
  });
  Ok(out)
}

pub fn grey_to_rgba(src: &[u8], has_alpha: bool) -> Result<Vec<u8>> {
  expand::<1, _>(src, has_alpha, |p| [p[0]; 3])
}

pub fn rgb_to_rgba(src: &[u8], has_alpha: bool) -> Result<Vec<u8>> {
  expand::<3, _>(src, has_alpha, |p| [p[0], p[1], p[2]])
}

pub fn cmyk_to_rgba(src: &[u8], has_alpha: bool) -> Result<Vec<u8>> {
  expand::<4, _>(src, has_alpha, |p| cmyk_to_rgb(p[0], p[1], p[2], p[3]))
}
