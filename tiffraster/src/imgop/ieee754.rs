// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use crate::bits::Endian;

/// Assemble an IEEE 754 binary value from its raw bit pattern.
///
/// `exp_bits` and `mant_bits` describe the layout, the sign is the bit
/// above the exponent.
pub fn decode(raw: u64, exp_bits: u32, mant_bits: u32) -> f64 {
  let sign = if (raw >> (exp_bits + mant_bits)) & 1 == 1 { -1.0 } else { 1.0 };
  let exp_max = (1_u64 << exp_bits) - 1;
  let exp = (raw >> mant_bits) & exp_max;
  let mant = raw & ((1_u64 << mant_bits) - 1);
  let bias = (1_i32 << (exp_bits - 1)) - 1;
  let fraction = mant as f64 / (1_u64 << mant_bits) as f64;

  if exp == 0 {
    if mant == 0 {
      return sign * 0.0;
    }
    // subnormal
    return sign * fraction * 2_f64.powi(1 - bias);
  }
  if exp == exp_max {
    return if mant == 0 { sign * f64::INFINITY } else { f64::NAN };
  }
  sign * (1.0 + fraction) * 2_f64.powi(exp as i32 - bias)
}

/// Read a float of `buf.len()` bytes (2, 3, 4 or 8) in the given byte order.
pub fn read_float(buf: &[u8], endian: Endian) -> Option<f64> {
  let mut raw: u64 = 0;
  match endian {
    Endian::Big => buf.iter().for_each(|&b| raw = (raw << 8) | b as u64),
    Endian::Little => buf.iter().rev().for_each(|&b| raw = (raw << 8) | b as u64),
  }
  match buf.len() {
    2 => Some(decode(raw, 5, 10)),
    3 => Some(decode(raw, 7, 16)),
    4 => Some(decode(raw, 8, 23)),
    8 => Some(decode(raw, 11, 52)),
    _ => None,
  }
}
