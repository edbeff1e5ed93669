// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use rayon::prelude::*;

/// Undo horizontal differencing (Predictor 2) on rows of `width` pixels
/// with `cpp` interleaved 8-bit channels. Sums wrap and restart each row.
pub fn unpredict_rows(buf: &mut [u8], width: usize, cpp: usize) {
  let stride = width * cpp;
  if stride == 0 {
    return;
  }
  buf.par_chunks_mut(stride).for_each(|row| {
    for i in cpp..row.len() {
      row[i] = row[i].wrapping_add(row[i - cpp]);
    }
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_channel_rows() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut buf = vec![10, 1, 1, 250, 20, 255, 255, 0];
    unpredict_rows(&mut buf, 4, 1);
    assert_eq!(buf, vec![10, 11, 12, 6, 20, 19, 18, 18]);
    Ok(())
  }

  #[test]
  fn interleaved_channels() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut buf = vec![1, 2, 3, 1, 1, 1, 5, 5, 5];
    unpredict_rows(&mut buf, 3, 3);
    assert_eq!(buf, vec![1, 2, 3, 2, 3, 4, 7, 8, 9]);
    Ok(())
  }
}
