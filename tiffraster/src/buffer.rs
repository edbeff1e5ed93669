// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::collections::TryReserveError;

/// Allocate a vector of `len` copies of `value` without aborting the
/// process when the allocator refuses the request.
pub fn try_alloc<T: Clone>(len: usize, value: T) -> std::result::Result<Vec<T>, TryReserveError> {
  let mut buf = Vec::new();
  buf.try_reserve_exact(len)?;
  buf.resize(len, value);
  Ok(buf)
}

/// Allocate an empty vector with room for `cap` elements.
pub fn try_with_capacity<T>(cap: usize) -> std::result::Result<Vec<T>, TryReserveError> {
  let mut buf = Vec::new();
  buf.try_reserve(cap)?;
  Ok(buf)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn refuses_absurd_allocation() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert!(try_alloc(usize::MAX, 0_u8).is_err());
    assert_eq!(try_alloc(16, 7_u8)?, vec![7; 16]);
    assert!(try_with_capacity::<u8>(10)?.capacity() >= 10);
    Ok(())
  }
}
