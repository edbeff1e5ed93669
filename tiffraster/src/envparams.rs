// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use log::warn;

pub(crate) fn tiffraster_ignore_checksum() -> bool {
  match std::env::var("TIFFRASTER_IGNORE_CHECKSUM").map(|val| val.parse::<u32>()) {
    Ok(Ok(value)) => value == 1,
    Ok(Err(_)) => {
      warn!("Invalid value for TIFFRASTER_IGNORE_CHECKSUM");
      false
    }
    Err(_) => false,
  }
}

pub(crate) fn tiffraster_single_thread() -> bool {
  match std::env::var("TIFFRASTER_SINGLE_THREAD").map(|val| val.parse::<u32>()) {
    Ok(Ok(value)) => value == 1,
    Ok(Err(_)) => {
      warn!("Invalid value for TIFFRASTER_SINGLE_THREAD");
      false
    }
    Err(_) => false,
  }
}
