use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::io::{Cursor, Write};
use tiffraster::DecodeParams;

#[path = "../tests/common/mod.rs"]
mod common;

use common::*;

const WIDTH: usize = 1024;
const HEIGHT: usize = 768;

fn rgb_file(compression: u16, strips: Vec<Vec<u8>>) -> Vec<u8> {
  TestTiff::new(WIDTH as u32, HEIGHT as u32)
    .tag(BITS_PER_SAMPLE, Val::Short(vec![8, 8, 8]))
    .short(SAMPLES_PER_PIXEL, 3)
    .short(PHOTOMETRIC, 2)
    .short(COMPRESSION, compression)
    .short(ROWS_PER_STRIP, 16)
    .strips(strips)
    .build()
}

fn strips_of(data: &[u8]) -> Vec<Vec<u8>> {
  data.chunks(WIDTH * 3 * 16).map(|c| c.to_vec()).collect()
}

fn criterion_benchmark(c: &mut Criterion) {
  let mut group = c.benchmark_group("tiff-decoder");
  // Configure Criterion.rs to detect smaller differences and increase sample size to improve
  // precision and counteract the resulting noise.
  group.significance_level(0.1).sample_size(20);

  let data = gradient_rgb(WIDTH, HEIGHT);

  let plain = rgb_file(1, strips_of(&data));
  let lzw = rgb_file(
    5,
    strips_of(&data)
      .iter()
      .map(|s| weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8).encode(s).expect("LZW encoding failed"))
      .collect(),
  );
  let deflate = rgb_file(
    8,
    strips_of(&data)
      .iter()
      .map(|s| {
        let mut encoder = libflate::zlib::Encoder::new(Vec::new()).expect("zlib encoder");
        encoder.write_all(s).expect("zlib write");
        encoder.finish().into_result().expect("zlib finish")
      })
      .collect(),
  );

  for (name, file) in [("uncompressed", &plain), ("lzw", &lzw), ("deflate", &deflate)] {
    group.bench_with_input(format!("{}_{}x{}", name, WIDTH, HEIGHT), file, |b, file| {
      b.iter(|| tiffraster::decode(&mut Cursor::new(black_box(file)), DecodeParams::default()).expect("decode failed"))
    });
  }

  group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
