use std::env;
use std::fs::File;
use std::io::BufReader;

fn main() {
  let args: Vec<_> = env::args().collect();
  if args.len() != 2 {
    println!("Usage: {} <file>", args[0]);
    std::process::exit(2);
  }
  let file = &args[1];
  let mut reader = match File::open(file) {
    Ok(f) => BufReader::new(f),
    Err(e) => {
      println!("FAILED {}: {}", file, e);
      std::process::exit(1);
    }
  };
  match tiffraster::read_header(&mut reader) {
    Ok(header) => {
      println!(
        "{}x{}, {} samples of {:?} bits, {:?}, compression {}, {}",
        header.width,
        header.height,
        header.samples_per_pixel,
        header.bits_per_sample,
        header.photometric,
        header.compression,
        if header.is_tiled() { "tiled" } else { "stripped" }
      );
    }
    Err(e) => {
      println!("FAILED {}: {}", file, e);
      std::process::exit(1);
    }
  }
  match tiffraster::decode_file(file) {
    Ok(image) => println!("OK {} ({} bytes of {:?})", file, image.data.len(), image.format),
    Err(e) => println!("FAILED {}: {}", file, e),
  }
}
