// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Type to represent tiff values of type `RATIONAL`
#[derive(Clone, Debug, Default, PartialEq, Copy)]
pub struct Rational {
  pub n: u32,
  pub d: u32,
}

impl Rational {
  pub fn new(n: u32, d: u32) -> Self {
    Self { n, d }
  }

  /// Quotient of the fraction, a zero denominator yields 0.
  pub fn as_f64(&self) -> f64 {
    if self.d == 0 { 0.0 } else { self.n as f64 / self.d as f64 }
  }
}

impl Serialize for Rational {
  fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let s = format!("{}/{}", self.n, self.d);
    serializer.serialize_str(&s)
  }
}

impl<'de> Deserialize<'de> for Rational {
  fn deserialize<D>(deserializer: D) -> std::result::Result<Rational, D::Error>
  where
    D: Deserializer<'de>,
  {
    use serde::de::Error;
    let s = String::deserialize(deserializer)?;
    let values: Vec<&str> = s.split('/').collect();
    if values.len() != 2 {
      Err(D::Error::custom(format!("Invalid rational value: {}", s)))
    } else {
      Ok(Rational::new(
        values[0].parse::<u32>().map_err(D::Error::custom)?,
        values[1].parse::<u32>().map_err(D::Error::custom)?,
      ))
    }
  }
}

/// Type to represent tiff values of type `SRATIONAL`
#[derive(Clone, Debug, Default, PartialEq, Copy, Serialize, Deserialize)]
pub struct SRational {
  pub n: i32,
  pub d: i32,
}

impl SRational {
  pub fn new(n: i32, d: i32) -> Self {
    Self { n, d }
  }

  pub fn as_f64(&self) -> f64 {
    if self.d == 0 { 0.0 } else { self.n as f64 / self.d as f64 }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
  /// 8-bit unsigned integer
  Byte(Vec<u8>),
  /// 8-bit byte that contains a 7-bit ASCII code; the last byte must be zero
  Ascii(TiffAscii),
  /// 16-bit unsigned integer
  Short(Vec<u16>),
  /// 32-bit unsigned integer
  Long(Vec<u32>),
  /// Fraction stored as two 32-bit unsigned integers
  Rational(Vec<Rational>),
  /// 8-bit signed integer
  SByte(Vec<i8>),
  /// 8-bit byte that may contain anything, depending on the field
  Undefined(Vec<u8>),
  /// 16-bit signed integer
  SShort(Vec<i16>),
  /// 32-bit signed integer
  SLong(Vec<i32>),
  /// Fraction stored as two 32-bit signed integers
  SRational(Vec<SRational>),
  /// 32-bit IEEE floating point
  Float(Vec<f32>),
  /// 64-bit IEEE floating point
  Double(Vec<f64>),
  /// Unrecognized element type, the payload is not read
  Unknown(u16, Vec<u8>),
}

impl Value {
  /// Integer element at `idx`, `None` for non-integer types, negative
  /// values or out of range indices.
  pub fn get_u32(&self, idx: usize) -> Option<u32> {
    match self {
      Value::Byte(v) | Value::Undefined(v) => v.get(idx).map(|x| *x as u32),
      Value::Short(v) => v.get(idx).map(|x| *x as u32),
      Value::Long(v) => v.get(idx).copied(),
      Value::SByte(v) => v.get(idx).and_then(|x| u32::try_from(*x).ok()),
      Value::SShort(v) => v.get(idx).and_then(|x| u32::try_from(*x).ok()),
      Value::SLong(v) => v.get(idx).and_then(|x| u32::try_from(*x).ok()),
      _ => None,
    }
  }

  pub fn get_u16(&self, idx: usize) -> Option<u16> {
    self.get_u32(idx).and_then(|v| u16::try_from(v).ok())
  }

  /// Any numeric element at `idx` as `f64`.
  pub fn get_f64(&self, idx: usize) -> Option<f64> {
    match self {
      Value::Byte(v) | Value::Undefined(v) => v.get(idx).map(|x| *x as f64),
      Value::Short(v) => v.get(idx).map(|x| *x as f64),
      Value::Long(v) => v.get(idx).map(|x| *x as f64),
      Value::SByte(v) => v.get(idx).map(|x| *x as f64),
      Value::SShort(v) => v.get(idx).map(|x| *x as f64),
      Value::SLong(v) => v.get(idx).map(|x| *x as f64),
      Value::Rational(v) => v.get(idx).map(Rational::as_f64),
      Value::SRational(v) => v.get(idx).map(SRational::as_f64),
      Value::Float(v) => v.get(idx).map(|x| *x as f64),
      Value::Double(v) => v.get(idx).copied(),
      Value::Ascii(_) | Value::Unknown(..) => None,
    }
  }

  /// All elements as `u32`, `None` if any of them is not representable.
  pub fn as_u32_vec(&self) -> Option<Vec<u32>> {
    (0..self.count()).map(|i| self.get_u32(i)).collect()
  }

  pub fn count(&self) -> usize {
    match self {
      Self::Byte(v) => v.len(),
      Self::Ascii(v) => v.count(),
      Self::Short(v) => v.len(),
      Self::Long(v) => v.len(),
      Self::Rational(v) => v.len(),
      Self::SByte(v) => v.len(),
      Self::Undefined(v) => v.len(),
      Self::SShort(v) => v.len(),
      Self::SLong(v) => v.len(),
      Self::SRational(v) => v.len(),
      Self::Float(v) => v.len(),
      Self::Double(v) => v.len(),
      Self::Unknown(_, v) => v.len(),
    }
  }

  pub fn value_type(&self) -> u16 {
    match self {
      Self::Byte(_) => 1,
      Self::Ascii(_) => 2,
      Self::Short(_) => 3,
      Self::Long(_) => 4,
      Self::Rational(_) => 5,
      Self::SByte(_) => 6,
      Self::Undefined(_) => 7,
      Self::SShort(_) => 8,
      Self::SLong(_) => 9,
      Self::SRational(_) => 10,
      Self::Float(_) => 11,
      Self::Double(_) => 12,
      Self::Unknown(t, _) => *t,
    }
  }

  pub fn value_type_name(&self) -> String {
    match self {
      Self::Byte(_) => "BYTE".into(),
      Self::Ascii(_) => "ASCII".into(),
      Self::Short(_) => "SHORT".into(),
      Self::Long(_) => "LONG".into(),
      Self::Rational(_) => "RATIONAL".into(),
      Self::SByte(_) => "SBYTE".into(),
      Self::Undefined(_) => "UNDEF".into(),
      Self::SShort(_) => "SSHORT".into(),
      Self::SLong(_) => "SLONG".into(),
      Self::SRational(_) => "SRATIONAL".into(),
      Self::Float(_) => "FLOAT".into(),
      Self::Double(_) => "DOUBLE".into(),
      Self::Unknown(t, _) => format!("UNKNOWN ({})", t),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TiffAscii {
  strings: Vec<String>,
}

impl TiffAscii {
  pub fn strings(&self) -> &Vec<String> {
    &self.strings
  }

  pub fn count(&self) -> usize {
    self.strings.iter().map(|s| s.len() + 1).sum::<usize>()
  }

  /// Split a raw ASCII field at its NUL terminators.
  pub fn new_from_raw(raw: &[u8]) -> Self {
    let mut strings: Vec<String> = raw
      .split(|&c| c == b'\0')
      .filter(|s| !s.is_empty())
      .map(|s| String::from_utf8_lossy(s).into_owned())
      .collect();
    if strings.is_empty() {
      strings.push(String::new());
    }
    Self { strings }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rational_zero_denominator() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert_eq!(Rational::new(72, 0).as_f64(), 0.0);
    assert_eq!(Rational::new(300, 2).as_f64(), 150.0);
    assert_eq!(SRational::new(-3, 0).as_f64(), 0.0);
    assert_eq!(Value::Rational(vec![Rational::new(1, 4)]).get_f64(0), Some(0.25));
    Ok(())
  }

  #[test]
  fn integer_accessors() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let v = Value::Short(vec![8, 8, 8]);
    assert_eq!(v.get_u32(2), Some(8));
    assert_eq!(v.get_u32(3), None);
    assert_eq!(v.as_u32_vec(), Some(vec![8, 8, 8]));
    assert_eq!(Value::SShort(vec![-1]).get_u32(0), None);
    assert_eq!(Value::Float(vec![1.5]).get_u32(0), None);
    assert_eq!(Value::Float(vec![1.5]).get_f64(0), Some(1.5));
    Ok(())
  }

  #[test]
  fn ascii_from_raw() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let a = TiffAscii::new_from_raw(b"scanner\0v2\0");
    assert_eq!(a.strings(), &vec!["scanner".to_string(), "v2".to_string()]);
    assert_eq!(TiffAscii::new_from_raw(b"\0").strings(), &vec![String::new()]);
    Ok(())
  }
}
