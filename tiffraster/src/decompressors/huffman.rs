// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use super::{CodecError, Result};
use crate::pumps::BitPump;

/// Longest code length allowed by deflate
pub const MAX_CODE_LEN: usize = 15;

/// Child slot of a tree node
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Link {
  Empty,
  Node(u32),
  Leaf(u16),
}

/// Binary decode tree stored as a flat table of nodes.
///
/// Node 0 is the root, each node holds the links for bit 0 and bit 1.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
  nodes: Vec<[Link; 2]>,
}

impl Default for HuffmanTree {
  fn default() -> Self {
    Self::new()
  }
}

impl HuffmanTree {
  pub fn new() -> Self {
    Self {
      nodes: vec![[Link::Empty; 2]],
    }
  }

  /// Add `symbol` for the `len` bit `code`, most significant bit first.
  pub fn insert(&mut self, code: u32, len: u32, symbol: u16) -> Result<()> {
    if len == 0 || len > 32 {
      return Err(CodecError::Corrupt(format!("Invalid code length {}", len)));
    }
    let mut node = 0;
    for i in (0..len).rev() {
      let bit = ((code >> i) & 1) as usize;
      let last = i == 0;
      match self.nodes[node][bit] {
        Link::Empty if last => self.nodes[node][bit] = Link::Leaf(symbol),
        Link::Empty => {
          let next = self.nodes.len();
          self.nodes.try_reserve(1)?;
          self.nodes.push([Link::Empty; 2]);
          self.nodes[node][bit] = Link::Node(next as u32);
          node = next;
        }
        Link::Node(next) if !last => node = next as usize,
        _ => return Err(CodecError::Corrupt(format!("Code {:0width$b} collides with an existing code", code, width = len as usize))),
      }
    }
    Ok(())
  }

  /// Add `symbol` for a code written as a string of '0' and '1'.
  pub fn insert_str(&mut self, bits: &str, symbol: u16) -> Result<()> {
    let code = u32::from_str_radix(bits, 2).map_err(|e| CodecError::Corrupt(format!("Invalid code string {}: {}", bits, e)))?;
    self.insert(code, bits.len() as u32, symbol)
  }

  /// Build a canonical tree from code lengths, `lengths[symbol]` is the
  /// length of the code for `symbol`, 0 means unused.
  ///
  /// Oversubscribed sets are rejected, incomplete ones are accepted.
  pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
    let mut bl_count = [0_u32; MAX_CODE_LEN + 1];
    for &len in lengths {
      if len as usize > MAX_CODE_LEN {
        return Err(CodecError::Corrupt(format!("Code length {} exceeds {}", len, MAX_CODE_LEN)));
      }
      bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut left: i64 = 1;
    for count in bl_count.iter().skip(1) {
      left = (left << 1) - *count as i64;
      if left < 0 {
        return Err(CodecError::Corrupt("Oversubscribed code length set".to_string()));
      }
    }

    let mut next_code = [0_u32; MAX_CODE_LEN + 1];
    let mut code = 0;
    for bits in 1..=MAX_CODE_LEN {
      code = (code + bl_count[bits - 1]) << 1;
      next_code[bits] = code;
    }

    let mut tree = Self::new();
    for (symbol, &len) in lengths.iter().enumerate() {
      if len != 0 {
        let code = next_code[len as usize];
        next_code[len as usize] += 1;
        tree.insert(code, len as u32, symbol as u16)?;
      }
    }
    Ok(tree)
  }

  /// Walk the tree with bits from `pump` until a leaf is reached.
  pub fn decode(&self, pump: &mut BitPump) -> Result<u16> {
    let mut node = 0;
    loop {
      let bit = pump.get_bit().ok_or(CodecError::Truncated)? as usize;
      match self.nodes[node][bit] {
        Link::Leaf(symbol) => return Ok(symbol),
        Link::Node(next) => node = next as usize,
        Link::Empty => return Err(CodecError::Corrupt("Invalid code".to_string())),
      }
    }
  }
}
