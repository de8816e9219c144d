//! Bucket-addressing helpers shared by the server's simple hashing and the
//! client's cuckoo hashing. Both sides must hash identically, down to the
//! MurmurHash input being the ASCII decimal rendering of the fingerprint's
//! left part.

use std::io::Cursor;

use crate::errors::{Error, Result};
use crate::parameters::Parameters;

/// MurmurHash3 (x86, 32-bit) of the decimal rendering of `left`, keeping
/// the top `output_bits` bits.
pub fn truncated_murmur(left: u64, seed: u32, output_bits: usize) -> Result<u64> {
  let digits = left.to_string();
  let hash = murmur3::murmur3_32(&mut Cursor::new(digits.as_bytes()), seed)
    .map_err(|e| Error::Crypto(format!("murmur3: {}", e)))?;
  Ok((hash >> (32 - output_bits)) as u64)
}

/// Bucket index for `item`: `murmur(item_left) xor item_right`, where
/// `item = item_left || item_right` split at `output_bits`.
pub fn bin_location(params: &Parameters, seed: u32, item: u64) -> Result<usize> {
  let item_left = item >> params.output_bits;
  let item_right = item & ((1 << params.output_bits) - 1);
  let hashed = truncated_murmur(item_left, seed, params.output_bits)?;
  Ok((hashed ^ item_right) as usize)
}

/// Tags a fingerprint with the index of the hash function that placed it:
/// `item_left || index`.
pub fn left_and_index(params: &Parameters, item: u64, index: usize) -> u64 {
  ((item >> params.output_bits) << params.log_no_hashes()) + index as u64
}

/// Recovers the hash index from a tagged fingerprint.
pub fn extract_index(params: &Parameters, tagged: u64) -> usize {
  (tagged & ((1 << params.log_no_hashes()) - 1)) as usize
}

/// Inverts [`left_and_index`] given the bucket the tag sits in and the seed
/// of the hash that placed it: the right part is recomputed as
/// `murmur(item_left) xor location`.
pub fn reconstruct_item(
  params: &Parameters,
  tagged: u64,
  location: usize,
  seed: u32,
) -> Result<u64> {
  let item_left = tagged >> params.log_no_hashes();
  let hashed = truncated_murmur(item_left, seed, params.output_bits)?;
  let item_right = hashed ^ location as u64;
  Ok((item_left << params.output_bits) + item_right)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn locations_fit_the_table() {
    let params = Parameters::default();
    for item in [0u64, 1, 0x1234_5678_9a, (1 << params.sigma_max()) - 1] {
      for &seed in &params.hash_seeds {
        let loc = bin_location(&params, seed, item).unwrap();
        assert!(loc < params.number_of_bins());
      }
    }
  }

  #[test]
  fn murmur_is_deterministic_and_truncated() {
    let params = Parameters::default();
    let a = truncated_murmur(987654321, params.hash_seeds[0], params.output_bits).unwrap();
    let b = truncated_murmur(987654321, params.hash_seeds[0], params.output_bits).unwrap();
    assert_eq!(a, b);
    assert!(a < params.number_of_bins() as u64);
    // Different seeds should disagree on at least one of a handful of inputs.
    let mut differs = false;
    for item in 0..16u64 {
      let x = truncated_murmur(item, params.hash_seeds[0], params.output_bits).unwrap();
      let y = truncated_murmur(item, params.hash_seeds[1], params.output_bits).unwrap();
      differs |= x != y;
    }
    assert!(differs);
  }

  #[test]
  fn reconstruct_inverts_tagging() {
    let params = Parameters::default();
    let fingerprint = 0x00ab_cdef_1234u64 & ((1 << params.sigma_max()) - 1);
    for index in 0..params.number_of_hashes() {
      let seed = params.hash_seeds[index];
      let loc = bin_location(&params, seed, fingerprint).unwrap();
      let tagged = left_and_index(&params, fingerprint, index);
      assert_eq!(extract_index(&params, tagged), index);
      let back = reconstruct_item(&params, tagged, loc, seed).unwrap();
      assert_eq!(back, fingerprint);
    }
  }
}
