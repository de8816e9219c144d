use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Shared protocol configuration. Both sides must agree on every field
/// because the values are baked into the server's preprocessed polynomial
/// table; the server publishes its copy on the `parameters` endpoint and
/// clients adopt it wholesale.
///
/// Derived quantities are methods rather than fields so they can never get
/// out of sync with the fields they are computed from, and so the JSON
/// encoding carries only the negotiated values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
  /// Seeds for the Murmur hash functions, one per hash. Random unsigned
  /// 32-bit integers, identical on both sides.
  pub hash_seeds: Vec<u32>,

  /// Number of output bits of the bucket-addressing hash; the table size
  /// is `2^output_bits` on both sides.
  pub output_bits: usize,

  /// BFV plaintext modulus.
  pub plain_modulus: u64,

  /// BFV polynomial modulus degree. Must equal the number of buckets so
  /// that each SIMD slot lines up with one bucket.
  pub poly_modulus_degree: usize,

  /// Server bucket capacity.
  pub bin_capacity: usize,

  /// Number of minibins each bucket is partitioned into.
  pub alpha: usize,

  /// Windowing parameter; the window base is `2^ell`.
  pub ell: usize,
}

impl Default for Parameters {
  fn default() -> Self {
    Self {
      hash_seeds: vec![3325110220, 2243899793, 1862406458],
      output_bits: 13,
      plain_modulus: 536903681,
      poly_modulus_degree: 1 << 13,
      bin_capacity: 536,
      alpha: 16,
      ell: 2,
    }
  }
}

// Floor of log2 for a positive integer.
fn log2_floor(x: u64) -> usize {
  63 - x.leading_zeros() as usize
}

impl Parameters {
  /// Number of hash functions used for simple/cuckoo hashing.
  pub fn number_of_hashes(&self) -> usize {
    self.hash_seeds.len()
  }

  /// Bit width of the hash-index tag appended to fingerprints.
  pub fn log_no_hashes(&self) -> usize {
    log2_floor(self.number_of_hashes() as u64) + 1
  }

  /// Bit length of the fingerprints both sides derive from OPRF outputs.
  pub fn sigma_max(&self) -> usize {
    log2_floor(self.plain_modulus) + self.output_bits - self.log_no_hashes()
  }

  /// Number of buckets (and cuckoo slots) on either side.
  pub fn number_of_bins(&self) -> usize {
    1 << self.output_bits
  }

  /// Window base, `2^ell`.
  pub fn base(&self) -> usize {
    1 << self.ell
  }

  /// Items per minibin. Truncating division: with the default 536/16 the
  /// last `bin_capacity mod alpha` positions of a padded bucket carry no
  /// polynomial roots, matching the deployed protocol.
  pub fn minibin_capacity(&self) -> usize {
    self.bin_capacity / self.alpha
  }

  /// Number of window columns; `minibin_capacity <= base^log_b_ell`.
  pub fn log_b_ell(&self) -> usize {
    log2_floor(self.minibin_capacity() as u64) / self.ell + 1
  }

  /// Sentinel filling empty client cuckoo slots.
  pub fn dummy_client(&self) -> u64 {
    1 << (self.sigma_max() - self.output_bits + self.log_no_hashes())
  }

  /// Sentinel padding server buckets; distinct from the client sentinel so
  /// a padded bucket can never match an empty slot.
  pub fn dummy_server(&self) -> u64 {
    self.dummy_client() + 1
  }

  /// Checks the algebraic constraints the four protocol layers rely on.
  pub fn validate(&self) -> Result<()> {
    if self.number_of_hashes() < 2 {
      return Err(Error::ParameterMismatch(
        "at least two hash seeds are required".into(),
      ));
    }
    if self.poly_modulus_degree != self.number_of_bins() {
      return Err(Error::ParameterMismatch(format!(
        "poly_modulus_degree ({}) must equal 2^output_bits ({})",
        self.poly_modulus_degree,
        self.number_of_bins()
      )));
    }
    if self.alpha == 0 || self.minibin_capacity() == 0 {
      return Err(Error::ParameterMismatch(
        "bin_capacity and alpha leave empty minibins".into(),
      ));
    }
    if self.sigma_max() <= self.output_bits + self.log_no_hashes() {
      return Err(Error::ParameterMismatch(
        "sigma_max leaves no room for the bucket index".into(),
      ));
    }
    if self.dummy_server() >= self.plain_modulus {
      return Err(Error::ParameterMismatch(
        "dummy sentinels do not fit the plaintext modulus".into(),
      ));
    }
    if self.minibin_capacity() > self.base().pow(self.log_b_ell() as u32) {
      return Err(Error::ParameterMismatch(
        "windowing cannot span the minibin capacity".into(),
      ));
    }
    Ok(())
  }
}
