//! Server-side simple hashing: every fingerprint is inserted once per hash
//! function, tagged with the index of the hash that placed it, into a table
//! of fixed-capacity buckets.

use crate::errors::{Error, Result};
use crate::hashing::{bin_location, left_and_index};
use crate::parameters::Parameters;

pub struct SimpleHash<'a> {
  params: &'a Parameters,
  bins: Vec<Vec<u64>>,
}

impl<'a> SimpleHash<'a> {
  pub fn new(params: &'a Parameters) -> Self {
    Self {
      params,
      bins: vec![Vec::new(); params.number_of_bins()],
    }
  }

  /// Inserts `item` using hash `index` at the location it selects.
  pub fn insert(&mut self, item: u64, index: usize) -> Result<()> {
    let seed = self.params.hash_seeds[index];
    let loc = bin_location(self.params, seed, item)?;
    if self.bins[loc].len() >= self.params.bin_capacity {
      return Err(Error::CapacityExceeded("simple hashing aborted"));
    }
    self.bins[loc].push(left_and_index(self.params, item, index));
    Ok(())
  }

  /// Inserts `item` once per hash function.
  pub fn insert_all_hashes(&mut self, item: u64) -> Result<()> {
    for index in 0..self.params.number_of_hashes() {
      self.insert(item, index)?;
    }
    Ok(())
  }

  /// Total number of stored (non-dummy) entries.
  pub fn occupancy(&self) -> usize {
    self.bins.iter().map(Vec::len).sum()
  }

  /// The table with every bucket padded to exactly `bin_capacity` entries
  /// with the server dummy sentinel.
  pub fn padded(&self) -> Vec<Vec<u64>> {
    let dummy = self.params.dummy_server();
    self
      .bins
      .iter()
      .map(|bin| {
        let mut row = bin.clone();
        row.resize(self.params.bin_capacity, dummy);
        row
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn occupancy_counts_every_hash_copy() {
    let params = Parameters::default();
    let mut table = SimpleHash::new(&params);
    let items: Vec<u64> = (0..200u64).map(|i| i * 7919 + 13).collect();
    for &item in &items {
      table.insert_all_hashes(item).unwrap();
    }
    assert_eq!(table.occupancy(), items.len() * params.number_of_hashes());

    let padded = table.padded();
    assert_eq!(padded.len(), params.number_of_bins());
    for row in &padded {
      assert_eq!(row.len(), params.bin_capacity);
    }
    let dummies: usize = padded
      .iter()
      .flatten()
      .filter(|&&v| v == params.dummy_server())
      .count();
    assert_eq!(
      dummies,
      params.number_of_bins() * params.bin_capacity - table.occupancy()
    );
  }

  #[test]
  fn overfull_bucket_aborts() {
    // A 16-bucket table with capacity 2 cannot absorb 20 items three times.
    let params = Parameters {
      output_bits: 4,
      poly_modulus_degree: 16,
      bin_capacity: 2,
      alpha: 1,
      ..Parameters::default()
    };
    let mut table = SimpleHash::new(&params);
    let result = (0..20u64).try_for_each(|i| table.insert_all_hashes(i * 104729 + 7));
    assert!(matches!(result, Err(Error::CapacityExceeded(_))));
  }
}
