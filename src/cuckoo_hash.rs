//! Client-side cuckoo hashing: one tagged fingerprint per slot, eviction on
//! collision. The evicted occupant is re-inserted under one of its other
//! hash functions; the chain is bounded so a misparameterised table fails
//! loudly instead of looping.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::errors::{Error, Result};
use crate::hashing::{bin_location, extract_index, left_and_index, reconstruct_item};
use crate::parameters::Parameters;

pub struct Cuckoo<'a> {
  params: &'a Parameters,
  slots: Vec<Option<u64>>,
  insert_index: usize,
  eviction_limit: usize,
  rng: SmallRng,
}

impl<'a> Cuckoo<'a> {
  pub fn new(params: &'a Parameters) -> Self {
    let mut rng = SmallRng::from_entropy();
    let insert_index = rng.gen_range(0..params.number_of_hashes());
    Self {
      params,
      slots: vec![None; params.number_of_bins()],
      insert_index,
      // 8 * log2(number of slots) displacements per insertion.
      eviction_limit: 8 * params.output_bits,
      rng,
    }
  }

  /// A hash index drawn uniformly from all hashes except `exclude`.
  fn other_index(&mut self, exclude: usize) -> usize {
    loop {
      let candidate = self.rng.gen_range(0..self.params.number_of_hashes());
      if candidate != exclude {
        return candidate;
      }
    }
  }

  /// Inserts a fingerprint, displacing existing occupants as needed.
  pub fn insert(&mut self, fingerprint: u64) -> Result<()> {
    let mut item = fingerprint;
    let mut depth = 0;
    loop {
      let seed = self.params.hash_seeds[self.insert_index];
      let loc = bin_location(self.params, seed, item)?;
      let tagged = left_and_index(self.params, item, self.insert_index);
      let evicted = self.slots[loc].replace(tagged);
      match evicted {
        None => {
          self.insert_index = self.rng.gen_range(0..self.params.number_of_hashes());
          return Ok(());
        }
        Some(previous) => {
          let previous_index = extract_index(self.params, previous);
          self.insert_index = self.other_index(previous_index);
          if depth >= self.eviction_limit {
            return Err(Error::CapacityExceeded("cuckoo hashing aborted"));
          }
          depth += 1;
          item = reconstruct_item(
            self.params,
            previous,
            loc,
            self.params.hash_seeds[previous_index],
          )?;
        }
      }
    }
  }

  /// Slot contents: a tagged fingerprint, or `None` for an empty slot
  /// (windowed as the client dummy sentinel).
  pub fn slots(&self) -> &[Option<u64>] {
    &self.slots
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  fn sample_fingerprints(params: &Parameters, n: usize) -> Vec<u64> {
    let mask = (1u64 << params.sigma_max()) - 1;
    (0..n as u64)
      .map(|i| {
        i.wrapping_mul(6364136223846793005)
          .wrapping_add(1442695040888963407)
          & mask
      })
      .collect()
  }

  #[test]
  fn every_fingerprint_lands_in_exactly_one_slot() {
    let params = Parameters::default();
    let fingerprints = sample_fingerprints(&params, 500);
    let mut table = Cuckoo::new(&params);
    for &fp in &fingerprints {
      table.insert(fp).unwrap();
    }

    let occupied: Vec<u64> = table.slots().iter().flatten().copied().collect();
    assert_eq!(occupied.len(), fingerprints.len());

    // Each stored tag reconstructs to the fingerprint that produced it.
    let inserted: HashSet<u64> = fingerprints.iter().copied().collect();
    let mut recovered = HashSet::new();
    for (loc, slot) in table.slots().iter().enumerate() {
      if let Some(tag) = slot {
        let index = extract_index(&params, *tag);
        let item =
          reconstruct_item(&params, *tag, loc, params.hash_seeds[index]).unwrap();
        assert!(inserted.contains(&item));
        recovered.insert(item);
      }
    }
    assert_eq!(recovered, inserted);
  }

  #[test]
  fn overfull_table_aborts() {
    // 16 slots cannot hold 32 fingerprints.
    let params = Parameters {
      output_bits: 4,
      poly_modulus_degree: 16,
      ..Parameters::default()
    };
    let fingerprints = sample_fingerprints(&params, 32);
    let mut table = Cuckoo::new(&params);
    let result = fingerprints.iter().try_for_each(|&fp| table.insert(fp));
    assert!(matches!(result, Err(Error::CapacityExceeded(_))));
  }
}
