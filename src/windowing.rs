//! Windowed power encoding. A slot value `y` is shipped as the sparse set
//! of powers `y^((i+1) * base^j)`, enough for the server to rebuild every
//! power up to `minibin_capacity` with a multiplication tree of depth at
//! most `log_b_ell`, which keeps BFV noise growth bounded.

use crate::parameters::Parameters;

/// `base^exponent mod modulus` over u64 operands.
pub fn pow_mod(mut base: u64, mut exponent: u64, modulus: u64) -> u64 {
  let mut acc = 1u64 % modulus;
  base %= modulus;
  while exponent > 0 {
    if exponent & 1 == 1 {
      acc = ((acc as u128 * base as u128) % modulus as u128) as u64;
    }
    base = ((base as u128 * base as u128) % modulus as u128) as u64;
    exponent >>= 1;
  }
  acc
}

/// The `(base - 1) x log_b_ell` window matrix of `y`: entry `(i, j)` holds
/// `y^((i+1) * base^j) mod plain_modulus` when that exponent stays within
/// the minibin capacity, and is absent otherwise.
pub fn window_matrix(params: &Parameters, y: u64) -> Vec<Vec<Option<u64>>> {
  let bound = params.minibin_capacity();
  (0..params.base() - 1)
    .map(|i| {
      (0..params.log_b_ell())
        .map(|j| {
          let exponent = (i + 1) * params.base().pow(j as u32);
          if exponent - 1 < bound {
            Some(pow_mod(y, exponent as u64, params.plain_modulus))
          } else {
            None
          }
        })
        .collect()
    })
    .collect()
}

/// Packs per-slot window matrices into one plaintext vector per present
/// grid position: entry `(i, j)` is the vector whose slot `k` holds the
/// `(i, j)` window of cuckoo slot `k`. Empty cuckoo slots window the client
/// dummy sentinel.
pub fn pack_query(params: &Parameters, slots: &[Option<u64>]) -> Vec<Vec<Option<Vec<u64>>>> {
  let dummy = params.dummy_client();
  let windows: Vec<Vec<Vec<Option<u64>>>> = slots
    .iter()
    .map(|slot| window_matrix(params, slot.unwrap_or(dummy)))
    .collect();

  (0..params.base() - 1)
    .map(|i| {
      (0..params.log_b_ell())
        .map(|j| {
          windows[0][i][j]?;
          Some(windows.iter().map(|w| w[i][j].unwrap_or(0)).collect())
        })
        .collect()
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::poly::base_decomposition;

  #[test]
  fn present_positions_follow_the_exponent_bound() {
    let params = Parameters::default();
    let matrix = window_matrix(&params, 123456789);
    assert_eq!(matrix.len(), params.base() - 1);
    for (i, row) in matrix.iter().enumerate() {
      assert_eq!(row.len(), params.log_b_ell());
      for (j, entry) in row.iter().enumerate() {
        let exponent = (i + 1) * params.base().pow(j as u32);
        assert_eq!(entry.is_some(), exponent - 1 < params.minibin_capacity());
      }
    }
    // Defaults: exponents 1,2,3, 4,8,12, 16,32 are present.
    let present: usize = matrix.iter().flatten().filter(|e| e.is_some()).count();
    assert_eq!(present, 8);
  }

  #[test]
  fn windows_reconstruct_every_power() {
    let params = Parameters::default();
    let y = 87654321u64;
    let matrix = window_matrix(&params, y);
    for exponent in 1..=params.minibin_capacity() {
      let mut product = 1u64;
      for (j, digit) in base_decomposition(exponent, params.base()).iter().enumerate() {
        if *digit >= 1 {
          let windowed = matrix[digit - 1][j].unwrap();
          product =
            ((product as u128 * windowed as u128) % params.plain_modulus as u128) as u64;
        }
      }
      assert_eq!(product, pow_mod(y, exponent as u64, params.plain_modulus));
    }
  }

  #[test]
  fn packed_query_lines_up_slots() {
    let params = Parameters {
      output_bits: 4,
      poly_modulus_degree: 16,
      bin_capacity: 40,
      alpha: 8,
      ..Parameters::default()
    };
    let mut slots = vec![None; params.number_of_bins()];
    slots[3] = Some(0x1234u64);
    slots[9] = Some(0x5678u64);
    let packed = pack_query(&params, &slots);
    assert_eq!(packed.len(), params.base() - 1);
    for row in &packed {
      assert_eq!(row.len(), params.log_b_ell());
    }
    let first = packed[0][0].as_ref().unwrap();
    assert_eq!(first.len(), params.number_of_bins());
    assert_eq!(first[3], 0x1234 % params.plain_modulus);
    assert_eq!(first[9], 0x5678);
    assert_eq!(first[0], params.dummy_client() % params.plain_modulus);
  }
}
