//! Plain polynomial arithmetic for the server's preprocessed table: each
//! minibin is represented by the monic polynomial vanishing on its entries,
//! with coefficients modulo the BFV plaintext modulus.

use crate::parameters::Parameters;

/// Coefficients of `prod (X - r)` over `Z_modulus`, highest degree first
/// (the leading coefficient is always 1). This is the order the table is
/// persisted and dot-multiplied in.
pub fn coeffs_from_roots(roots: &[u64], modulus: u64) -> Vec<u64> {
  let mut coeffs = vec![1u64];
  for &root in roots {
    let negated = (modulus - root % modulus) % modulus;
    let mut next = vec![0u64; coeffs.len() + 1];
    for (i, &c) in coeffs.iter().enumerate() {
      next[i] = (next[i] + c) % modulus;
      next[i + 1] =
        ((next[i + 1] as u128 + c as u128 * negated as u128) % modulus as u128) as u64;
    }
    coeffs = next;
  }
  coeffs
}

/// Digits of `n` in the given base, least significant first. Zero has a
/// single zero digit.
pub fn base_decomposition(mut n: usize, base: usize) -> Vec<usize> {
  let mut digits = Vec::new();
  loop {
    digits.push(n % base);
    n /= base;
    if n == 0 {
      return digits;
    }
  }
}

/// Builds the per-bucket polynomial matrix from a padded simple-hash table:
/// row `i` is the concatenation over minibins `j` of the
/// `minibin_capacity + 1` coefficients of minibin `j`'s polynomial.
pub fn bucket_polynomials(params: &Parameters, padded: &[Vec<u64>]) -> Vec<Vec<u64>> {
  let capacity = params.minibin_capacity();
  padded
    .iter()
    .map(|bin| {
      let mut row = Vec::with_capacity(params.alpha * (capacity + 1));
      for j in 0..params.alpha {
        let roots = &bin[j * capacity..(j + 1) * capacity];
        row.extend(coeffs_from_roots(roots, params.plain_modulus));
      }
      row
    })
    .collect()
}

/// Swaps a row-major matrix into column-major order, so one row of the
/// result multiplies the same coefficient across every bucket slot-wise.
pub fn transpose(matrix: &[Vec<u64>]) -> Vec<Vec<u64>> {
  let width = matrix[0].len();
  let mut swapped = vec![Vec::with_capacity(matrix.len()); width];
  for row in matrix {
    for (i, &value) in row.iter().enumerate() {
      swapped[i].push(value);
    }
  }
  swapped
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::windowing::pow_mod;

  const MODULUS: u64 = 536903681;

  fn evaluate(coeffs: &[u64], x: u64) -> u64 {
    // Horner, highest degree first.
    coeffs.iter().fold(0u64, |acc, &c| {
      ((acc as u128 * x as u128 + c as u128) % MODULUS as u128) as u64
    })
  }

  #[test]
  fn small_polynomial_has_expected_coefficients() {
    // (X - 2)(X - 3) = X^2 - 5X + 6
    let coeffs = coeffs_from_roots(&[2, 3], MODULUS);
    assert_eq!(coeffs, vec![1, MODULUS - 5, 6]);
  }

  #[test]
  fn polynomial_vanishes_exactly_on_its_roots() {
    let roots: Vec<u64> = (0..33u64).map(|i| i * 999983 + 17).collect();
    let coeffs = coeffs_from_roots(&roots, MODULUS);
    assert_eq!(coeffs.len(), roots.len() + 1);
    assert_eq!(coeffs[0], 1);
    for &r in &roots {
      assert_eq!(evaluate(&coeffs, r), 0);
    }
    assert_ne!(evaluate(&coeffs, 424242), 0);
  }

  #[test]
  fn decomposition_recomposes() {
    for n in 0..200 {
      let digits = base_decomposition(n, 4);
      let back: usize = digits
        .iter()
        .enumerate()
        .map(|(j, d)| d * 4usize.pow(j as u32))
        .sum();
      assert_eq!(back, n);
    }
    assert_eq!(base_decomposition(0, 4), vec![0]);
  }

  #[test]
  fn transpose_swaps_axes() {
    let matrix = vec![vec![1, 2, 3], vec![4, 5, 6]];
    assert_eq!(transpose(&matrix), vec![vec![1, 4], vec![2, 5], vec![3, 6]]);
  }

  #[test]
  fn powers_times_coefficients_recover_evaluation() {
    // The server-side dot product pairs column m with y^(capacity - m);
    // spot-check that convention against direct evaluation.
    let params = Parameters::default();
    let capacity = params.minibin_capacity();
    let roots: Vec<u64> = (0..capacity as u64).map(|i| i * 31337 + 5).collect();
    let coeffs = coeffs_from_roots(&roots, MODULUS);
    let y = 192837465u64;
    let mut acc = pow_mod(y, capacity as u64, MODULUS);
    for m in 1..capacity {
      let power = pow_mod(y, (capacity - m) as u64, MODULUS);
      acc = ((acc as u128 + coeffs[m] as u128 * power as u128) % MODULUS as u128) as u64;
    }
    acc = ((acc as u128 + coeffs[capacity] as u128) % MODULUS as u128) as u64;
    assert_eq!(acc, evaluate(&coeffs, y));
  }
}
