//! Server side of the protocol: preprocessing of the (large, static)
//! server set into the per-bucket polynomial table, the online OPRF
//! evaluation, and the homomorphic evaluation of encrypted queries.

use std::collections::BTreeSet;

use fhe::bfv::Ciphertext;
use fhe_traits::Serialize as FheSerialize;
use num_bigint::BigUint;
use p192::{ProjectivePoint, Scalar};
use rayon::prelude::*;

use crate::errors::{Error, Result};
use crate::he::EvaluationContext;
use crate::oprf::{scalar_from_biguint, EcPoint, Oprf};
use crate::parameters::Parameters;
use crate::poly::{base_decomposition, bucket_polynomials, transpose};
use crate::simple_hash::SimpleHash;

/// Long-lived server state: the OPRF key and, once [`Server::preprocess`]
/// has run (or a persisted table has been restored), the transposed
/// polynomial table. The table is read-only during queries, so one server
/// value can be shared across concurrent sessions.
pub struct Server {
  parameters: Parameters,
  oprf: Oprf,
  key: Scalar,
  key_point: ProjectivePoint,
  table: Option<Vec<Vec<u64>>>,
}

impl Server {
  pub fn new(parameters: Parameters, oprf_key: &BigUint) -> Result<Self> {
    parameters.validate()?;
    let oprf = Oprf::new(&parameters);
    let key = scalar_from_biguint(oprf_key)?;
    let key_point = oprf.key_point(oprf_key)?;
    Ok(Self {
      parameters,
      oprf,
      key,
      key_point,
      table: None,
    })
  }

  /// Restores a server from a persisted polynomial table. The table must
  /// have been produced by [`Server::preprocess`] under the same
  /// parameters and OPRF key.
  pub fn from_parts(
    parameters: Parameters,
    oprf_key: &BigUint,
    table: Vec<Vec<u64>>,
  ) -> Result<Self> {
    let mut server = Self::new(parameters, oprf_key)?;
    let width = server.parameters.alpha * (server.parameters.minibin_capacity() + 1);
    if table.len() != width
      || table
        .iter()
        .any(|row| row.len() != server.parameters.number_of_bins())
    {
      return Err(Error::ParameterMismatch(
        "polynomial table shape does not match the parameters".into(),
      ));
    }
    server.table = Some(table);
    Ok(server)
  }

  pub fn parameters(&self) -> &Parameters {
    &self.parameters
  }

  /// The transposed polynomial table, if preprocessing has run.
  pub fn polynomial_table(&self) -> Option<&Vec<Vec<u64>>> {
    self.table.as_ref()
  }

  /// Offline phase: OPRF the server set, bucket the fingerprints with
  /// simple hashing, turn every minibin into its vanishing polynomial and
  /// store the transposed coefficient table.
  pub fn preprocess(&mut self, server_set: &[u64]) -> Result<()> {
    let fingerprints = self.oprf.server_offline(server_set, &self.key_point)?;
    // Deduplicate; a BTreeSet keeps the table reproducible for a given
    // (set, parameters, key) triple.
    let unique: BTreeSet<u64> = fingerprints.into_iter().collect();

    let mut hashed = SimpleHash::new(&self.parameters);
    for &fingerprint in &unique {
      hashed.insert_all_hashes(fingerprint)?;
    }
    let polynomials = bucket_polynomials(&self.parameters, &hashed.padded());
    self.table = Some(transpose(&polynomials));
    Ok(())
  }

  /// Online OPRF: multiplies each blinded client point by the server key.
  pub fn oprf(&self, points: &[EcPoint]) -> Result<Vec<EcPoint>> {
    self.oprf.server_online(&self.key, points)
  }

  /// Evaluates an encrypted query: rebuilds the missing powers from the
  /// windowed ciphertext grid, then dot-multiplies every minibin's
  /// coefficient rows against them, slot-wise across all buckets at once.
  /// Returns `alpha` serialised ciphertexts in minibin order.
  pub fn query(
    &self,
    public_context: &[u8],
    enc_query: &[Vec<Option<Vec<u8>>>],
  ) -> Result<Vec<Vec<u8>>> {
    let table = self
      .table
      .as_ref()
      .ok_or_else(|| Error::Protocol("server set has not been preprocessed".into()))?;
    let context = EvaluationContext::from_bytes(public_context, &self.parameters)?;
    let grid = self.parse_query(&context, enc_query)?;
    let powers = self.reconstruct_powers(&context, &grid)?;

    let capacity = self.parameters.minibin_capacity();
    let width = capacity + 1;
    (0..self.parameters.alpha)
      .into_par_iter()
      .map(|minibin| {
        // Leading coefficient is 1: start from y^capacity and walk the
        // coefficient rows down to the constant term.
        let mut acc = powers[capacity - 1].clone();
        for m in 1..capacity {
          let row = context.plaintext(&table[width * minibin + m])?;
          acc = &acc + &(&powers[capacity - m - 1] * &row);
        }
        let constant = context.encrypt(&table[width * minibin + capacity])?;
        acc = &acc + &constant;
        Ok(acc.to_bytes())
      })
      .collect()
  }

  /// Deserialises the ciphertext grid, checking its shape: `(base - 1)`
  /// rows of `log_b_ell` entries, populated exactly at the positions whose
  /// exponent stays within the minibin capacity.
  fn parse_query(
    &self,
    context: &EvaluationContext,
    enc_query: &[Vec<Option<Vec<u8>>>],
  ) -> Result<Vec<Vec<Option<Ciphertext>>>> {
    let base = self.parameters.base();
    let columns = self.parameters.log_b_ell();
    let capacity = self.parameters.minibin_capacity();
    if enc_query.len() != base - 1 || enc_query.iter().any(|row| row.len() != columns) {
      return Err(Error::Protocol(format!(
        "encrypted query must be a {}x{} grid",
        base - 1,
        columns
      )));
    }
    enc_query
      .iter()
      .enumerate()
      .map(|(i, row)| {
        row
          .iter()
          .enumerate()
          .map(|(j, cell)| {
            let in_window = (i + 1) * base.pow(j as u32) - 1 < capacity;
            match cell {
              Some(bytes) if in_window => Ok(Some(context.ciphertext_from_bytes(bytes)?)),
              None if !in_window => Ok(None),
              Some(_) => Err(Error::Protocol(format!(
                "unexpected ciphertext at window position ({}, {})",
                i, j
              ))),
              None => Err(Error::Protocol(format!(
                "missing ciphertext at window position ({}, {})",
                i, j
              ))),
            }
          })
          .collect()
      })
      .collect()
  }

  /// Rebuilds `Enc(y^1) ... Enc(y^capacity)` from the windowed grid; powers
  /// the client did not transmit are products of the ones it did, combined
  /// in a balanced tree to keep the multiplicative depth minimal.
  fn reconstruct_powers(
    &self,
    context: &EvaluationContext,
    grid: &[Vec<Option<Ciphertext>>],
  ) -> Result<Vec<Ciphertext>> {
    let base = self.parameters.base();
    let capacity = self.parameters.minibin_capacity();
    (1..=capacity)
      .into_par_iter()
      .map(|exponent| {
        let operands: Result<Vec<Ciphertext>> = base_decomposition(exponent, base)
          .iter()
          .enumerate()
          .filter(|(_, digit)| **digit >= 1)
          .map(|(j, digit)| {
            grid[digit - 1][j].clone().ok_or_else(|| {
              Error::Protocol(format!(
                "window position ({}, {}) needed for power {} is absent",
                digit - 1,
                j,
                exponent
              ))
            })
          })
          .collect();
        context.multiply_tree(operands?)
      })
      .collect()
  }
}
