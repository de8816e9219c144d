//! Client side of the protocol. A [`Client`] drives the three round trips
//! through a [`ClientHelper`] — the seam that separates the cryptographic
//! core from the transport, so the same orchestration runs against a
//! remote HTTP server or an in-process one.

use num_bigint::BigUint;
use rayon::prelude::*;

use crate::cuckoo_hash::Cuckoo;
use crate::errors::{Error, Result};
use crate::hashing::{extract_index, reconstruct_item};
use crate::he::ClientHeContext;
use crate::oprf::{EcPoint, Oprf};
use crate::parameters::Parameters;
use crate::windowing::pack_query;

/// The two operations a client needs from a server, over serialised
/// ciphertexts. `oprf` must complete before `run_query` is issued.
pub trait ClientHelper {
  /// Evaluates the server OPRF key over blinded points, order-preserving.
  fn oprf(&self, points: &[EcPoint]) -> Result<Vec<EcPoint>>;

  /// Runs an encrypted query; returns `alpha` serialised ciphertexts in
  /// minibin order.
  fn run_query(
    &self,
    public_context: &[u8],
    enc_query: &[Vec<Option<Vec<u8>>>],
  ) -> Result<Vec<Vec<u8>>>;
}

/// Ephemeral per-session client state: the OPRF blinding key and a fresh
/// BFV context.
pub struct Client<H: ClientHelper> {
  parameters: Parameters,
  helper: H,
  oprf: Oprf,
  key: BigUint,
  he: ClientHeContext,
}

impl<H: ClientHelper + Sync> Client<H> {
  /// Builds a client for the given (server-negotiated) parameters. When no
  /// OPRF key is supplied a fresh one is drawn from the OS generator,
  /// which is what sessions normally want.
  pub fn new(parameters: Parameters, helper: H, oprf_key: Option<BigUint>) -> Result<Self> {
    parameters.validate()?;
    let oprf = Oprf::new(&parameters);
    let key = oprf_key.unwrap_or_else(|| oprf.random_key());
    let he = ClientHeContext::new(&parameters)?;
    Ok(Self {
      parameters,
      helper,
      oprf,
      key,
      he,
    })
  }

  pub fn parameters(&self) -> &Parameters {
    &self.parameters
  }

  /// Blinds the client set with the session key. The result only depends
  /// on the set and the key, so callers may compute it once and reuse it.
  pub fn preprocess_oprf(&self, client_set: &[u64]) -> Result<Vec<EcPoint>> {
    let key_point = self.oprf.key_point(&self.key)?;
    self.oprf.client_offline(client_set, &key_point)
  }

  /// Runs the online protocol over an already-blinded set and returns the
  /// indices (into the blinded set) of the items the server also holds,
  /// sorted and deduplicated.
  pub fn run(&self, blinded: &[EcPoint]) -> Result<Vec<usize>> {
    if blinded.is_empty() {
      return Ok(Vec::new());
    }

    let evaluated = self.helper.oprf(blinded)?;
    if evaluated.len() != blinded.len() {
      return Err(Error::Protocol(format!(
        "OPRF response holds {} points for {} sent",
        evaluated.len(),
        blinded.len()
      )));
    }
    let key_inverse = self.oprf.invert_key(&self.key)?;
    let fingerprints = self.oprf.client_online(&key_inverse, &evaluated)?;

    let mut cuckoo = Cuckoo::new(&self.parameters);
    for &fingerprint in &fingerprints {
      cuckoo.insert(fingerprint)?;
    }

    let enc_query: Vec<Vec<Option<Vec<u8>>>> = pack_query(&self.parameters, cuckoo.slots())
      .iter()
      .map(|row| {
        row
          .iter()
          .map(|cell| {
            cell
              .as_ref()
              .map(|values| self.he.encrypt(values))
              .transpose()
          })
          .collect()
      })
      .collect::<Result<_>>()?;

    let answers = self
      .helper
      .run_query(&self.he.public_bytes()?, &enc_query)?;
    if answers.len() != self.parameters.alpha {
      return Err(Error::Protocol(format!(
        "expected {} answer ciphertexts, got {}",
        self.parameters.alpha,
        answers.len()
      )));
    }
    let decryptions: Vec<Vec<u64>> = answers
      .par_iter()
      .map(|bytes| self.he.decrypt(bytes))
      .collect::<Result<_>>()?;

    self.decode_matches(&decryptions, &cuckoo, &fingerprints)
  }

  /// A zero in slot `k` of any minibin's decryption means the fingerprint
  /// in cuckoo slot `k` is a root of the corresponding bucket polynomial.
  /// The slot's tag is mapped back to its position in the post-OPRF
  /// fingerprint list, which is also its position in the client set.
  fn decode_matches(
    &self,
    decryptions: &[Vec<u64>],
    cuckoo: &Cuckoo,
    fingerprints: &[u64],
  ) -> Result<Vec<usize>> {
    let mut matches = Vec::new();
    for decryption in decryptions {
      for (slot, _) in decryption
        .iter()
        .enumerate()
        .take(self.parameters.number_of_bins())
        .filter(|(_, &value)| value == 0)
      {
        // Empty slots hold a dummy; a dummy decrypting to zero is an
        // alias, not a match.
        let tagged = match cuckoo.slots()[slot] {
          Some(tagged) => tagged,
          None => continue,
        };
        let index = extract_index(&self.parameters, tagged);
        let seed = match self.parameters.hash_seeds.get(index) {
          Some(&seed) => seed,
          None => continue,
        };
        let fingerprint = reconstruct_item(&self.parameters, tagged, slot, seed)?;
        if let Some(position) = fingerprints.iter().position(|&f| f == fingerprint) {
          matches.push(position);
        }
      }
    }
    matches.sort_unstable();
    matches.dedup();
    Ok(matches)
  }

  /// Returns the subset of `client_set` that the server also holds, in
  /// client-set order.
  pub fn intersection(&self, client_set: &[u64]) -> Result<Vec<u64>> {
    let matches = self.run(&self.preprocess_oprf(client_set)?)?;
    Ok(matches.into_iter().map(|i| client_set[i]).collect())
  }

  /// Cardinality-only variant of [`Client::intersection`].
  pub fn intersection_count(&self, client_set: &[u64]) -> Result<usize> {
    Ok(self.run(&self.preprocess_oprf(client_set)?)?.len())
  }
}
