//! The OPRF layer. The client learns `fp(item * k_s * G)` for each of its
//! items without revealing them: it blinds each item with its own scalar
//! `k_c`, the server multiplies the blinded points by its long-lived key
//! `k_s`, and the client strips `k_c` with its modular inverse. The server
//! applies the same fingerprint extraction to its own set offline, so equal
//! items yield equal fingerprints on both sides.

use std::str::FromStr;

use lazy_static::lazy_static;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use p192::elliptic_curve::ff::PrimeField;
use p192::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p192::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use rayon::prelude::*;
use serde::de::Error as _;
use serde::ser::{Error as _, SerializeTuple};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{Error, Result};
use crate::parameters::Parameters;

// Bit length of the P-192 field prime.
const LOG_P: usize = 192;

const FIELD_BYTES: usize = 24;

lazy_static! {
  /// Order of the P-192 generator.
  pub static ref GENERATOR_ORDER: BigUint = BigUint::from_str(
    "6277101735386680763835789423176059013767194773182842284081"
  )
  .unwrap();
}

/// A curve point as its coordinate pair. On the wire both coordinates are
/// plain JSON decimal integers, matching the peer implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EcPoint {
  pub x: BigUint,
  pub y: BigUint,
}

impl Serialize for EcPoint {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let x = serde_json::Number::from_str(&self.x.to_str_radix(10))
      .map_err(S::Error::custom)?;
    let y = serde_json::Number::from_str(&self.y.to_str_radix(10))
      .map_err(S::Error::custom)?;
    let mut tuple = serializer.serialize_tuple(2)?;
    tuple.serialize_element(&x)?;
    tuple.serialize_element(&y)?;
    tuple.end()
  }
}

impl<'de> Deserialize<'de> for EcPoint {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    let (x, y): (serde_json::Number, serde_json::Number) =
      Deserialize::deserialize(deserializer)?;
    let parse = |n: &serde_json::Number| {
      BigUint::from_str(&n.to_string())
        .map_err(|_| D::Error::custom("coordinate is not a non-negative integer"))
    };
    Ok(EcPoint {
      x: parse(&x)?,
      y: parse(&y)?,
    })
  }
}

/// Reduces an arbitrary non-negative integer into a curve scalar.
pub fn scalar_from_biguint(value: &BigUint) -> Result<Scalar> {
  let reduced = value % &*GENERATOR_ORDER;
  let bytes = reduced.to_bytes_be();
  let mut repr = [0u8; FIELD_BYTES];
  repr[FIELD_BYTES - bytes.len()..].copy_from_slice(&bytes);
  Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(repr)))
    .ok_or_else(|| Error::Crypto("scalar reduction failed".into()))
}

fn point_from_pair(pair: &EcPoint) -> Result<ProjectivePoint> {
  let coordinate = |value: &BigUint| -> Result<FieldBytes> {
    let bytes = value.to_bytes_be();
    if bytes.len() > FIELD_BYTES {
      return Err(Error::Crypto("coordinate exceeds the field size".into()));
    }
    let mut out = [0u8; FIELD_BYTES];
    out[FIELD_BYTES - bytes.len()..].copy_from_slice(&bytes);
    Ok(FieldBytes::from(out))
  };
  let encoded =
    EncodedPoint::from_affine_coordinates(&coordinate(&pair.x)?, &coordinate(&pair.y)?, false);
  Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
    .map(ProjectivePoint::from)
    .ok_or_else(|| Error::Crypto("point is not on the curve".into()))
}

fn pair_from_point(point: &ProjectivePoint) -> Result<EcPoint> {
  let encoded = point.to_affine().to_encoded_point(false);
  match (encoded.x(), encoded.y()) {
    (Some(x), Some(y)) => Ok(EcPoint {
      x: BigUint::from_bytes_be(x),
      y: BigUint::from_bytes_be(y),
    }),
    _ => Err(Error::Crypto("point at infinity has no coordinates".into())),
  }
}

/// Elliptic-curve half of the protocol. Owns nothing but the derived
/// fingerprint geometry; keys are passed in by the caller.
pub struct Oprf {
  mask: u64,
  shift: usize,
}

impl Oprf {
  pub fn new(params: &Parameters) -> Self {
    Self {
      mask: (1u64 << params.sigma_max()) - 1,
      shift: LOG_P - params.sigma_max() - 10,
    }
  }

  /// `key * G`, the precomputed public half of a scalar key.
  pub fn key_point(&self, key: &BigUint) -> Result<ProjectivePoint> {
    Ok(ProjectivePoint::GENERATOR * scalar_from_biguint(key)?)
  }

  /// Uniform scalar drawn from a CSPRNG, for use as a fresh client key.
  pub fn random_key(&self) -> BigUint {
    let mut bytes = [0u8; FIELD_BYTES];
    use rand_core::RngCore;
    rand_core::OsRng.fill_bytes(&mut bytes);
    BigUint::from_bytes_be(&bytes) % &*GENERATOR_ORDER
  }

  /// The `sigma_max`-bit fingerprint of a point: the x coordinate with the
  /// top ten bits discarded, then masked. The same formula runs on both
  /// sides so fingerprints compare equal iff the underlying items do.
  fn fingerprint(&self, point: &ProjectivePoint) -> Result<u64> {
    let pair = pair_from_point(point)?;
    ((pair.x >> self.shift) & BigUint::from(self.mask))
      .to_u64()
      .ok_or_else(|| Error::Crypto("fingerprint does not fit 64 bits".into()))
  }

  /// Server offline phase: fingerprints of `item * (k_s * G)` for the whole
  /// server set. Output order matches input order.
  pub fn server_offline(
    &self,
    items: &[u64],
    server_point: &ProjectivePoint,
  ) -> Result<Vec<u64>> {
    items
      .par_iter()
      .map(|&item| self.fingerprint(&(*server_point * Scalar::from(item))))
      .collect()
  }

  /// Server online phase: multiplies each blinded client point by the
  /// server key. Output order matches input order.
  pub fn server_online(&self, key: &Scalar, pairs: &[EcPoint]) -> Result<Vec<EcPoint>> {
    pairs
      .par_iter()
      .map(|pair| pair_from_point(&(point_from_pair(pair)? * key)))
      .collect()
  }

  /// Client offline phase: blinds each item as `item * (k_c * G)`.
  pub fn client_offline(
    &self,
    items: &[u64],
    client_point: &ProjectivePoint,
  ) -> Result<Vec<EcPoint>> {
    items
      .par_iter()
      .map(|&item| pair_from_point(&(*client_point * Scalar::from(item))))
      .collect()
  }

  /// Client online phase: strips the blinding from the server's response
  /// with `k_c^-1` and extracts fingerprints.
  pub fn client_online(&self, key_inverse: &Scalar, pairs: &[EcPoint]) -> Result<Vec<u64>> {
    pairs
      .par_iter()
      .map(|pair| self.fingerprint(&(point_from_pair(pair)? * key_inverse)))
      .collect()
  }

  /// `key^-1 mod q`, undefined for zero.
  pub fn invert_key(&self, key: &BigUint) -> Result<Scalar> {
    let scalar = scalar_from_biguint(key)?;
    Option::<Scalar>::from(scalar.invert())
      .ok_or_else(|| Error::Crypto("OPRF key has no modular inverse".into()))
  }
}
