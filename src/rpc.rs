//! Wire bodies for the three endpoints. Curve points travel as pairs of
//! JSON decimal integers; ciphertexts and the public HE context travel
//! base64-encoded, with `null` marking the window positions whose exponent
//! falls outside the minibin capacity.

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::oprf::EcPoint;

/// `POST oprf` request body.
#[derive(Serialize, Deserialize)]
pub struct OprfRequest {
  pub points: Vec<EcPoint>,
}

/// `POST oprf` response body.
#[derive(Serialize, Deserialize)]
pub struct OprfResponse {
  pub points: Vec<EcPoint>,
}

/// `POST query` request body. The response body is a bare JSON array of
/// base64 ciphertexts, `alpha` of them, in minibin order.
#[derive(Serialize, Deserialize)]
pub struct QueryRequest {
  pub public_context: String,
  pub enc_query: Vec<Vec<Option<String>>>,
}

impl QueryRequest {
  pub fn encode(public_context: &[u8], enc_query: &[Vec<Option<Vec<u8>>>]) -> Self {
    Self {
      public_context: base64::encode(public_context),
      enc_query: enc_query
        .iter()
        .map(|row| {
          row
            .iter()
            .map(|cell| cell.as_ref().map(base64::encode))
            .collect()
        })
        .collect(),
    }
  }

  /// Decodes the payloads back into bytes; any malformed base64 cell is a
  /// crypto failure.
  pub fn decode(&self) -> Result<(Vec<u8>, Vec<Vec<Option<Vec<u8>>>>)> {
    let context = base64::decode(&self.public_context)?;
    let grid = self
      .enc_query
      .iter()
      .map(|row| {
        row
          .iter()
          .map(|cell| cell.as_deref().map(base64::decode).transpose())
          .collect::<std::result::Result<_, _>>()
      })
      .collect::<std::result::Result<_, _>>()?;
    Ok((context, grid))
  }
}

/// Encodes the server's answer ciphertexts for the query response body.
pub fn encode_answer(ciphertexts: &[Vec<u8>]) -> Vec<String> {
  ciphertexts.iter().map(base64::encode).collect()
}

/// Decodes a query response body.
pub fn decode_answer(body: &[String]) -> Result<Vec<Vec<u8>>> {
  Ok(
    body
      .iter()
      .map(base64::decode)
      .collect::<std::result::Result<_, _>>()?,
  )
}
