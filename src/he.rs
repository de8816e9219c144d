//! BFV wrappers. The client holds the full context (secret, public and
//! relinearisation keys); the server reconstructs an evaluation-only
//! context from the serialised public bundle the client sends along with
//! its query, mirroring how the original deployment shipped its
//! made-public HE context.

use std::sync::Arc;

use fhe::bfv::{
  BfvParameters, BfvParametersBuilder, Ciphertext, Multiplicator, Plaintext, PublicKey,
  RelinearizationKey, SecretKey,
};
use fhe_traits::{
  Deserialize as FheDeserialize, DeserializeParametrized, FheDecoder, FheDecrypter,
  FheEncoder, FheEncrypter, Serialize as FheSerialize,
};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::parameters::Parameters;

// Coefficient modulus sizes the original deployment ran with (the HE
// library defaults for degree 8192); enough budget for one relinearised
// multiplication level plus the plaintext dot product.
const MODULI_SIZES: [usize; 5] = [43, 43, 44, 44, 44];

fn build_bfv_parameters(params: &Parameters) -> Result<Arc<BfvParameters>> {
  Ok(
    BfvParametersBuilder::new()
      .set_degree(params.poly_modulus_degree)
      .set_plaintext_modulus(params.plain_modulus)
      .set_moduli_sizes(&MODULI_SIZES)
      .build_arc()?,
  )
}

/// The serialised public bundle: everything the server needs to evaluate
/// on the client's ciphertexts, nothing it could decrypt with.
#[derive(Serialize, Deserialize)]
struct PublicBundle {
  parameters: Vec<u8>,
  public_key: Vec<u8>,
  relin_key: Vec<u8>,
}

/// Client-side HE context, fresh per session.
pub struct ClientHeContext {
  bfv: Arc<BfvParameters>,
  secret_key: SecretKey,
  public_key: PublicKey,
  relin_key: RelinearizationKey,
}

impl ClientHeContext {
  pub fn new(params: &Parameters) -> Result<Self> {
    let bfv = build_bfv_parameters(params)?;
    let mut rng = rand_fhe::thread_rng();
    let secret_key = SecretKey::random(&bfv, &mut rng);
    let public_key = PublicKey::new(&secret_key, &mut rng);
    let relin_key = RelinearizationKey::new(&secret_key, &mut rng)?;
    Ok(Self {
      bfv,
      secret_key,
      public_key,
      relin_key,
    })
  }

  /// The serialised public context to ship with a query.
  pub fn public_bytes(&self) -> Result<Vec<u8>> {
    let bundle = PublicBundle {
      parameters: self.bfv.to_bytes(),
      public_key: self.public_key.to_bytes(),
      relin_key: self.relin_key.to_bytes(),
    };
    bincode::serialize(&bundle).map_err(|e| Error::Protocol(e.to_string()))
  }

  /// Encrypts one slot vector and returns the serialised ciphertext.
  pub fn encrypt(&self, values: &[u64]) -> Result<Vec<u8>> {
    let plaintext = Plaintext::try_encode(values, fhe::bfv::Encoding::simd(), &self.bfv)?;
    let ciphertext: Ciphertext = self
      .public_key
      .try_encrypt(&plaintext, &mut rand_fhe::thread_rng())?;
    Ok(ciphertext.to_bytes())
  }

  /// Decrypts a serialised ciphertext into its slot vector.
  pub fn decrypt(&self, bytes: &[u8]) -> Result<Vec<u64>> {
    let ciphertext = Ciphertext::from_bytes(bytes, &self.bfv)?;
    let plaintext = self.secret_key.try_decrypt(&ciphertext)?;
    Ok(Vec::<u64>::try_decode(&plaintext, fhe::bfv::Encoding::simd())?)
  }
}

/// Server-side evaluation context parsed from a client's public bundle.
pub struct EvaluationContext {
  bfv: Arc<BfvParameters>,
  public_key: PublicKey,
  multiplicator: Multiplicator,
}

impl EvaluationContext {
  /// Parses a public bundle and checks it against the negotiated
  /// parameters; a client encrypting under different BFV parameters would
  /// otherwise produce garbage slot alignments.
  pub fn from_bytes(bytes: &[u8], expected: &Parameters) -> Result<Self> {
    let bundle: PublicBundle =
      bincode::deserialize(bytes).map_err(|e| Error::Protocol(e.to_string()))?;
    let bfv = Arc::new(
      BfvParameters::try_deserialize(&bundle.parameters)
        .map_err(|e| Error::Crypto(e.to_string()))?,
    );
    if bfv.degree() != expected.poly_modulus_degree
      || bfv.plaintext() != expected.plain_modulus
    {
      return Err(Error::ParameterMismatch(format!(
        "query context uses degree {} / plain modulus {}",
        bfv.degree(),
        bfv.plaintext()
      )));
    }
    let public_key = PublicKey::from_bytes(&bundle.public_key, &bfv)?;
    let relin_key = RelinearizationKey::from_bytes(&bundle.relin_key, &bfv)?;
    let multiplicator = Multiplicator::default(&relin_key)?;
    Ok(Self {
      bfv,
      public_key,
      multiplicator,
    })
  }

  pub fn public_key(&self) -> &PublicKey {
    &self.public_key
  }

  /// Encrypts a slot vector under the client's public key. Used to fold
  /// plaintext constant terms into a ciphertext accumulator.
  pub fn encrypt(&self, values: &[u64]) -> Result<Ciphertext> {
    let plaintext = self.plaintext(values)?;
    Ok(
      self
        .public_key
        .try_encrypt(&plaintext, &mut rand_fhe::thread_rng())?,
    )
  }

  pub fn ciphertext_from_bytes(&self, bytes: &[u8]) -> Result<Ciphertext> {
    Ok(Ciphertext::from_bytes(bytes, &self.bfv)?)
  }

  /// Encodes one slot vector as a plaintext operand.
  pub fn plaintext(&self, values: &[u64]) -> Result<Plaintext> {
    Ok(Plaintext::try_encode(
      values,
      fhe::bfv::Encoding::simd(),
      &self.bfv,
    )?)
  }

  /// Relinearised ciphertext product, so repeated products stay at the
  /// standard ciphertext size.
  pub fn multiply(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> Result<Ciphertext> {
    Ok(self.multiplicator.multiply(lhs, rhs)?)
  }

  /// Multiplies the operands pairwise, recursing over the halved list, so
  /// the multiplicative depth stays logarithmic in the operand count.
  pub fn multiply_tree(&self, mut operands: Vec<Ciphertext>) -> Result<Ciphertext> {
    if operands.is_empty() {
      return Err(Error::Protocol("empty multiplication tree".into()));
    }
    while operands.len() > 1 {
      let mut next = Vec::with_capacity((operands.len() + 1) / 2);
      for pair in operands.chunks(2) {
        if pair.len() == 2 {
          next.push(self.multiply(&pair[0], &pair[1])?);
        } else {
          next.push(pair[0].clone());
        }
      }
      operands = next;
    }
    operands
      .pop()
      .ok_or_else(|| Error::Crypto("multiplication tree collapsed".into()))
  }
}
