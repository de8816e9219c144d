use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol errors, one variant per failure class. All of them are fatal
/// for the session they occur in; the server keeps serving other sessions.
#[derive(Debug, Error)]
pub enum Error {
  /// The two sides disagree on the shared `Parameters`.
  #[error("parameter mismatch: {0}")]
  ParameterMismatch(String),

  /// A hash table ran out of room for the given input size.
  #[error("capacity exceeded: {0}")]
  CapacityExceeded(&'static str),

  /// EC point off-curve, undefined modular inverse, HE failure.
  #[error("crypto failure: {0}")]
  Crypto(String),

  /// Network or HTTP failure while talking to the server.
  #[error("transport failure: {0}")]
  Transport(#[from] reqwest::Error),

  /// Malformed message: bad JSON, wrong array shape, out-of-range integer.
  #[error("protocol violation: {0}")]
  Protocol(String),
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Error::Protocol(e.to_string())
  }
}

impl From<base64::DecodeError> for Error {
  fn from(e: base64::DecodeError) -> Self {
    Error::Crypto(format!("base64: {}", e))
  }
}

impl From<fhe::Error> for Error {
  fn from(e: fhe::Error) -> Self {
    Error::Crypto(e.to_string())
  }
}
