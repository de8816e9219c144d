//! The overlap-psi crate implements a private set intersection protocol
//! between a client holding a small set of integers (internationalised
//! phone numbers, say) and a server holding a large, relatively static
//! one. The client learns which of its numbers the server also holds and
//! nothing else; the server learns only the intersection's cardinality.
//!
//! The pipeline: both sides push their items through an elliptic-curve
//! OPRF so they end up with the same pseudorandom fingerprints without
//! the server ever seeing a client item. The server buckets its
//! fingerprints with simple hashing and turns every bucket partition into
//! a vanishing polynomial; the client cuckoo-hashes its fingerprints into
//! one slot per bucket and sends windowed powers of each slot under BFV
//! encryption. The server evaluates every bucket polynomial on the
//! encrypted powers slot-wise; decrypted zeros mark the matches.
//!
//! # Example
//!
//! ```no_run
//! use overlap_psi::transport::HttpClientHelper;
//!
//! # fn main() -> overlap_psi::errors::Result<()> {
//! let helper = HttpClientHelper::new("https://api.moya.app/v1/overlap", None)?;
//! // Fetches the server parameters and draws a fresh OPRF key.
//! let client = helper.into_client(None)?;
//! let overlap = client.intersection(&[450258435097, 487639465982])?;
//! for number in overlap {
//!   println!("{}", number);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod cuckoo_hash;
pub mod errors;
pub mod hashing;
pub mod he;
pub mod oprf;
pub mod parameters;
pub mod poly;
pub mod rpc;
pub mod server;
pub mod simple_hash;
pub mod transport;
pub mod windowing;
