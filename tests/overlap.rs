//! End-to-end protocol runs against an in-process server, with every
//! message round-tripped through its wire encoding.

use std::str::FromStr;

use num_bigint::BigUint;

use overlap_psi::client::Client;
use overlap_psi::errors::Error;
use overlap_psi::he::ClientHeContext;
use overlap_psi::parameters::Parameters;
use overlap_psi::rpc::QueryRequest;
use overlap_psi::server::Server;
use overlap_psi::transport::DirectClientHelper;

const SERVER_OPRF_KEY: &str = "1234567891011121314151617181920";
const CLIENT_OPRF_KEY: &str = "12345678910111213141516171819222222222222";

const SERVER_SET: [u64; 3] = [487639465982, 542438948507207, 3259695623874827];
const CLIENT_SET: [u64; 5] = [
  450258435097,
  487639465982,
  436874875093495,
  542438948507207,
  2345934957037,
];

fn server_key() -> BigUint {
  BigUint::from_str(SERVER_OPRF_KEY).unwrap()
}

fn client_key() -> BigUint {
  BigUint::from_str(CLIENT_OPRF_KEY).unwrap()
}

fn preprocessed_server(parameters: Parameters, server_set: &[u64]) -> Server {
  let mut server = Server::new(parameters, &server_key()).unwrap();
  server.preprocess(server_set).unwrap();
  server
}

/// Reduced table sizes so scenarios that do not depend on the production
/// geometry run quickly; all derived constraints still hold.
fn small_parameters() -> Parameters {
  Parameters {
    output_bits: 11,
    poly_modulus_degree: 2048,
    bin_capacity: 40,
    alpha: 8,
    ..Parameters::default()
  }
}

#[test]
fn overlap_with_fixed_keys() {
  let server = preprocessed_server(Parameters::default(), &SERVER_SET);
  let helper = DirectClientHelper::new(&server);
  let client =
    Client::new(server.parameters().clone(), helper, Some(client_key())).unwrap();

  let blinded = client.preprocess_oprf(&CLIENT_SET).unwrap();
  assert_eq!(blinded.len(), CLIENT_SET.len());

  let matches = client.run(&blinded).unwrap();
  assert_eq!(matches, vec![1, 3], "two of the five numbers overlap");

  let overlap = client.intersection(&CLIENT_SET).unwrap();
  assert_eq!(overlap, vec![487639465982, 542438948507207]);
}

#[test]
fn overlap_is_invariant_under_the_blinding_key() {
  let server = preprocessed_server(Parameters::default(), &SERVER_SET);
  let helper = DirectClientHelper::new(&server);
  // Freshly random key, same result.
  let client = Client::new(server.parameters().clone(), helper, None).unwrap();

  let overlap = client.intersection(&CLIENT_SET).unwrap();
  assert_eq!(overlap, vec![487639465982, 542438948507207]);
}

#[test]
fn empty_client_set_needs_no_query() {
  let server = preprocessed_server(small_parameters(), &SERVER_SET);
  let helper = DirectClientHelper::new(&server);
  let client = Client::new(server.parameters().clone(), helper, None).unwrap();

  assert!(client.intersection(&[]).unwrap().is_empty());
  assert_eq!(client.intersection_count(&[]).unwrap(), 0);
}

#[test]
fn identical_sets_match_completely() {
  let server = preprocessed_server(small_parameters(), &CLIENT_SET);
  let helper = DirectClientHelper::new(&server);
  let client = Client::new(server.parameters().clone(), helper, None).unwrap();

  let overlap = client.intersection(&CLIENT_SET).unwrap();
  assert_eq!(overlap, CLIENT_SET.to_vec());
}

#[test]
fn disjoint_sets_produce_no_matches() {
  let server = preprocessed_server(small_parameters(), &SERVER_SET);
  let helper = DirectClientHelper::new(&server);
  let client = Client::new(server.parameters().clone(), helper, None).unwrap();

  let overlap = client.intersection(&[450258435097, 2345934957037]).unwrap();
  assert!(overlap.is_empty());
}

#[test]
fn oversized_server_set_exceeds_capacity() {
  // 16 buckets with room for 2 entries cannot hold 40 numbers hashed
  // three times each.
  let parameters = Parameters {
    output_bits: 4,
    poly_modulus_degree: 16,
    bin_capacity: 2,
    alpha: 1,
    ..Parameters::default()
  };
  let mut server = Server::new(parameters, &server_key()).unwrap();
  let oversized: Vec<u64> = (0..40u64).map(|i| 400_000_000_000 + i).collect();
  let result = server.preprocess(&oversized);
  assert!(matches!(result, Err(Error::CapacityExceeded(_))));
}

#[test]
fn corrupted_ciphertext_is_a_crypto_failure() {
  let parameters = small_parameters();
  let server = preprocessed_server(parameters.clone(), &SERVER_SET);

  // Truncated base64 fails already at body decoding.
  let request = QueryRequest {
    public_context: "AAAB".into(),
    enc_query: vec![vec![Some("dHJ1bmNhdGVkIGJhc2U2N".into())]],
  };
  assert!(matches!(request.decode(), Err(Error::Crypto(_))));

  // A well-formed grid of garbage ciphertext bytes fails inside the
  // evaluation with the same error class.
  let he = ClientHeContext::new(&parameters).unwrap();
  let garbage = vec![7u8; 64];
  let grid: Vec<Vec<Option<Vec<u8>>>> = (0..parameters.base() - 1)
    .map(|i| {
      (0..parameters.log_b_ell())
        .map(|j| {
          let exponent = (i + 1) * parameters.base().pow(j as u32);
          (exponent - 1 < parameters.minibin_capacity()).then(|| garbage.clone())
        })
        .collect()
    })
    .collect();
  let result = server.query(&he.public_bytes().unwrap(), &grid);
  assert!(matches!(result, Err(Error::Crypto(_))));
}

#[test]
fn malformed_query_shape_is_a_protocol_violation() {
  let server = preprocessed_server(small_parameters(), &SERVER_SET);
  let he = ClientHeContext::new(server.parameters()).unwrap();
  let result = server.query(&he.public_bytes().unwrap(), &[vec![None]]);
  assert!(matches!(result, Err(Error::Protocol(_))));
}
