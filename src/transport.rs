//! Client-helper implementations: one speaking HTTP to a remote server,
//! one driving an in-process [`Server`] through the same serialised
//! message path the wire uses, so tests cover exactly what a deployment
//! would send.

use std::time::Duration;

use num_bigint::BigUint;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::client::{Client, ClientHelper};
use crate::errors::{Error, Result};
use crate::oprf::EcPoint;
use crate::parameters::Parameters;
use crate::rpc::{decode_answer, encode_answer, OprfRequest, OprfResponse, QueryRequest};
use crate::server::Server;

// HE evaluation dominates the query round trip; allow it several minutes.
const QUERY_TIMEOUT: Duration = Duration::from_secs(600);

/// Talks to a remote overlap server over HTTPS, optionally with a bearer
/// token. Scope enforcement is the host's business.
pub struct HttpClientHelper {
  http: HttpClient,
  base_url: String,
}

impl HttpClientHelper {
  pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
      let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| Error::Protocol(format!("invalid token: {}", e)))?;
      headers.insert(AUTHORIZATION, value);
    }
    let http = HttpClient::builder()
      .default_headers(headers)
      .timeout(QUERY_TIMEOUT)
      .build()?;
    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path)
  }

  /// Fetches the server's protocol parameters.
  pub fn parameters(&self) -> Result<Parameters> {
    Ok(
      self
        .http
        .get(self.url("parameters"))
        .send()?
        .error_for_status()?
        .json()?,
    )
  }

  /// Fetches the parameters and builds a [`Client`] around this helper. A
  /// fresh OPRF key is generated each time when none is supplied.
  pub fn into_client(self, oprf_key: Option<BigUint>) -> Result<Client<Self>> {
    let parameters = self.parameters()?;
    Client::new(parameters, self, oprf_key)
  }
}

impl ClientHelper for HttpClientHelper {
  fn oprf(&self, points: &[EcPoint]) -> Result<Vec<EcPoint>> {
    let response: OprfResponse = self
      .http
      .post(self.url("oprf"))
      .json(&OprfRequest {
        points: points.to_vec(),
      })
      .send()?
      .error_for_status()?
      .json()?;
    Ok(response.points)
  }

  fn run_query(
    &self,
    public_context: &[u8],
    enc_query: &[Vec<Option<Vec<u8>>>],
  ) -> Result<Vec<Vec<u8>>> {
    let body: Vec<String> = self
      .http
      .post(self.url("query"))
      .json(&QueryRequest::encode(public_context, enc_query))
      .send()?
      .error_for_status()?
      .json()?;
    decode_answer(&body)
  }
}

/// Runs the protocol against an in-process server, round-tripping every
/// message through its JSON encoding first.
pub struct DirectClientHelper<'a> {
  server: &'a Server,
}

impl<'a> DirectClientHelper<'a> {
  pub fn new(server: &'a Server) -> Self {
    Self { server }
  }
}

impl ClientHelper for DirectClientHelper<'_> {
  fn oprf(&self, points: &[EcPoint]) -> Result<Vec<EcPoint>> {
    let body = serde_json::to_string(&OprfRequest {
      points: points.to_vec(),
    })?;
    let request: OprfRequest = serde_json::from_str(&body)?;
    let evaluated = self.server.oprf(&request.points)?;
    let response = serde_json::to_string(&OprfResponse { points: evaluated })?;
    let parsed: OprfResponse = serde_json::from_str(&response)?;
    Ok(parsed.points)
  }

  fn run_query(
    &self,
    public_context: &[u8],
    enc_query: &[Vec<Option<Vec<u8>>>],
  ) -> Result<Vec<Vec<u8>>> {
    let body = serde_json::to_string(&QueryRequest::encode(public_context, enc_query))?;
    let request: QueryRequest = serde_json::from_str(&body)?;
    let (context, grid) = request.decode()?;
    let answer = self.server.query(&context, &grid)?;
    let response = serde_json::to_string(&encode_answer(&answer))?;
    let parsed: Vec<String> = serde_json::from_str(&response)?;
    decode_answer(&parsed)
  }
}
