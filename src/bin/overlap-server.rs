use std::num::ParseIntError;
use std::{env, fs};

use actix_web::{get, post, web, App, HttpResponse, HttpServer};
use num_bigint::BigUint;

use overlap_psi::errors::Error;
use overlap_psi::parameters::Parameters;
use overlap_psi::rpc::{encode_answer, OprfRequest, OprfResponse, QueryRequest};
use overlap_psi::server::Server;

#[derive(Debug, Clone)]
struct ServerConfig {
  port: String,
  set_file: String,
  oprf_key: String,
  table_cache: Option<String>,
}

fn get_env_configs() -> Result<ServerConfig, String> {
  let port = match env::var("PORT") {
    Ok(v) => v,
    Err(_) => return Err("PORT should be provided".to_string()),
  };
  let set_file = match env::var("SET_FILE") {
    Ok(v) => v,
    Err(_) => return Err("SET_FILE should be provided".to_string()),
  };
  let oprf_key = match env::var("OPRF_KEY") {
    Ok(v) => v,
    Err(_) => return Err("OPRF_KEY should be provided".to_string()),
  };
  Ok(ServerConfig {
    port,
    set_file,
    oprf_key,
    table_cache: env::var("TABLE_CACHE").ok(),
  })
}

fn load_server_set(path: &str) -> Result<Vec<u64>, ParseIntError> {
  fs::read_to_string(path)
    .unwrap_or_else(|e| panic!("Error reading {}: {}", path, e))
    .lines()
    .filter(|line| !line.trim().is_empty())
    .map(|line| line.trim().parse())
    .collect()
}

// Builds the server, restoring the polynomial table from the cache file
// when one is present, preprocessing (and caching) otherwise.
fn init_server(confs: &ServerConfig) -> Server {
  let params = Parameters::default();
  let key = BigUint::parse_bytes(confs.oprf_key.as_bytes(), 10)
    .unwrap_or_else(|| panic!("OPRF_KEY is not a decimal integer"));

  if let Some(cache) = &confs.table_cache {
    if let Ok(bytes) = fs::read(cache) {
      println!("> Restoring polynomial table from {}", cache);
      let table: Vec<Vec<u64>> =
        bincode::deserialize(&bytes).expect("corrupt polynomial table cache");
      return Server::from_parts(params, &key, table).unwrap();
    }
  }

  let server_set = load_server_set(&confs.set_file).expect("malformed server set file");
  println!("> Preprocessing {} numbers, this may take a while", server_set.len());
  let mut server = Server::new(params, &key).unwrap();
  server.preprocess(&server_set).unwrap();

  if let Some(cache) = &confs.table_cache {
    let bytes = bincode::serialize(server.polynomial_table().unwrap()).unwrap();
    fs::write(cache, bytes).unwrap_or_else(|e| panic!("Error writing {}: {}", cache, e));
    println!("> Cached polynomial table at {}", cache);
  }
  server
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  let confs = match get_env_configs() {
    Ok(confs) => confs,
    Err(err) => panic!("{}", err),
  };

  println!("> Init overlap server with configs: {:?}", confs);
  let server = web::Data::new(init_server(&confs));
  println!("> Ready on port {}", confs.port);

  HttpServer::new(move || {
    App::new()
      .app_data(server.clone())
      .app_data(web::PayloadConfig::new(33_554_432))
      .service(parameters)
      .service(oprf)
      .service(query)
  })
  .bind("0.0.0.0:".to_string() + &confs.port)?
  .run()
  .await
}

#[get("/parameters")]
async fn parameters(data: web::Data<Server>) -> HttpResponse {
  HttpResponse::Ok().json(data.parameters())
}

#[post("/oprf")]
async fn oprf(body: String, data: web::Data<Server>) -> HttpResponse {
  println!("> OPRF request received");
  match handle_oprf(&body, &data) {
    Ok(response) => HttpResponse::Ok()
      .content_type("application/json")
      .body(response),
    Err(err) => error_response(err),
  }
}

#[post("/query")]
async fn query(body: String, data: web::Data<Server>) -> HttpResponse {
  println!("> Query received");
  match handle_query(&body, &data) {
    Ok(response) => HttpResponse::Ok()
      .content_type("application/json")
      .body(response),
    Err(err) => error_response(err),
  }
}

fn handle_oprf(body: &str, server: &Server) -> Result<String, Error> {
  let request: OprfRequest = serde_json::from_str(body)?;
  let points = server.oprf(&request.points)?;
  Ok(serde_json::to_string(&OprfResponse { points })?)
}

fn handle_query(body: &str, server: &Server) -> Result<String, Error> {
  let request: QueryRequest = serde_json::from_str(body)?;
  let (public_context, enc_query) = request.decode()?;
  let answer = server.query(&public_context, &enc_query)?;
  Ok(serde_json::to_string(&encode_answer(&answer))?)
}

// Session errors are independent; a bad request never takes the server
// down with it.
fn error_response(err: Error) -> HttpResponse {
  println!("> Request failed: {}", err);
  match err {
    Error::Protocol(_) | Error::Crypto(_) | Error::ParameterMismatch(_) => {
      HttpResponse::BadRequest().body(err.to_string())
    }
    _ => HttpResponse::InternalServerError().body(err.to_string()),
  }
}
