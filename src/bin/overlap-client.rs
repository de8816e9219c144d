use clap::{App, Arg};

use overlap_psi::transport::HttpClientHelper;

fn main() {
  let matches = App::new("overlap-client")
    .version("0.0.1")
    .about("Perform secure phone number overlap queries against an overlap server")
    .arg(
      Arg::with_name("token")
        .short("t")
        .long("token")
        .takes_value(true)
        .help("OAuth token"),
    )
    .arg(
      Arg::with_name("url")
        .short("u")
        .long("url")
        .takes_value(true)
        .default_value("https://api.moya.app/v1/overlap")
        .help("Remote URL to connect to"),
    )
    .arg(
      Arg::with_name("number_file")
        .required(true)
        .help("File containing an internationalized phone number on each line to query"),
    )
    .get_matches();

  let number_file = matches.value_of("number_file").unwrap();
  let contents = match std::fs::read_to_string(number_file) {
    Ok(contents) => contents,
    Err(err) => panic!("Error reading {}: {}", number_file, err),
  };
  let client_set: Vec<u64> = contents
    .lines()
    .filter(|line| !line.trim().is_empty())
    .map(|line| {
      line
        .trim()
        .parse()
        .unwrap_or_else(|_| panic!("Not a phone number: {}", line))
    })
    .collect();

  let helper =
    HttpClientHelper::new(matches.value_of("url").unwrap(), matches.value_of("token"))
      .unwrap();

  println!("> Fetching parameters and preparing a session key");
  // A new private key is automatically generated for every run.
  let client = helper.into_client(None).unwrap();

  println!("> Querying overlap for {} numbers", client_set.len());
  let overlapped_numbers = client.intersection(&client_set).unwrap();

  println!("Found {} overlapped numbers:", overlapped_numbers.len());
  for number in overlapped_numbers {
    println!("    {}", number);
  }
}
