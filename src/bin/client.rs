/*!
# Scribo Client

Sends one Hawk signed request and prints the response.

```bash
scribo-client http://localhost:5356/nodes --id apollo --key $KEY
scribo-client http://localhost:5356/pings --id apollo --key $KEY \
    --method POST --data '{"source": 1, "target": 2, "latency": 12.5}'
```
*/

use clap::{App, Arg};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};

use scribo::auth::credentials::Credential;
use scribo::auth::hawk::{Artifacts, Header};

const JSON: &str = "application/json";

#[tokio::main]
pub async fn main() -> scribo::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = App::new("Scribo Client")
        .version(scribo::VERSION)
        .about("Sends a Hawk signed request to a Scribo server")
        .arg(
            Arg::with_name("url")
                .required(true)
                .index(1)
                .help("URL of the resource"),
        )
        .arg(
            Arg::with_name("id")
                .short("i")
                .long("id")
                .takes_value(true)
                .required(true)
                .help("node name to sign as"),
        )
        .arg(
            Arg::with_name("key")
                .short("k")
                .long("key")
                .takes_value(true)
                .required(true)
                .help("key issued by scribo-register"),
        )
        .arg(
            Arg::with_name("method")
                .short("X")
                .long("method")
                .default_value("GET")
                .takes_value(true)
                .help("HTTP method"),
        )
        .arg(
            Arg::with_name("data")
                .short("d")
                .long("data")
                .takes_value(true)
                .help("JSON request body"),
        )
        .get_matches();

    let url = Url::parse(matches.value_of("url").unwrap_or_default())?;
    let method = Method::from_bytes(matches.value_of("method").unwrap_or("GET").to_uppercase().as_bytes())?;
    let credential = Credential::new(
        matches.value_of("id").unwrap_or_default(),
        matches.value_of("key").unwrap_or_default(),
    );

    let resource = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => String::from(url.path()),
    };
    let host = url.host_str().ok_or("URL has no host")?;
    let port = url.port_or_known_default().unwrap_or(80);

    let mut artifacts = Artifacts::new(method.as_str(), &resource, host, port);
    let body = matches.value_of("data").map(String::from);
    if let Some(body) = &body {
        artifacts = artifacts.with_payload(JSON, body.as_bytes());
    }
    let header = Header::sign(&credential, &artifacts);

    let client = reqwest::Client::new();
    let mut request = client
        .request(method, url)
        .header(AUTHORIZATION, header.to_string());
    if let Some(body) = body {
        request = request.header(CONTENT_TYPE, JSON).body(body);
    }

    let response = request.send().await?;
    println!("{}", response.status());
    let text = response.text().await?;
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
