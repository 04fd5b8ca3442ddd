/*!
# Scribo API Server

## Help

```bash
scribo --help
```

## Example Usage

```bash
scribo --port=8080 --config=scribo
```

## Dev

To run from source:

```bash
RUST_LOG=scribo=debug cargo run -- --port=8080
```
*/

use clap::{App, Arg};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use scribo::config::Settings;
use scribo::server;

#[tokio::main]
pub async fn main() -> scribo::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = App::new("Scribo")
        .version(scribo::VERSION)
        .about("Runs the Scribo ping recording API")
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .takes_value(true)
                .help("port to listen on"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("config file name"),
        )
        .get_matches();

    let mut settings = Settings::load(matches.value_of("config"))?;
    if let Some(port) = matches.value_of("port") {
        settings.server.port = port.parse()?;
    }

    server::run(settings, signal::ctrl_c()).await
}
