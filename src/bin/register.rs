/*!
# Scribo Node Registration

Creates a node, or updates an existing one, and issues it a fresh Hawk key.

```bash
scribo-register apollo --addr 108.51.64.223 --dns apollo.example.com
```

Requires `auth.secret` (or `SCRIBO_SECRET`) to be set.
*/

use chrono::Utc;
use clap::{App, Arg};

use scribo::auth::KeyIssuer;
use scribo::config::Settings;
use scribo::db::{SqliteStore, Store};
use scribo::models::{Node, NodeUpdate};

#[tokio::main]
pub async fn main() -> scribo::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = App::new("Scribo Register")
        .version(scribo::VERSION)
        .about("Registers a node and rotates its key")
        .arg(
            Arg::with_name("name")
                .required(true)
                .index(1)
                .help("name of the node"),
        )
        .arg(
            Arg::with_name("addr")
                .short("a")
                .long("addr")
                .takes_value(true)
                .help("IP address of the node"),
        )
        .arg(
            Arg::with_name("dns")
                .short("d")
                .long("dns")
                .takes_value(true)
                .help("domain name of the node"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("config file name"),
        )
        .get_matches();

    let settings = Settings::load(matches.value_of("config"))?;
    if settings.auth.secret.is_empty() {
        return Err("auth.secret must be set to issue keys".into());
    }

    let store = SqliteStore::connect(&settings.database.url, 1).await?;
    store.migrate().await?;

    let name = matches.value_of("name").unwrap_or_default();
    let mut node = match store.get_node_by_name(name).await? {
        Some(node) => node,
        None => Node::new(name),
    };
    node.apply(NodeUpdate {
        name: None,
        address: matches.value_of("addr").map(String::from),
        dns: matches.value_of("dns").map(String::from),
    });
    node.validate()?;

    KeyIssuer::new(settings.auth.secret.clone()).rotate(&mut node, Utc::now());
    let created = store.save_node(&mut node).await?;

    let location = match (&node.address, &node.dns) {
        (Some(address), _) if !address.is_empty() => address.clone(),
        (_, Some(dns)) if !dns.is_empty() => dns.clone(),
        _ => String::from("Unknown Address"),
    };
    println!(
        "{} Node {} ({})",
        if created { "Created" } else { "Updated" },
        node.name,
        location
    );
    println!("Key: {}", node.key.unwrap_or_default());
    Ok(())
}
