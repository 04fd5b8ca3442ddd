use clap::{App, Arg};
use tracing::{event, Level};

use scribo::config::Settings;
use scribo::db::SqliteStore;

#[tokio::main]
pub async fn main() -> scribo::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = App::new("Scribo Migrate")
        .version(scribo::VERSION)
        .about("Creates or upgrades the Scribo database")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("config file name"),
        )
        .get_matches();

    let settings = Settings::load(matches.value_of("config"))?;
    let store = SqliteStore::connect(&settings.database.url, 1).await?;
    store.migrate().await?;

    event!(Level::INFO, "migrated {}", settings.database.url);
    println!("Database is up to date");
    Ok(())
}
