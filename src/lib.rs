/*!
# Welcome to Scribo

Scribo is a lightweight RESTful microservice that records latency reports ("pings") exchanged between named network nodes. Nodes measure round trip times to each other and report them here, and Scribo simply stores and serves them.

Every API route is protected by [Hawk](https://github.com/mozilla/hawk) request signing. Each node holds a shared secret issued by `scribo-register`, and every request is signed with it.

# Usage

```bash
scribo-migrate
scribo-register apollo --addr 108.51.64.223
scribo --port 8080
```

Settings are read from `scribo.toml`, `SCRIBO_*` environment variables and the legacy `PORT`, `DATABASE_URL` and `SCRIBO_SECRET` variables. See [`config`].

# Layout

* [`auth`] resolves node credentials, verifies Hawk headers and issues keys.
* [`http`] holds the route table, middleware stages and the uniform resource dispatcher.
* [`db`] is the sqlx-backed persistence layer the resources call into.

*/
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod server;

/// Version of the Scribo service.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error returned by the binaries and top level runtime.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for the Scribo runtime.
pub type Result<T> = std::result::Result<T, Error>;
