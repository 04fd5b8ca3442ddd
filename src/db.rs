//! Persistence for nodes and pings.
//!
//! Resources only ever talk to the [`Store`] trait. [`SqliteStore`] is the
//! sqlx implementation used by the binaries and the tests.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{event, Level};

use crate::error::StoreError;
use crate::models::{Node, Ping};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Data access interface used by the resources. `save_*` inserts records
/// with no id and updates records with a positive id, returning whether the
/// record was created.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_node(&self, id: i64) -> StoreResult<Node>;
    async fn get_node_by_name(&self, name: &str) -> StoreResult<Option<Node>>;
    async fn fetch_nodes(&self, limit: u32) -> StoreResult<Vec<Node>>;
    async fn save_node(&self, node: &mut Node) -> StoreResult<bool>;
    async fn delete_node(&self, node: &Node) -> StoreResult<bool>;

    async fn get_ping(&self, id: i64) -> StoreResult<Ping>;
    async fn fetch_pings(&self, limit: u32) -> StoreResult<Vec<Ping>>;
    async fn save_ping(&self, ping: &mut Ping) -> StoreResult<bool>;
    async fn delete_ping(&self, ping: &Ping) -> StoreResult<bool>;
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to the database at `url`, creating the file if needed.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<SqliteStore> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        event!(Level::DEBUG, "connected to {}", url);
        Ok(SqliteStore { pool })
    }

    /// A private, migrated in-memory database. Every connection to
    /// `sqlite::memory:` is its own database, so the pool holds exactly one
    /// connection for its whole life.
    pub async fn in_memory() -> StoreResult<SqliteStore> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply any migrations in `migrations/` that have not yet run.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// The current key of the node called `name`. Outer `None` when there is
    /// no such node, inner `None` when it exists but was never issued a key.
    pub async fn node_key(&self, name: &str) -> StoreResult<Option<Option<String>>> {
        let key: Option<(Option<String>,)> =
            sqlx::query_as("SELECT secret_key FROM nodes WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(key.map(|(key,)| key))
    }
}

fn expect_one(entity: &'static str, rows: u64) -> StoreResult<()> {
    if rows == 1 {
        Ok(())
    } else {
        Err(StoreError::RowCount { entity, rows })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_node(&self, id: i64) -> StoreResult<Node> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { entity: "node", id })
    }

    async fn get_node_by_name(&self, name: &str) -> StoreResult<Option<Node>> {
        let node = sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(node)
    }

    async fn fetch_nodes(&self, limit: u32) -> StoreResult<Vec<Node>> {
        let nodes = sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes ORDER BY updated DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(nodes)
    }

    async fn save_node(&self, node: &mut Node) -> StoreResult<bool> {
        let now = Utc::now();

        if node.is_persisted() {
            let result = sqlx::query(
                "UPDATE nodes SET name = ?, address = ?, dns = ?, secret_key = ?, updated = ? WHERE id = ?",
            )
            .bind(&node.name)
            .bind(&node.address)
            .bind(&node.dns)
            .bind(&node.key)
            .bind(now)
            .bind(node.id)
            .execute(&self.pool)
            .await?;
            expect_one("node", result.rows_affected())?;
            node.updated = now;
            return Ok(false);
        }

        let result = sqlx::query(
            "INSERT INTO nodes (name, address, dns, secret_key, created, updated) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&node.name)
        .bind(&node.address)
        .bind(&node.dns)
        .bind(&node.key)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        expect_one("node", result.rows_affected())?;

        node.id = result.last_insert_rowid();
        node.created = now;
        node.updated = now;
        Ok(true)
    }

    async fn delete_node(&self, node: &Node) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM nodes WHERE id = ?")
            .bind(node.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_ping(&self, id: i64) -> StoreResult<Ping> {
        sqlx::query_as::<_, Ping>("SELECT * FROM pings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { entity: "ping", id })
    }

    async fn fetch_pings(&self, limit: u32) -> StoreResult<Vec<Ping>> {
        let pings = sqlx::query_as::<_, Ping>(
            "SELECT * FROM pings ORDER BY updated DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(pings)
    }

    async fn save_ping(&self, ping: &mut Ping) -> StoreResult<bool> {
        let now = Utc::now();

        if ping.is_persisted() {
            let result = sqlx::query(
                "UPDATE pings SET source = ?, target = ?, payload = ?, latency = ?, timeout = ?, updated = ? WHERE id = ?",
            )
            .bind(ping.source)
            .bind(ping.target)
            .bind(ping.payload)
            .bind(ping.latency)
            .bind(ping.timeout)
            .bind(now)
            .bind(ping.id)
            .execute(&self.pool)
            .await?;
            expect_one("ping", result.rows_affected())?;
            ping.updated = now;
            return Ok(false);
        }

        let result = sqlx::query(
            "INSERT INTO pings (source, target, payload, latency, timeout, created, updated) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(ping.source)
        .bind(ping.target)
        .bind(ping.payload)
        .bind(ping.latency)
        .bind(ping.timeout)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        expect_one("ping", result.rows_affected())?;

        ping.id = result.last_insert_rowid();
        ping.created = now;
        ping.updated = now;
        Ok(true)
    }

    async fn delete_ping(&self, ping: &Ping) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM pings WHERE id = ?")
            .bind(ping.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
