use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `Node` is a participant in the network that reports pings. Its key is
/// the Hawk shared secret and is never serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Node {
    #[serde(skip_deserializing)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub dns: Option<String>,
    #[serde(skip)]
    #[sqlx(rename = "secret_key")]
    pub key: Option<String>,
    #[serde(skip_deserializing, default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(skip_deserializing, default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

/// `Ping` is a latency report from a source node to a target node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ping {
    #[serde(skip_deserializing)]
    pub id: i64,
    pub source: i64,
    pub target: i64,
    #[serde(default)]
    pub payload: u32,
    #[serde(default)]
    pub latency: f64,
    #[serde(default)]
    pub timeout: bool,
    #[serde(skip_deserializing, default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(skip_deserializing, default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

/// Fields of a `Node` a client may change with PUT. Absent keys leave the
/// node untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub dns: Option<String>,
}

/// Fields of a `Ping` a client may change with PUT.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PingUpdate {
    pub source: Option<i64>,
    pub target: Option<i64>,
    pub payload: Option<u32>,
    pub latency: Option<f64>,
    pub timeout: Option<bool>,
}

impl Node {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Node {
            id: 0,
            name: String::from(name),
            address: None,
            dns: None,
            key: None,
            created: now,
            updated: now,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    pub fn address_str(&self) -> &str {
        self.address.as_deref().unwrap_or("")
    }

    pub fn dns_str(&self) -> &str {
        self.dns.as_deref().unwrap_or("")
    }

    pub fn apply(&mut self, update: NodeUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(address) = update.address {
            self.address = Some(address);
        }
        if let Some(dns) = update.dns {
            self.dns = Some(dns);
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(String::from("node name must not be empty"));
        }
        Ok(())
    }
}

impl Ping {
    pub fn new(source: i64, target: i64) -> Self {
        let now = Utc::now();
        Ping {
            id: 0,
            source,
            target,
            payload: 0,
            latency: 0.0,
            timeout: false,
            created: now,
            updated: now,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    pub fn apply(&mut self, update: PingUpdate) {
        if let Some(source) = update.source {
            self.source = source;
        }
        if let Some(target) = update.target {
            self.target = target;
        }
        if let Some(payload) = update.payload {
            self.payload = payload;
        }
        if let Some(latency) = update.latency {
            self.latency = latency;
        }
        if let Some(timeout) = update.timeout {
            self.timeout = timeout;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        // latency is ignored for timed out pings
        if !self.timeout && !(self.latency >= 0.0) {
            return Err(format!("latency must be non-negative, got {}", self.latency));
        }
        Ok(())
    }
}
