use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use ring::hmac;
use thiserror::Error;

use crate::db::SqliteStore;
use crate::error::StoreError;

/// The keyed hash used for every request MAC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacAlgorithm {
    Sha256,
}

impl MacAlgorithm {
    pub fn hmac(&self) -> hmac::Algorithm {
        match self {
            MacAlgorithm::Sha256 => hmac::HMAC_SHA256,
        }
    }
}

/// A node's identity and the secret it signs requests with.
#[derive(Clone)]
pub struct Credential {
    pub id: String,
    key: Vec<u8>,
    pub algorithm: MacAlgorithm,
}

impl Credential {
    pub fn new(id: impl Into<String>, key: impl AsRef<[u8]>) -> Credential {
        Credential {
            id: id.into(),
            key: key.as_ref().to_vec(),
            algorithm: MacAlgorithm::Sha256,
        }
    }

    pub fn hmac_key(&self) -> hmac::Key {
        hmac::Key::new(self.algorithm.hmac(), &self.key)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("key", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("unknown identity {0:?}")]
    UnknownIdentity(String),

    #[error("credential lookup failed: {0}")]
    Lookup(#[from] StoreError),
}

/// Looks up the credential for a claimed identity. Implementations must be
/// read only.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, identity: &str) -> Result<Credential, CredentialError>;
}

#[async_trait]
impl CredentialResolver for SqliteStore {
    async fn resolve(&self, identity: &str) -> Result<Credential, CredentialError> {
        match self.node_key(identity).await? {
            // nodes that were never issued a key cannot sign anything
            Some(Some(key)) if !key.is_empty() => Ok(Credential::new(identity, key)),
            _ => Err(CredentialError::UnknownIdentity(identity.to_string())),
        }
    }
}

/// A fixed identity → key table.
#[async_trait]
impl CredentialResolver for HashMap<String, String> {
    async fn resolve(&self, identity: &str) -> Result<Credential, CredentialError> {
        self.get(identity)
            .filter(|key| !key.is_empty())
            .map(|key| Credential::new(identity, key))
            .ok_or_else(|| CredentialError::UnknownIdentity(identity.to_string()))
    }
}
