//! Hawk request authentication.
//!
//! The [`Authenticator`] is a middleware stage. For each request it
//!
//! 1. parses the `Authorization` header,
//! 2. resolves the claimed identity to a credential,
//! 3. verifies the MAC, the timestamp window, the payload hash and the nonce,
//!
//! and either passes the request on unchanged or answers 401 (no header) or
//! 403 (anything else). Which check failed is logged, never returned.

pub mod credentials;
pub mod hawk;
pub mod keys;
pub mod nonce;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{event, Level};
use warp::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use warp::http::StatusCode;

use crate::http::middleware::{Middleware, Next};
use crate::http::{Request, Response};

use self::credentials::{Credential, CredentialError, CredentialResolver};
use self::hawk::{Artifacts, Header, HawkError};
use self::nonce::NonceStore;

pub use self::keys::KeyIssuer;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no authorization header")]
    Missing,

    #[error("malformed authorization header: {0}")]
    Malformed(#[from] HawkError),

    #[error("unknown identity {0:?}")]
    UnknownIdentity(String),

    #[error("bad mac")]
    InvalidMac,

    #[error("stale timestamp {ts}, server time {now}")]
    StaleTimestamp { ts: i64, now: i64 },

    #[error("payload hash does not match the body")]
    InvalidPayloadHash,

    #[error("nonce {0:?} already used")]
    Replay(String),

    #[error("credential lookup failed: {0}")]
    Lookup(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Missing => StatusCode::UNAUTHORIZED,
            AuthError::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::FORBIDDEN,
        }
    }

    /// The client visible message. Identical for every 403 so callers cannot
    /// tell an unknown identity from a bad MAC.
    pub fn public_message(&self) -> &'static str {
        match self.status() {
            StatusCode::UNAUTHORIZED => "Hawk authorization required",
            StatusCode::FORBIDDEN => "request could not be authenticated",
            _ => "credential lookup failed",
        }
    }

    pub fn into_response(self) -> Response {
        let response = Response::error(self.status(), self.public_message());
        match self {
            AuthError::Missing => response.with_header(WWW_AUTHENTICATE, hawk::SCHEME),
            _ => response,
        }
    }
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::UnknownIdentity(id) => AuthError::UnknownIdentity(id),
            CredentialError::Lookup(err) => AuthError::Lookup(err.to_string()),
        }
    }
}

pub struct Authenticator {
    resolver: Arc<dyn CredentialResolver>,
    nonces: NonceStore,
    skew: Duration,
}

impl Authenticator {
    pub fn new(resolver: Arc<dyn CredentialResolver>, skew: Duration) -> Authenticator {
        Authenticator {
            resolver,
            // a timestamp is accepted up to `skew` either side of now
            nonces: NonceStore::new(skew * 2),
            skew,
        }
    }

    /// Verify the request and return the credential it was signed with.
    pub async fn authenticate(&self, request: &Request) -> Result<Credential, AuthError> {
        let value = match request.headers.get(AUTHORIZATION) {
            Some(raw) => raw.to_str().map_err(|_| HawkError::Encoding)?,
            None => return Err(AuthError::Missing),
        };
        if value.trim().is_empty() {
            return Err(AuthError::Missing);
        }
        let header: Header = value.parse()?;

        let credential = self.resolver.resolve(&header.id).await?;

        let (host, port) = request.host_and_port();
        let artifacts = Artifacts::from_header(
            &header,
            request.method.as_str(),
            &request.resource(),
            &host,
            port,
        );
        if !hawk::verify_mac(&credential, &artifacts, &header.mac) {
            return Err(AuthError::InvalidMac);
        }

        let now = hawk::now();
        let drift = (now as i128 - header.ts as i128).unsigned_abs();
        if drift > self.skew.as_secs() as u128 {
            return Err(AuthError::StaleTimestamp { ts: header.ts, now });
        }

        if let Some(hash) = &header.hash {
            let expected = hawk::payload_hash(request.content_type(), &request.body);
            if !hawk::hashes_match(&expected, hash) {
                return Err(AuthError::InvalidPayloadHash);
            }
        }

        if !self
            .nonces
            .check_and_store(&header.id, header.ts, &header.nonce)
        {
            return Err(AuthError::Replay(header.nonce));
        }

        Ok(credential)
    }
}

#[async_trait]
impl Middleware for Authenticator {
    fn name(&self) -> &'static str {
        "hawk"
    }

    async fn handle(&self, request: Request, next: Next<'_>) -> Response {
        match self.authenticate(&request).await {
            Ok(credential) => {
                event!(Level::DEBUG, "authenticated {}", credential.id);
                next.run(request).await
            }
            Err(err) => {
                event!(
                    Level::WARN,
                    "rejected {} {}: {}",
                    request.method,
                    request.resource(),
                    err
                );
                err.into_response()
            }
        }
    }
}
