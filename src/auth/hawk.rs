//! Hawk header parsing, normalization and MAC calculation.
//!
//! Only the `Authorization` request header scheme is implemented. A request
//! is signed with:
//!
//! ```text
//! hawk.1.header
//! {ts}
//! {nonce}
//! {METHOD}
//! {path?query}
//! {host}
//! {port}
//! {hash}
//! {ext}
//! ```
//!
//! each line terminated by `\n`, MAC'd with HMAC-SHA-256 under the node's key
//! and base64 encoded.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::distributions::Alphanumeric;
use rand::Rng;
use ring::{digest, hmac};
use thiserror::Error;

use super::credentials::Credential;

pub const SCHEME: &str = "Hawk";
pub const HEADER_VERSION: &str = "1";
pub const NONCE_LENGTH: usize = 6;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HawkError {
    #[error("authorization scheme is not Hawk")]
    Scheme,

    #[error("unknown attribute {0}")]
    UnknownAttribute(String),

    #[error("duplicate attribute {0}")]
    DuplicateAttribute(String),

    #[error("missing attribute {0}")]
    MissingAttribute(&'static str),

    #[error("bad header syntax at byte {0}")]
    Syntax(usize),

    #[error("invalid timestamp {0:?}")]
    Timestamp(String),

    #[error("header is not visible ASCII")]
    Encoding,
}

/// The attributes of a Hawk `Authorization` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub id: String,
    pub ts: i64,
    pub nonce: String,
    pub mac: String,
    pub hash: Option<String>,
    pub ext: Option<String>,
    pub app: Option<String>,
    pub dlg: Option<String>,
}

/// Everything that goes into the normalized request string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifacts {
    pub method: String,
    pub resource: String,
    pub host: String,
    pub port: u16,
    pub ts: i64,
    pub nonce: String,
    pub hash: Option<String>,
    pub ext: Option<String>,
    pub app: Option<String>,
    pub dlg: Option<String>,
}

fn valid_value_char(c: char) -> bool {
    // printable ASCII except the double quote and backslash
    (' '..='~').contains(&c) && c != '"' && c != '\\'
}

impl FromStr for Header {
    type Err = HawkError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let rest = match value.split_once(' ') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case(SCHEME) => rest,
            _ => return Err(HawkError::Scheme),
        };
        let offset = value.len() - rest.len();

        let mut id = None;
        let mut ts = None;
        let mut nonce = None;
        let mut mac = None;
        let mut hash = None;
        let mut ext = None;
        let mut app = None;
        let mut dlg = None;

        let bytes = rest.as_bytes();
        let mut pos = 0;
        loop {
            while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b',') {
                pos += 1;
            }
            if pos >= bytes.len() {
                break;
            }

            let start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_lowercase() {
                pos += 1;
            }
            let key = &rest[start..pos];
            if key.is_empty() || !rest[pos..].starts_with("=\"") {
                return Err(HawkError::Syntax(offset + pos));
            }
            pos += 2;

            let value_start = pos;
            let close = rest[pos..]
                .find('"')
                .ok_or(HawkError::Syntax(offset + pos))?;
            let attribute = &rest[value_start..value_start + close];
            if !attribute.chars().all(valid_value_char) {
                return Err(HawkError::Syntax(offset + value_start));
            }
            pos = value_start + close + 1;

            let slot = match key {
                "id" => &mut id,
                "ts" => &mut ts,
                "nonce" => &mut nonce,
                "mac" => &mut mac,
                "hash" => &mut hash,
                "ext" => &mut ext,
                "app" => &mut app,
                "dlg" => &mut dlg,
                _ => return Err(HawkError::UnknownAttribute(key.to_string())),
            };
            if slot.is_some() {
                return Err(HawkError::DuplicateAttribute(key.to_string()));
            }
            *slot = Some(attribute.to_string());
        }

        let ts = ts.ok_or(HawkError::MissingAttribute("ts"))?;
        Ok(Header {
            id: id.ok_or(HawkError::MissingAttribute("id"))?,
            ts: ts.parse().map_err(|_| HawkError::Timestamp(ts.clone()))?,
            nonce: nonce.ok_or(HawkError::MissingAttribute("nonce"))?,
            mac: mac.ok_or(HawkError::MissingAttribute("mac"))?,
            hash,
            ext,
            app,
            dlg,
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"{} id="{}", ts="{}", nonce="{}""#,
            SCHEME, self.id, self.ts, self.nonce
        )?;
        if let Some(hash) = &self.hash {
            write!(f, r#", hash="{}""#, hash)?;
        }
        if let Some(ext) = &self.ext {
            write!(f, r#", ext="{}""#, ext)?;
        }
        write!(f, r#", mac="{}""#, self.mac)?;
        if let Some(app) = &self.app {
            write!(f, r#", app="{}""#, app)?;
            if let Some(dlg) = &self.dlg {
                write!(f, r#", dlg="{}""#, dlg)?;
            }
        }
        Ok(())
    }
}

impl Header {
    /// Client side signing: build the header for `artifacts` under
    /// `credential`.
    pub fn sign(credential: &Credential, artifacts: &Artifacts) -> Header {
        Header {
            id: credential.id.clone(),
            ts: artifacts.ts,
            nonce: artifacts.nonce.clone(),
            mac: calculate_mac(credential, artifacts),
            hash: artifacts.hash.clone(),
            ext: artifacts.ext.clone(),
            app: artifacts.app.clone(),
            dlg: artifacts.dlg.clone(),
        }
    }
}

impl Artifacts {
    /// Artifacts for a request about to be signed, stamped with the current
    /// time and a fresh nonce.
    pub fn new(method: &str, resource: &str, host: &str, port: u16) -> Artifacts {
        Artifacts {
            method: method.to_uppercase(),
            resource: String::from(resource),
            host: host.to_lowercase(),
            port,
            ts: now(),
            nonce: generate_nonce(),
            hash: None,
            ext: None,
            app: None,
            dlg: None,
        }
    }

    /// The artifacts a server reconstructs from a received header and the
    /// request it arrived on.
    pub fn from_header(header: &Header, method: &str, resource: &str, host: &str, port: u16) -> Artifacts {
        Artifacts {
            method: method.to_uppercase(),
            resource: String::from(resource),
            host: host.to_lowercase(),
            port,
            ts: header.ts,
            nonce: header.nonce.clone(),
            hash: header.hash.clone(),
            ext: header.ext.clone(),
            app: header.app.clone(),
            dlg: header.dlg.clone(),
        }
    }

    pub fn with_payload(mut self, content_type: &str, payload: &[u8]) -> Artifacts {
        self.hash = Some(payload_hash(content_type, payload));
        self
    }

    pub fn normalized(&self) -> String {
        let mut normalized = format!(
            "hawk.{}.header\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
            HEADER_VERSION,
            self.ts,
            self.nonce,
            self.method,
            self.resource,
            self.host,
            self.port,
            self.hash.as_deref().unwrap_or(""),
            escape_ext(self.ext.as_deref().unwrap_or("")),
        );
        if let Some(app) = &self.app {
            normalized.push_str(app);
            normalized.push('\n');
            normalized.push_str(self.dlg.as_deref().unwrap_or(""));
            normalized.push('\n');
        }
        normalized
    }
}

fn escape_ext(ext: &str) -> String {
    ext.replace('\\', "\\\\").replace('\n', "\\n")
}

/// base64(HMAC(key, normalized string)).
pub fn calculate_mac(credential: &Credential, artifacts: &Artifacts) -> String {
    let tag = hmac::sign(&credential.hmac_key(), artifacts.normalized().as_bytes());
    STANDARD.encode(tag.as_ref())
}

/// Constant time comparison of the supplied MAC against the one expected for
/// `artifacts`.
pub fn verify_mac(credential: &Credential, artifacts: &Artifacts, mac: &str) -> bool {
    let tag = match STANDARD.decode(mac) {
        Ok(tag) => tag,
        Err(_) => return false,
    };
    hmac::verify(&credential.hmac_key(), artifacts.normalized().as_bytes(), &tag).is_ok()
}

/// base64(SHA-256("hawk.1.payload\n{content-type}\n{payload}\n")). The content
/// type is lower cased and stripped of parameters.
pub fn payload_hash(content_type: &str, payload: &[u8]) -> String {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    let mut context = digest::Context::new(&digest::SHA256);
    context.update(format!("hawk.{}.payload\n{}\n", HEADER_VERSION, mime).as_bytes());
    context.update(payload);
    context.update(b"\n");
    STANDARD.encode(context.finish().as_ref())
}

/// Constant time comparison of two payload hashes.
pub fn hashes_match(expected: &str, supplied: &str) -> bool {
    ring::constant_time::verify_slices_are_equal(expected.as_bytes(), supplied.as_bytes()).is_ok()
}

pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Seconds since the unix epoch.
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since_the_epoch| since_the_epoch.as_secs() as i64)
        .unwrap_or(0)
}

/// Split a `Host` header into host and port, defaulting the port to 80.
pub fn split_host(host: &str) -> (String, u16) {
    let host = host.trim();
    let (name, port) = if let Some(stripped) = host.strip_prefix('[') {
        // [::1]:8080
        match stripped.split_once(']') {
            Some((name, rest)) => (name, rest.strip_prefix(':')),
            None => (host, None),
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) => (name, Some(port)),
            None => (host, None),
        }
    };
    let port = port.and_then(|port| port.parse().ok()).unwrap_or(80);
    (name.to_lowercase(), port)
}
