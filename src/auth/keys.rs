use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use ring::digest;

use crate::models::Node;

/// Derives node keys from a process wide secret.
///
/// A key is the URL safe base64 SHA-256 of
/// `{secret}:{name}:{address}:{dns}:{instant}`. The instant is part of the
/// input, so rotating a key always yields a new one.
#[derive(Clone)]
pub struct KeyIssuer {
    secret: String,
}

impl KeyIssuer {
    pub fn new(secret: impl Into<String>) -> KeyIssuer {
        KeyIssuer {
            secret: secret.into(),
        }
    }

    pub fn issue(&self, identity: &str, address: &str, dns: &str, now: DateTime<Utc>) -> String {
        let rawkey = format!(
            "{}:{}:{}:{}:{}",
            self.secret,
            identity,
            address,
            dns,
            now.to_rfc3339_opts(SecondsFormat::Nanos, true)
        );
        let hash = digest::digest(&digest::SHA256, rawkey.as_bytes());
        URL_SAFE.encode(hash.as_ref())
    }

    /// Sets a freshly issued key on the node. The caller persists it.
    pub fn rotate(&self, node: &mut Node, now: DateTime<Utc>) {
        let key = self.issue(&node.name, node.address_str(), node.dns_str(), now);
        node.key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn apollo() -> Node {
        let mut node = Node::new("apollo");
        node.address = Some(String::from("108.51.64.223"));
        node.dns = Some(String::from("bryant.bengfort.com"));
        node
    }

    #[test]
    fn different_instants_yield_different_keys_test() {
        let issuer = KeyIssuer::new("supersecret");
        let now = Utc::now();
        let key1 = issuer.issue("apollo", "108.51.64.223", "bryant.bengfort.com", now);
        let key2 = issuer.issue(
            "apollo",
            "108.51.64.223",
            "bryant.bengfort.com",
            now + Duration::nanoseconds(1),
        );
        assert_ne!(key1, key2);
    }

    #[test]
    fn issue_is_deterministic_test() {
        let issuer = KeyIssuer::new("supersecret");
        let now = Utc::now();
        assert_eq!(
            issuer.issue("apollo", "108.51.64.223", "", now),
            issuer.issue("apollo", "108.51.64.223", "", now)
        );
        assert_ne!(
            issuer.issue("apollo", "108.51.64.223", "", now),
            KeyIssuer::new("othersecret").issue("apollo", "108.51.64.223", "", now)
        );
    }

    #[test]
    fn key_is_url_safe_base64_sha256_test() {
        let key = KeyIssuer::new("supersecret").issue("apollo", "", "", Utc::now());
        assert_eq!(key.len(), 44);
        assert!(!key.contains('+') && !key.contains('/'));
        assert_eq!(URL_SAFE.decode(&key).unwrap().len(), 32);
    }

    #[test]
    fn rotate_test() {
        let issuer = KeyIssuer::new("supersecret");
        let mut node = apollo();
        let now = Utc::now();

        issuer.rotate(&mut node, now);
        let key1 = node.key.clone().unwrap();
        assert_eq!(
            key1,
            issuer.issue("apollo", "108.51.64.223", "bryant.bengfort.com", now)
        );

        issuer.rotate(&mut node, now + Duration::milliseconds(1));
        assert_ne!(node.key.unwrap(), key1);
    }
}
