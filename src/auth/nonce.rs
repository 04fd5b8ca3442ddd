use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Remembers the nonces of verified requests for as long as their
/// timestamps could still be accepted, so a captured request cannot be
/// replayed inside the skew window.
pub struct NonceStore {
    nonces: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl NonceStore {
    pub fn new(ttl: Duration) -> Self {
        NonceStore {
            nonces: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Records the nonce. Returns `false` when it was already recorded and
    /// has not expired.
    pub fn check_and_store(&self, id: &str, ts: i64, nonce: &str) -> bool {
        let key = format!("{}\n{}\n{}", id, ts, nonce);
        let mut nonces = match self.nonces.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        nonces.retain(|_, expiry| *expiry > now);

        if nonces.contains_key(&key) {
            return false;
        }
        nonces.insert(key, now + self.ttl);
        true
    }

    pub fn len(&self) -> usize {
        match self.nonces.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_nonce_rejected_test() {
        let store = NonceStore::new(Duration::from_secs(60));
        assert!(store.check_and_store("apollo", 1, "j4h3g2"));
        assert!(!store.check_and_store("apollo", 1, "j4h3g2"));

        // scoped to the identity and timestamp
        assert!(store.check_and_store("zeus", 1, "j4h3g2"));
        assert!(store.check_and_store("apollo", 2, "j4h3g2"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn expired_nonce_forgotten_test() {
        let store = NonceStore::new(Duration::from_millis(10));
        assert!(store.check_and_store("apollo", 1, "j4h3g2"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.check_and_store("apollo", 1, "j4h3g2"));
        assert_eq!(store.len(), 1);
    }
}
