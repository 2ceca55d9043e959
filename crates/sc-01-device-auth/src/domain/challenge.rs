//! Pending challenge storage.
//!
//! ## Invariants
//!
//! - At most one pending challenge per device UUID (issuing overwrites).
//! - `take` removes the entry, so every verification attempt consumes it.
//! - All map access happens under one mutex, held only for the map operation.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use uuid::Uuid;

use crate::ports::Timestamp;

/// RFC 4648 base32 alphabet.
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Length of a generated challenge code (160 bits of entropy).
pub const CHALLENGE_CODE_LEN: usize = 32;

/// Generate a random base32 challenge code.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CHALLENGE_CODE_LEN)
        .map(|_| BASE32_ALPHABET[rng.gen_range(0..BASE32_ALPHABET.len())] as char)
        .collect()
}

/// A challenge issued to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub code: String,
    pub issued_at: Timestamp,
}

impl Challenge {
    pub fn new(code: String, issued_at: Timestamp) -> Self {
        Self { code, issued_at }
    }

    /// Time elapsed since issue; zero if the clock went backwards.
    pub fn age(&self, now: Timestamp) -> Duration {
        Duration::from_millis(now.saturating_sub(self.issued_at))
    }

    /// Expired once strictly more than `ttl` has passed.
    pub fn is_expired(&self, now: Timestamp, ttl: Duration) -> bool {
        self.age(now) > ttl
    }
}

/// In-memory challenge table keyed by device UUID.
#[derive(Debug, Default)]
pub struct ChallengeStore {
    pending: Mutex<HashMap<Uuid, Challenge>>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a challenge, returning the one it replaced (if any).
    pub fn issue(&self, device: Uuid, challenge: Challenge) -> Option<Challenge> {
        self.pending.lock().insert(device, challenge)
    }

    /// Remove and return the pending challenge for a device.
    pub fn take(&self, device: &Uuid) -> Option<Challenge> {
        self.pending.lock().remove(device)
    }

    /// Drop all challenges older than `ttl`. Returns how many were removed.
    pub fn purge_expired(&self, now: Timestamp, ttl: Duration) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, challenge| !challenge.is_expired(now, ttl));
        before - pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_is_base32() {
        let code = generate_code();
        assert_eq!(code.len(), CHALLENGE_CODE_LEN);
        assert!(code.bytes().all(|b| BASE32_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_generated_codes_differ() {
        assert_ne!(generate_code(), generate_code());
    }

    #[test]
    fn test_expiry_boundary() {
        let ttl = Duration::from_secs(300);
        let challenge = Challenge::new("ABC".into(), 1_000_000);
        assert!(!challenge.is_expired(1_300_000, ttl));
        assert!(challenge.is_expired(1_300_001, ttl));
        // clock skew never counts as expired
        assert!(!challenge.is_expired(900_000, ttl));
    }

    #[test]
    fn test_sub_second_overrun_is_expired() {
        let challenge = Challenge::new("ABC".into(), 1_000_000);
        assert!(challenge.is_expired(1_300_990, Duration::from_secs(300)));
        assert_eq!(challenge.age(1_300_990), Duration::from_millis(300_990));
    }

    #[test]
    fn test_issue_overwrites() {
        let store = ChallengeStore::new();
        let device = Uuid::new_v4();

        assert!(store.issue(device, Challenge::new("FIRST".into(), 1)).is_none());
        let replaced = store.issue(device, Challenge::new("SECOND".into(), 2));
        assert_eq!(replaced.unwrap().code, "FIRST");
        assert_eq!(store.len(), 1);
        assert_eq!(store.take(&device).unwrap().code, "SECOND");
    }

    #[test]
    fn test_take_consumes() {
        let store = ChallengeStore::new();
        let device = Uuid::new_v4();
        store.issue(device, Challenge::new("CODE".into(), 1));

        assert!(store.take(&device).is_some());
        assert!(store.take(&device).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let store = ChallengeStore::new();
        store.issue(Uuid::new_v4(), Challenge::new("OLD".into(), 0));
        store.issue(Uuid::new_v4(), Challenge::new("NEW".into(), 500_000));

        assert_eq!(store.purge_expired(700_000, Duration::from_secs(300)), 1);
        assert_eq!(store.len(), 1);
    }
}
