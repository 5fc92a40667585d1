//! The 56-hex-character nonce format shared by C5 (UC-Auth) and C6
//! (restriction): 16 hex digits of expiry (microseconds since epoch) followed
//! by `SHA1(expiry:method:path:server-hash)`. Validity is self-contained —
//! the table below exists only to track `nc` high-water-marks and to let a
//! nonce be consumed (removed) exactly once.

use std::collections::HashMap;
use std::sync::Mutex;

use sha1::{Digest, Sha1};

use crate::hexutil;

pub const NONCE_LEN: usize = 56;

fn now_micros() -> u64 {
    chrono::Utc::now().timestamp_micros() as u64
}

fn digest_part(expiry_us: u64, method: &str, path: &str, server_hash: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{expiry_us:016x}:{method}:{path}:{server_hash}"));
    hexutil::encode(&hasher.finalize())
}

/// Builds a fresh nonce valid for `ttl_secs` seconds from now.
pub fn mint(server_hash: &str, method: &str, path: &str, ttl_secs: i64) -> String {
    let expiry_us = now_micros().wrapping_add((ttl_secs.max(0) as u64).wrapping_mul(1_000_000));
    format!(
        "{expiry_us:016x}{}",
        digest_part(expiry_us, method, path, server_hash)
    )
}

/// Checks the nonce's self-contained expiry and binding, independent of any
/// table lookup. `None` means syntactically invalid.
pub fn is_valid(nonce: &str, server_hash: &str, method: &str, path: &str) -> Option<bool> {
    if nonce.len() != NONCE_LEN || !nonce.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expiry_us = u64::from_str_radix(&nonce[..16], 16).ok()?;
    if expiry_us < now_micros() {
        return Some(false);
    }
    let expected = digest_part(expiry_us, method, path, server_hash);
    Some(nonce[16..] == expected)
}

#[derive(Debug, Clone, Copy)]
pub struct NonceState {
    pub last_nc: u32,
}

/// Tracks `nc` high-water-marks for live nonces and sweeps expired ones
/// lazily on access.
#[derive(Default)]
pub struct NonceTable {
    entries: Mutex<HashMap<String, NonceState>>,
}

impl NonceTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, nonce: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(nonce.to_string(), NonceState { last_nc: 0 });
    }

    /// Returns the previously-seen `nc`, or `None` if the nonce isn't
    /// currently tracked (never minted, already consumed, or swept).
    pub fn last_nc(&self, nonce: &str) -> Option<u32> {
        self.entries.lock().unwrap().get(nonce).map(|s| s.last_nc)
    }

    pub fn bump_nc(&self, nonce: &str, nc: u32) {
        if let Some(state) = self.entries.lock().unwrap().get_mut(nonce) {
            state.last_nc = nc;
        }
    }

    pub fn remove(&self, nonce: &str) {
        self.entries.lock().unwrap().remove(nonce);
    }

    pub fn contains(&self, nonce: &str) -> bool {
        self.entries.lock().unwrap().contains_key(nonce)
    }

    /// Drops entries whose self-contained expiry has already passed.
    /// `server_hash`/`method`/`path` aren't needed here since the expiry
    /// bytes are a plain prefix.
    pub fn sweep(&self) {
        let now = now_micros();
        self.entries.lock().unwrap().retain(|nonce, _| {
            nonce
                .get(..16)
                .and_then(|h| u64::from_str_radix(h, 16).ok())
                .map(|expiry| expiry >= now)
                .unwrap_or(false)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_nonce_validates_against_same_binding() {
        let n = mint("srv-hash", "GET", "uc/outputs/main", 60);
        assert_eq!(n.len(), NONCE_LEN);
        assert_eq!(is_valid(&n, "srv-hash", "GET", "uc/outputs/main"), Some(true));
    }

    #[test]
    fn rejects_mismatched_binding() {
        let n = mint("srv-hash", "GET", "uc/outputs/main", 60);
        assert_eq!(is_valid(&n, "srv-hash", "POST", "uc/outputs/main"), Some(false));
    }

    #[test]
    fn rejects_expired_nonce() {
        let n = mint("srv-hash", "GET", "uc/outputs/main", -1);
        assert_eq!(is_valid(&n, "srv-hash", "GET", "uc/outputs/main"), Some(false));
    }

    #[test]
    fn rejects_malformed_nonce() {
        assert_eq!(is_valid("not-hex", "srv-hash", "GET", "uc/outputs/main"), None);
    }

    #[test]
    fn table_tracks_and_sweeps() {
        let table = NonceTable::new();
        let n = mint("srv-hash", "GET", "uc", 60);
        table.insert(&n);
        assert_eq!(table.last_nc(&n), Some(0));
        table.bump_nc(&n, 3);
        assert_eq!(table.last_nc(&n), Some(3));

        let expired = mint("srv-hash", "GET", "uc", -1);
        table.insert(&expired);
        table.sweep();
        assert!(!table.contains(&expired));
        assert!(table.contains(&n));
    }
}
