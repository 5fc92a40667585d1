//! RFC 2617 Digest authentication (C4), `qop=auth` / `algorithm=MD5` only.
//!
//! The server's nonce is not tracked in a table: it is deterministically
//! derived from `(realm, client-ip, server-instance-id)`, so a request's
//! nonce is checked by recomputing the expected value rather than by
//! lookup. A mismatch is reported as `stale` rather than a flat failure,
//! matching RFC 2617 §3.2.1's guidance that a client should retry once with
//! a fresh nonce before treating the challenge as a hard failure.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use md5::{Digest, Md5};
use uc_core::auth_iface::{AuthOutcome, AuthRequest};

use crate::hexutil;
use crate::kv;

fn md5_hex(s: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(s.as_bytes());
    hexutil::encode(&hasher.finalize())
}

pub struct DigestEngine {
    realm: String,
    server_hash: String,
    /// `username -> H(username:realm:password)`.
    confirmed: Mutex<HashMap<String, String>>,
    /// Plaintext passwords accepted for any not-yet-seen username; the
    /// first successful request against one of these promotes its username
    /// into `confirmed` and removes the password from this set.
    pending_passwords: Mutex<HashSet<String>>,
}

impl DigestEngine {
    pub fn new(realm: impl Into<String>, server_hash: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            server_hash: server_hash.into(),
            confirmed: Mutex::new(HashMap::new()),
            pending_passwords: Mutex::new(HashSet::new()),
        }
    }

    /// Registers a password that will bind to whichever username first
    /// authenticates successfully with it.
    pub fn accept_pending_password(&self, password: impl Into<String>) {
        self.pending_passwords.lock().unwrap().insert(password.into());
    }

    pub fn expected_nonce(&self, client_ip: &str) -> String {
        md5_hex(&format!("{}:{client_ip}:{}", self.realm, self.server_hash))
    }

    /// Builds the `WWW-Authenticate` challenge header value for a failed
    /// check against this client IP.
    pub fn challenge_header(&self, client_ip: &str, stale: bool) -> String {
        format!(
            r#"Digest realm="{}", nonce="{}", qop="auth", algorithm=MD5, stale="{}""#,
            self.realm,
            self.expected_nonce(client_ip),
            stale,
        )
    }

    pub async fn check(&self, request: AuthRequest<'_>) -> AuthOutcome {
        let Some(header) = request.header else {
            return AuthOutcome::FAIL;
        };
        let (scheme, params) = kv::parse_header(header);
        if scheme != "Digest" {
            return AuthOutcome::FAIL;
        }
        let (Some(username), Some(nonce), Some(uri), Some(response), Some(nc), Some(cnonce)) = (
            params.get("username"),
            params.get("nonce"),
            params.get("uri"),
            params.get("response"),
            params.get("nc"),
            params.get("cnonce"),
        ) else {
            return AuthOutcome::FAIL;
        };
        let qop = params.get("qop").map(String::as_str).unwrap_or("auth");
        if qop != "auth" {
            return AuthOutcome::FAIL;
        }

        if *nonce != self.expected_nonce(request.client_ip) {
            return AuthOutcome::STALE;
        }
        if !kv::paths_match(uri, request.uri) {
            return AuthOutcome::FAIL;
        }

        let ha2 = md5_hex(&format!("{}:{uri}", request.method));

        if let Some(ha1) = self.confirmed.lock().unwrap().get(username).cloned() {
            let expected = md5_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}"));
            return if &expected == response {
                AuthOutcome::OK
            } else {
                AuthOutcome::FAIL
            };
        }

        let candidates: Vec<String> = self.pending_passwords.lock().unwrap().iter().cloned().collect();
        for password in candidates {
            let ha1 = md5_hex(&format!("{username}:{}:{password}", self.realm));
            let expected = md5_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}"));
            if &expected == response {
                self.pending_passwords.lock().unwrap().remove(&password);
                self.confirmed.lock().unwrap().insert(username.clone(), ha1);
                return AuthOutcome::OK;
            }
        }

        AuthOutcome::FAIL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_response(
        engine: &DigestEngine,
        username: &str,
        password: &str,
        client_ip: &str,
        method: &str,
        uri: &str,
        nc: &str,
        cnonce: &str,
    ) -> (String, String) {
        let nonce = engine.expected_nonce(client_ip);
        let ha1 = md5_hex(&format!("{username}:{}:{password}", engine.realm));
        let ha2 = md5_hex(&format!("{method}:{uri}"));
        let response = md5_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:auth:{ha2}"));
        (nonce, response)
    }

    #[tokio::test]
    async fn pending_password_promotes_on_first_success() {
        let engine = DigestEngine::new("uc-realm", "srv-hash");
        engine.accept_pending_password("hunter2");
        let (nonce, response) =
            digest_response(&engine, "alice", "hunter2", "10.0.0.5", "GET", "uc/outputs/main", "00000001", "abcd");
        let header = format!(
            r#"Digest username="alice", realm="uc-realm", nonce="{nonce}", uri="uc/outputs/main", response="{response}", qop=auth, nc=00000001, cnonce="abcd""#
        );
        let outcome = engine
            .check(AuthRequest {
                method: "GET",
                uri: "uc/outputs/main",
                body: b"",
                header: Some(&header),
                client_ip: "10.0.0.5",
            })
            .await;
        assert_eq!(outcome, AuthOutcome::OK);
        assert!(engine.confirmed.lock().unwrap().contains_key("alice"));
        assert!(engine.pending_passwords.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mismatched_nonce_is_stale() {
        let engine = DigestEngine::new("uc-realm", "srv-hash");
        engine.accept_pending_password("hunter2");
        let header = r#"Digest username="alice", realm="uc-realm", nonce="deadbeef", uri="uc/outputs/main", response="x", qop=auth, nc=00000001, cnonce="abcd""#;
        let outcome = engine
            .check(AuthRequest {
                method: "GET",
                uri: "uc/outputs/main",
                body: b"",
                header: Some(header),
                client_ip: "10.0.0.5",
            })
            .await;
        assert_eq!(outcome, AuthOutcome::STALE);
    }
}
