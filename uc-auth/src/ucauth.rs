//! UC-Auth (C5): per-request PBKDF2-HMAC-SHA1 digests over
//! `X-UCClientAuthorisation`, plus pairing (`POST uc/security`).
//!
//! Validation follows a fixed order so that every failure reports the most
//! specific reason available: header shape, then URI binding, then client
//! existence, then nonce freshness, then iteration count, and only then the
//! digest itself. A nonce is dropped (forcing a fresh challenge on the next
//! request) once its `nc` reaches `nc_limit`, bounding how long a single
//! nonce may be reused.

use std::collections::HashMap;
use std::sync::Mutex;

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha1::Sha1;
use uc_core::auth_iface::{AuthOutcome, AuthRequest};
use uc_core::error::{UcError, UcResult};

use crate::clients::{ClientCredential, ClientTable};
use crate::hexutil;
use crate::kv;
use crate::nonce::{self, NonceTable};

const KEY_LEN: usize = 64;

pub const DEFAULT_ITERATION: u32 = 10;
pub const DEFAULT_NC_LIMIT: u32 = 10;
pub const DEFAULT_NONCE_TTL_SECS: i64 = 300;

struct PendingClient {
    client_id: String,
    name: String,
    key: Vec<u8>,
}

pub struct UcAuthEngine {
    server_hash: String,
    sss: u8,
    iteration: u32,
    nc_limit: u32,
    nonce_ttl_secs: i64,
    clients: ClientTable,
    pending: Mutex<Option<PendingClient>>,
    nonces: NonceTable,
}

impl UcAuthEngine {
    pub fn new(server_hash: impl Into<String>, sss: u8, clients: ClientTable) -> Self {
        Self {
            server_hash: server_hash.into(),
            sss,
            iteration: DEFAULT_ITERATION,
            nc_limit: DEFAULT_NC_LIMIT,
            nonce_ttl_secs: DEFAULT_NONCE_TTL_SECS,
            clients,
            pending: Mutex::new(None),
            nonces: NonceTable::new(),
        }
    }

    pub fn mint_challenge(&self, method: &str, path: &str) -> String {
        let n = nonce::mint(&self.server_hash, method, path, self.nonce_ttl_secs);
        self.nonces.insert(&n);
        n
    }

    /// Builds the `X-UCClientAuthenticate` challenge header value for a
    /// failed check, minting a fresh nonce bound to this method/path.
    pub fn challenge_header(&self, method: &str, path: &str, stale: bool) -> String {
        let nonce = self.mint_challenge(method, path);
        format!(
            r#"Authenticate nonce="{nonce}", iteration="{:08x}", stale="{stale}""#,
            self.iteration,
        )
    }

    pub async fn pair(&self, client_id: &str, client_name: &str) -> UcResult<String> {
        let mut lsgs = vec![0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut lsgs);
        let key_out: Vec<u8> = lsgs.iter().map(|b| b ^ self.sss).collect();
        *self.pending.lock().unwrap() = Some(PendingClient {
            client_id: client_id.to_string(),
            name: client_name.to_string(),
            key: lsgs,
        });
        Ok(hexutil::encode(&key_out))
    }

    fn find_key(&self, client_id: &str) -> Option<(Vec<u8>, bool)> {
        if let Some(cred) = self.clients.lock().unwrap().get(client_id) {
            return Some((cred.key.clone(), true));
        }
        let pending = self.pending.lock().unwrap();
        if let Some(p) = pending.as_ref() {
            if p.client_id == client_id {
                return Some((p.key.clone(), false));
            }
        }
        None
    }

    fn promote_pending(&self, client_id: &str) {
        let mut pending = self.pending.lock().unwrap();
        if pending.as_ref().map(|p| p.client_id.as_str()) == Some(client_id) {
            let p = pending.take().unwrap();
            self.clients.lock().unwrap().insert(
                client_id.to_string(),
                ClientCredential {
                    key: p.key,
                    name: p.name,
                },
            );
        }
    }

    pub async fn check(&self, request: AuthRequest<'_>) -> AuthOutcome {
        let Some(header) = request.header else {
            return AuthOutcome::FAIL;
        };
        let (scheme, params) = kv::parse_header(header);
        if scheme != "Authenticate" {
            return AuthOutcome::FAIL;
        }
        let (Some(nonce_val), Some(iteration), Some(uri), Some(digest), Some(nc_str), Some(client_id), Some(cnonce)) = (
            params.get("nonce"),
            params.get("iteration"),
            params.get("uri"),
            params.get("digest"),
            params.get("nc"),
            params.get("client-id"),
            params.get("cnonce"),
        ) else {
            return AuthOutcome::FAIL;
        };

        if !kv::paths_match(uri, request.uri) {
            return AuthOutcome::FAIL;
        }

        if self.find_key(client_id).is_none() {
            return AuthOutcome::FAIL;
        }

        match nonce::is_valid(nonce_val, &self.server_hash, request.method, request.uri) {
            Some(true) => {}
            _ => return AuthOutcome::STALE,
        }
        let Some(last_nc) = self.nonces.last_nc(nonce_val) else {
            return AuthOutcome::STALE;
        };
        let Ok(nc) = u32::from_str_radix(nc_str, 16) else {
            return AuthOutcome::FAIL;
        };
        if nc < last_nc {
            self.nonces.remove(nonce_val);
            return AuthOutcome::STALE;
        }

        if iteration != &format!("{:08x}", self.iteration) {
            return AuthOutcome::FAIL;
        }

        let (key, confirmed) = self.find_key(client_id).unwrap();
        let body = String::from_utf8_lossy(request.body);
        let message = format!(
            "{}:{uri}:{nonce_val}:{body}:{nc:08x}:{cnonce}",
            request.method
        );
        let mut out = [0u8; 20];
        pbkdf2_hmac::<Sha1>(&key, message.as_bytes(), self.iteration, &mut out);
        let expected = hexutil::encode(&out);
        if &expected != digest {
            return AuthOutcome::FAIL;
        }

        self.nonces.bump_nc(nonce_val, nc);
        if !confirmed {
            self.promote_pending(client_id);
        }
        if nc >= self.nc_limit {
            self.nonces.remove(nonce_val);
        }
        AuthOutcome::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::new_table;

    fn sign(key: &[u8], method: &str, uri: &str, nonce: &str, body: &[u8], nc: u32, cnonce: &str) -> String {
        let body = String::from_utf8_lossy(body);
        let message = format!("{method}:{uri}:{nonce}:{body}:{nc:08x}:{cnonce}");
        let mut out = [0u8; 20];
        pbkdf2_hmac::<Sha1>(key, message.as_bytes(), DEFAULT_ITERATION, &mut out);
        hexutil::encode(&out)
    }

    #[tokio::test]
    async fn pairing_then_first_request_promotes_pending_client() {
        let clients = new_table();
        let engine = UcAuthEngine::new("srv-hash", 0x42, clients.clone());
        let key_hex = engine.pair("client-1", "Living Room Remote").await.unwrap();
        assert_eq!(key_hex.len(), 128);

        let lsgs = {
            let pending = engine.pending.lock().unwrap();
            pending.as_ref().unwrap().key.clone()
        };

        let nonce = engine.mint_challenge("GET", "uc/outputs/main");
        let digest = sign(&lsgs, "GET", "uc/outputs/main", &nonce, b"", 1, "cn1");
        let header = format!(
            r#"Authenticate nonce="{nonce}", iteration="0000000a", uri="uc/outputs/main", digest="{digest}", nc="00000001", client-id="client-1", cnonce="cn1""#
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
        assert!(clients.lock().unwrap().contains_key("client-1"));
        assert!(engine.pending.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn replayed_nc_goes_stale() {
        let clients = new_table();
        clients.lock().unwrap().insert(
            "client-1".to_string(),
            ClientCredential {
                key: vec![9u8; KEY_LEN],
                name: "x".to_string(),
            },
        );
        let engine = UcAuthEngine::new("srv-hash", 0, clients);
        let nonce = engine.mint_challenge("GET", "uc/outputs/main");
        let key = vec![9u8; KEY_LEN];
        let digest = sign(&key, "GET", "uc/outputs/main", &nonce, b"", 5, "cn1");
        let header = format!(
            r#"Authenticate nonce="{nonce}", iteration="0000000a", uri="uc/outputs/main", digest="{digest}", nc="00000005", client-id="client-1", cnonce="cn1""#
        );
        let req = || AuthRequest {
            method: "GET",
            uri: "uc/outputs/main",
            body: b"",
            header: Some(&header),
            client_ip: "10.0.0.5",
        };
        assert_eq!(engine.check(req()).await, AuthOutcome::OK);
        assert_eq!(engine.check(req()).await, AuthOutcome::STALE);
    }
}
