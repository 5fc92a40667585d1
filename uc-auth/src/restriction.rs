//! Restriction flows (C6): device-confirmation (`Confirm`/`Abort`) and
//! PIN-based authorisation (`Authorise`), both gated behind
//! `X-UCRestriction-Credentials`.
//!
//! Unlike C5, a restriction nonce carries no method/path binding of its
//! own — it is bound to whichever operation minted it simply by being
//! single-use, tracked in a small table rather than recomputed.

use std::collections::HashMap;
use std::sync::Mutex;

use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use uc_core::auth_iface::RestrictionOutcome;

use crate::clients::ClientTable;
use crate::hexutil;
use crate::kv;
use crate::nonce;

const DEFAULT_ITERATION: u32 = 10;
const DEFAULT_TTL_SECS: i64 = 120;

pub struct RestrictionEngine {
    server_hash: String,
    pin: Mutex<String>,
    iteration: u32,
    ttl_secs: i64,
    clients: ClientTable,
    confirm_nonces: Mutex<HashMap<String, ()>>,
    authorise_nonces: Mutex<HashMap<String, ()>>,
}

impl RestrictionEngine {
    pub fn new(server_hash: impl Into<String>, pin: impl Into<String>, clients: ClientTable) -> Self {
        Self {
            server_hash: server_hash.into(),
            pin: Mutex::new(pin.into()),
            iteration: DEFAULT_ITERATION,
            ttl_secs: DEFAULT_TTL_SECS,
            clients,
            confirm_nonces: Mutex::new(HashMap::new()),
            authorise_nonces: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_pin(&self, pin: impl Into<String>) {
        *self.pin.lock().unwrap() = pin.into();
    }

    pub async fn check_confirm(&self, header: Option<&str>) -> RestrictionOutcome {
        let Some(header) = header else {
            let n = nonce::mint(&self.server_hash, "CONFIRM", "restriction", self.ttl_secs);
            self.confirm_nonces.lock().unwrap().insert(n.clone(), ());
            return RestrictionOutcome::Challenged {
                nonce: n,
                message: "Please confirm this action on the device.".to_string(),
            };
        };
        let (scheme, params) = kv::parse_header(header);
        let Some(n) = params.get("nonce") else {
            return RestrictionOutcome::Failed;
        };
        match scheme.as_str() {
            "Confirm" => {
                let present = self.confirm_nonces.lock().unwrap().remove(n).is_some();
                if present && nonce::is_valid(n, &self.server_hash, "CONFIRM", "restriction") == Some(true) {
                    RestrictionOutcome::Proceed
                } else {
                    RestrictionOutcome::Failed
                }
            }
            "Abort" => {
                self.confirm_nonces.lock().unwrap().remove(n);
                self.authorise_nonces.lock().unwrap().remove(n);
                RestrictionOutcome::Aborted
            }
            _ => RestrictionOutcome::Failed,
        }
    }

    pub async fn check_authorise(
        &self,
        header: Option<&str>,
        method: &str,
        uri: &str,
        body: &[u8],
    ) -> RestrictionOutcome {
        let Some(header) = header else {
            let n = nonce::mint(&self.server_hash, "AUTHORISE", "restriction", self.ttl_secs);
            self.authorise_nonces.lock().unwrap().insert(n.clone(), ());
            return RestrictionOutcome::Challenged {
                nonce: n,
                message: "Enter the device PIN to authorise this action.".to_string(),
            };
        };
        let (scheme, params) = kv::parse_header(header);
        if scheme != "Authorise" {
            return RestrictionOutcome::Failed;
        }
        let (Some(n), Some(iteration), Some(req_uri), Some(digest)) = (
            params.get("nonce"),
            params.get("iteration"),
            params.get("uri"),
            params.get("digest"),
        ) else {
            return RestrictionOutcome::Failed;
        };

        if self.authorise_nonces.lock().unwrap().remove(n).is_none() {
            return RestrictionOutcome::Failed;
        }
        if nonce::is_valid(n, &self.server_hash, "AUTHORISE", "restriction") != Some(true) {
            return RestrictionOutcome::Failed;
        }
        if !kv::paths_match(req_uri, uri) {
            return RestrictionOutcome::Failed;
        }
        if iteration != &format!("{:08x}", self.iteration) {
            return RestrictionOutcome::Failed;
        }

        let pin = self.pin.lock().unwrap().clone();
        let key_material = match params.get("client-id") {
            Some(client_id) => match self.clients.lock().unwrap().get(client_id) {
                Some(cred) => format!("{pin}:{}", hexutil::encode(&cred.key)),
                None => return RestrictionOutcome::Failed,
            },
            None => pin,
        };

        let body_str = String::from_utf8_lossy(body);
        let message = format!("{method}:{req_uri}:{n}:{body_str}");
        let mut out = [0u8; 20];
        pbkdf2_hmac::<Sha1>(key_material.as_bytes(), message.as_bytes(), self.iteration, &mut out);
        let expected = hexutil::encode(&out);

        if &expected == digest {
            RestrictionOutcome::Proceed
        } else {
            RestrictionOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::new_table;

    #[tokio::test]
    async fn missing_header_mints_confirm_challenge() {
        let engine = RestrictionEngine::new("srv-hash", "1234", new_table());
        match engine.check_confirm(None).await {
            RestrictionOutcome::Challenged { nonce, .. } => assert_eq!(nonce.len(), nonce::NONCE_LEN),
            other => panic!("expected Challenged, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn confirm_then_abort_round_trip() {
        let engine = RestrictionEngine::new("srv-hash", "1234", new_table());
        let nonce = match engine.check_confirm(None).await {
            RestrictionOutcome::Challenged { nonce, .. } => nonce,
            _ => unreachable!(),
        };
        let header = format!(r#"Confirm nonce="{nonce}""#);
        assert_eq!(engine.check_confirm(Some(&header)).await, RestrictionOutcome::Proceed);
        // consumed: replay fails
        assert_eq!(engine.check_confirm(Some(&header)).await, RestrictionOutcome::Failed);
    }

    #[tokio::test]
    async fn abort_always_returns_aborted() {
        let engine = RestrictionEngine::new("srv-hash", "1234", new_table());
        let nonce = match engine.check_confirm(None).await {
            RestrictionOutcome::Challenged { nonce, .. } => nonce,
            _ => unreachable!(),
        };
        let header = format!(r#"Abort nonce="{nonce}""#);
        assert_eq!(engine.check_confirm(Some(&header)).await, RestrictionOutcome::Aborted);
    }

    #[tokio::test]
    async fn authorise_with_pin_succeeds() {
        let engine = RestrictionEngine::new("srv-hash", "1234", new_table());
        let nonce = match engine.check_authorise(None, "POST", "uc/outputs/main", b"").await {
            RestrictionOutcome::Challenged { nonce, .. } => nonce,
            _ => unreachable!(),
        };
        let message = format!("POST:uc/outputs/main:{nonce}:");
        let mut out = [0u8; 20];
        pbkdf2_hmac::<Sha1>(b"1234", message.as_bytes(), DEFAULT_ITERATION, &mut out);
        let digest = hexutil::encode(&out);
        let header = format!(
            r#"Authorise nonce="{nonce}", iteration="0000000a", uri="uc/outputs/main", digest="{digest}""#
        );
        let outcome = engine
            .check_authorise(Some(&header), "POST", "uc/outputs/main", b"")
            .await;
        assert_eq!(outcome, RestrictionOutcome::Proceed);
    }
}
