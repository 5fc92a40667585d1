//! Authentication and restriction engines (C4 Digest, C5 UC-Auth, C6
//! restriction), wired together behind [`uc_core::auth_iface::AuthProvider`]
//! so `uc-core`'s handlers never depend on this crate directly.

pub mod clients;
pub mod digest;
pub mod hexutil;
pub mod kv;
pub mod nonce;
pub mod restriction;
pub mod ucauth;

use async_trait::async_trait;
use uc_core::auth_iface::{AuthOutcome, AuthProvider, AuthRequest, RestrictionOutcome};
use uc_core::error::UcResult;
use uc_core::model::CredentialInfo;

use clients::ClientTable;
use digest::DigestEngine;
use restriction::RestrictionEngine;
use ucauth::UcAuthEngine;

/// Derives the per-boot server-instance hash nonces are bound to (§4.4's
/// `H(realm:client-ip:server-instance-id)` and §4.5/§4.6's nonce binding),
/// from whatever stable identifier the caller persists as the server-id.
pub fn derive_server_hash(server_id: &str) -> String {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(server_id.as_bytes());
    hexutil::encode(&hasher.finalize())
}

/// Configuration a server binds at startup; `sss` and `pin` both come from
/// the out-of-band pairing code / device PIN, supplied by `uc-config`.
pub struct UcAuthConfig {
    pub realm: String,
    pub server_hash: String,
    pub sss: u8,
    pub pin: String,
}

/// The concrete [`AuthProvider`]: delegates Digest checks to
/// [`DigestEngine`], UC-Auth/pairing to [`UcAuthEngine`], and restriction
/// flows to [`RestrictionEngine`] — the latter two share a [`ClientTable`]
/// so an authorisation digest can be keyed off a paired client's UC-Auth
/// key.
pub struct UcAuthProvider {
    digest: DigestEngine,
    ucauth: UcAuthEngine,
    restriction: RestrictionEngine,
    clients: ClientTable,
}

impl UcAuthProvider {
    pub fn new(config: UcAuthConfig) -> Self {
        let clients = clients::new_table();
        Self {
            digest: DigestEngine::new(config.realm, config.server_hash.clone()),
            ucauth: UcAuthEngine::new(config.server_hash.clone(), config.sss, clients.clone()),
            restriction: RestrictionEngine::new(config.server_hash, config.pin, clients.clone()),
            clients,
        }
    }

    /// Accepts a password out-of-band (e.g. from setup UI) for Digest's
    /// first-use promotion.
    pub fn accept_digest_password(&self, password: impl Into<String>) {
        self.digest.accept_pending_password(password);
    }

    pub fn set_pin(&self, pin: impl Into<String>) {
        self.restriction.set_pin(pin);
    }
}

#[async_trait]
impl AuthProvider for UcAuthProvider {
    fn security_scheme_enabled(&self) -> bool {
        true
    }

    async fn check_digest(&self, request: AuthRequest<'_>) -> AuthOutcome {
        self.digest.check(request).await
    }

    async fn check_uc_auth(&self, request: AuthRequest<'_>) -> AuthOutcome {
        self.ucauth.check(request).await
    }

    async fn digest_challenge_header(&self, client_ip: &str, stale: bool) -> String {
        self.digest.challenge_header(client_ip, stale)
    }

    async fn uc_auth_challenge_header(&self, method: &str, uri: &str, stale: bool) -> String {
        self.ucauth.challenge_header(method, uri, stale)
    }

    async fn pair(&self, client_id: &str, client_name: &str) -> UcResult<String> {
        self.ucauth.pair(client_id, client_name).await
    }

    async fn check_restriction_confirm(&self, header: Option<&str>) -> RestrictionOutcome {
        self.restriction.check_confirm(header).await
    }

    async fn check_restriction_authorise(
        &self,
        header: Option<&str>,
        method: &str,
        uri: &str,
        body: &[u8],
    ) -> RestrictionOutcome {
        self.restriction.check_authorise(header, method, uri, body).await
    }

    async fn list_credentials(&self) -> Vec<CredentialInfo> {
        self.clients
            .lock()
            .unwrap()
            .iter()
            .map(|(client_id, cred)| CredentialInfo {
                client_id: client_id.clone(),
                name: cred.name.clone(),
            })
            .collect()
    }

    async fn revoke_credential(&self, client_id: &str) -> UcResult<()> {
        self.clients.lock().unwrap().remove(client_id);
        Ok(())
    }
}
