//! The seam between the resource-tree dispatcher and the two authentication
//! state machines (C4 Digest, C5 UC-Auth, C6 restriction flows). Those
//! engines live in `uc-auth`; handlers here only see this trait, so
//! `uc-core` never depends on `uc-auth`.

use async_trait::async_trait;

/// Result of a single authentication attempt. `stale` drives the
/// `WWW-Authenticate`/`X-UCClientAuthenticate` `stale=` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthOutcome {
    pub authenticated: bool,
    pub stale: bool,
}

impl AuthOutcome {
    pub const FAIL: AuthOutcome = AuthOutcome {
        authenticated: false,
        stale: false,
    };
    pub const STALE: AuthOutcome = AuthOutcome {
        authenticated: false,
        stale: true,
    };
    pub const OK: AuthOutcome = AuthOutcome {
        authenticated: true,
        stale: false,
    };
}

/// Outcome of a restriction confirmation/authorisation check (C6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestrictionOutcome {
    /// The nonce was confirmed/authorised; the operation proceeds.
    Proceed,
    /// The client aborted; respond 410.
    Aborted,
    /// No restriction header was present; a fresh challenge was minted.
    Challenged { nonce: String, message: String },
    /// The header was present but invalid.
    Failed,
}

/// A single request's pending authentication/restriction material, as
/// presented by the handler to the auth engine.
pub struct AuthRequest<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub body: &'a [u8],
    pub header: Option<&'a str>,
    pub client_ip: &'a str,
}

/// The seam `uc-auth` implements and `uc-core` handlers call against.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Whether the server was configured with a security scheme at all
    /// (drives `security-scheme="true|false"` on `GET uc`).
    fn security_scheme_enabled(&self) -> bool;

    /// RFC 2617 Digest check against the `Authorization` header (C4).
    async fn check_digest(&self, request: AuthRequest<'_>) -> AuthOutcome;

    /// UC-Auth check against `X-UCClientAuthorisation` (C5).
    async fn check_uc_auth(&self, request: AuthRequest<'_>) -> AuthOutcome;

    /// `WWW-Authenticate` value for a failed Digest check (§4.4).
    async fn digest_challenge_header(&self, client_ip: &str, stale: bool) -> String;

    /// `X-UCClientAuthenticate` value for a failed UC-Auth check (§4.5).
    async fn uc_auth_challenge_header(&self, method: &str, uri: &str, stale: bool) -> String;

    /// `POST /uc/security` pairing key derivation (§4.5). Returns the hex
    /// `LSGS XOR SSS` key to embed in `<security key="...">`.
    async fn pair(&self, client_id: &str, client_name: &str) -> crate::error::UcResult<String>;

    /// Confirmation flow (`X-UCRestriction-Credentials`), C6.
    async fn check_restriction_confirm(&self, header: Option<&str>) -> RestrictionOutcome;

    /// Authorisation flow (`X-UCRestriction-Credentials: Authorise ...`), C6.
    async fn check_restriction_authorise(
        &self,
        header: Option<&str>,
        method: &str,
        uri: &str,
        body: &[u8],
    ) -> RestrictionOutcome;

    /// Lists paired clients for `GET uc/credentials`.
    async fn list_credentials(&self) -> Vec<crate::model::CredentialInfo>;

    /// Revokes one paired client's credential for `DELETE
    /// uc/credentials/{cid}`. The bug fixed here relative to the credential
    /// table's original behaviour: only the keyed entry is removed, never
    /// the whole table.
    async fn revoke_credential(&self, client_id: &str) -> crate::error::UcResult<()>;
}

/// A provider that accepts everything; used when `auth-enabled` is false
/// in configuration.
pub struct NoAuthProvider;

#[async_trait]
impl AuthProvider for NoAuthProvider {
    fn security_scheme_enabled(&self) -> bool {
        false
    }

    async fn check_digest(&self, _request: AuthRequest<'_>) -> AuthOutcome {
        AuthOutcome::OK
    }

    async fn check_uc_auth(&self, _request: AuthRequest<'_>) -> AuthOutcome {
        AuthOutcome::OK
    }

    async fn digest_challenge_header(&self, _client_ip: &str, _stale: bool) -> String {
        String::new()
    }

    async fn uc_auth_challenge_header(&self, _method: &str, _uri: &str, _stale: bool) -> String {
        String::new()
    }

    async fn pair(&self, _client_id: &str, _client_name: &str) -> crate::error::UcResult<String> {
        Err(crate::error::UcError::NotImplemented(
            "pairing is disabled".to_string(),
        ))
    }

    async fn check_restriction_confirm(&self, _header: Option<&str>) -> RestrictionOutcome {
        RestrictionOutcome::Proceed
    }

    async fn check_restriction_authorise(
        &self,
        _header: Option<&str>,
        _method: &str,
        _uri: &str,
        _body: &[u8],
    ) -> RestrictionOutcome {
        RestrictionOutcome::Proceed
    }

    async fn list_credentials(&self) -> Vec<crate::model::CredentialInfo> {
        Vec::new()
    }

    async fn revoke_credential(&self, _client_id: &str) -> crate::error::UcResult<()> {
        Err(crate::error::UcError::NotImplemented(
            "pairing is disabled".to_string(),
        ))
    }
}
