//! Error taxonomy (§7). Handlers and backend providers return `UcError`; the
//! dispatcher is the sole place that translates a tag into an HTTP status and
//! an `<error>` body. No other layer matches on error kind.

use thiserror::Error;

/// The taxonomy of errors a handler or backend provider can raise.
///
/// Each variant carries a human-readable `message` and, optionally, a
/// longer `explain` clause — together these render as
/// `<error code="NNN">message : explain.</error>`.
#[derive(Debug, Error, Clone)]
pub enum UcError {
    #[error("{0}")]
    InvalidSyntax(String),

    /// Digest authentication failed or was never attempted (§4.4). Carries
    /// the full `WWW-Authenticate` header value to challenge with.
    #[error("{message}")]
    Unauthorized {
        message: String,
        www_authenticate: String,
    },

    /// UC-Auth authentication failed, or a restriction flow challenged or
    /// rejected the request (§4.5/§4.6) — both map to 402. `challenge`, when
    /// present, is `(header-name, header-value)` to attach; restriction
    /// validation failures carry no challenge.
    #[error("{message}")]
    NotAuthenticated {
        message: String,
        challenge: Option<(&'static str, String)>,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    CannotFind(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("{0}")]
    RestrictionAborted(String),

    #[error("{0}")]
    ProcessingFailed(String),
}

impl UcError {
    /// HTTP status code per §7.
    pub fn status(&self) -> u16 {
        match self {
            UcError::InvalidSyntax(_) => 400,
            UcError::Unauthorized { .. } => 401,
            UcError::NotAuthenticated { .. } => 402,
            UcError::Forbidden(_) => 403,
            UcError::CannotFind(_) => 404,
            UcError::NotImplemented(_) => 405,
            UcError::RestrictionAborted(_) => 410,
            UcError::ProcessingFailed(_) => 500,
        }
    }

    /// The short name used in logs and as the taxonomy tag.
    pub fn name(&self) -> &'static str {
        match self {
            UcError::InvalidSyntax(_) => "Invalid Syntax",
            UcError::Unauthorized { .. } => "Unauthorized",
            UcError::NotAuthenticated { .. } => "Not Authenticated",
            UcError::Forbidden(_) => "Forbidden",
            UcError::CannotFind(_) => "Not Found",
            UcError::NotImplemented(_) => "Not Implemented",
            UcError::RestrictionAborted(_) => "Restriction Aborted",
            UcError::ProcessingFailed(_) => "Failed",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UcError::InvalidSyntax(m)
            | UcError::Forbidden(m)
            | UcError::CannotFind(m)
            | UcError::NotImplemented(m)
            | UcError::RestrictionAborted(m)
            | UcError::ProcessingFailed(m) => m,
            UcError::Unauthorized { message, .. } => message,
            UcError::NotAuthenticated { message, .. } => message,
        }
    }

    /// Extra headers the dispatcher must attach beyond the standard set —
    /// the Digest/UC-Auth/restriction challenge headers (§6.1).
    pub fn extra_headers(&self) -> Vec<(&'static str, String)> {
        match self {
            UcError::Unauthorized { www_authenticate, .. } => {
                vec![("WWW-Authenticate", www_authenticate.clone())]
            }
            UcError::NotAuthenticated {
                challenge: Some((name, value)),
                ..
            } => vec![(name, value.clone())],
            _ => Vec::new(),
        }
    }

    /// Renders `<error code="NNN">message : explain.</error>`, escaping both
    /// clauses per §4.8.
    pub fn to_xml(&self) -> String {
        let explain = if self.message().is_empty() {
            self.name().to_string()
        } else {
            self.message().to_string()
        };
        format!(
            "<error code=\"{}\">{} : {}.</error>",
            self.status(),
            crate::xml::escape_text(self.name()),
            crate::xml::escape_text(&explain)
        )
    }
}

pub type UcResult<T> = Result<T, UcError>;
