//! The single Axum fallback handler implementing the request-handling
//! algorithm of §4.1: receive-timestamp capture, `crossdomain.xml`
//! special case, trie walk, `method_` override, HEAD suppression, and
//! active/standby dispatch split.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use http::{HeaderMap, Method, StatusCode, Uri};

use crate::auth_iface::AuthProvider;
use crate::backend::Backend;
use crate::error::{UcError, UcResult};
use crate::notify::NotificationStore;
use crate::trie::{self, TrieNode};
use crate::xml::escape_attr;

/// The three states `uc/power` toggles between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    On,
    Standby,
    Off,
}

impl PowerMode {
    pub fn as_wire(self) -> &'static str {
        match self {
            PowerMode::On => "on",
            PowerMode::Standby => "standby",
            PowerMode::Off => "off",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "on" => Some(PowerMode::On),
            "standby" => Some(PowerMode::Standby),
            "off" => Some(PowerMode::Off),
            _ => None,
        }
    }
}

/// Shared state reachable from every handler.
pub struct AppState {
    pub name: String,
    pub server_id: String,
    pub version: String,
    pub logo_href: Option<String>,
    pub trie: TrieNode<Arc<dyn ResourceHandler>>,
    /// Options enabled at startup whose path starts with `uc/`, used to
    /// populate `GET uc`'s `<resource rref="uc/...">` children.
    pub enabled_resource_paths: Vec<String>,
    pub backend: Arc<Backend>,
    pub notifications: Arc<NotificationStore>,
    pub auth: Arc<dyn AuthProvider>,
    /// `true` while the server is in `standby` or `off`, gating the
    /// dispatcher's `standby_do_*` split.
    pub standby: Arc<AtomicBool>,
    pub power_mode: std::sync::Mutex<PowerMode>,
    pub long_poll_timeout: std::time::Duration,
    /// Sources, source lists, and outputs are backend-owned but core-read;
    /// the backend populates and mutates these directly and notifies
    /// through [`AppState::notifications`] per §4.2.
    pub sources: std::sync::Mutex<crate::model::SourceRegistry>,
    pub source_lists: std::sync::Mutex<crate::model::SourceListRegistry>,
    pub outputs: std::sync::Mutex<crate::model::OutputRegistry>,
    pub acquisitions: std::sync::Mutex<crate::model::AcquisitionRegistry>,
    pub storage: std::sync::Mutex<crate::model::StorageRegistry>,
}

/// Everything a handler needs to answer one request.
pub struct RequestContext {
    pub captures: Vec<String>,
    pub raw_query: String,
    pub parsed_query: HashMap<String, Vec<String>>,
    pub head: bool,
    pub method: String,
    pub rcvd_time: DateTime<Utc>,
    pub body: Bytes,
    pub headers: HeaderMap,
    pub resource_uri: String,
    pub state: Arc<AppState>,
}

impl RequestContext {
    pub fn query_one(&self, key: &str) -> Option<&str> {
        self.parsed_query.get(key).and_then(|v| v.first()).map(|s| s.as_str())
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn client_ip(&self) -> &str {
        "0.0.0.0"
    }
}

/// A handler's successful result: the inner XML fragment to wrap in
/// `<response resource="...">...</response>`, or a bare 204.
pub enum HandlerResponse {
    Xml(String),
    /// Like `Xml`, but the envelope's `resource=` attribute is the given
    /// URI rather than the request's own. Used when a POST creates a new
    /// resource and the response must echo the created item's URI (e.g.
    /// `uc/acquisitions/<aid>`), not the URI it was POSTed to.
    XmlAt { resource: String, inner: String },
    NoContent,
    /// An unwrapped response, bypassing the `<response resource="...">`
    /// envelope entirely. Used only by the `uc/apps/{aid}/ext/**` reverse
    /// proxy, whose body is owned by the extension, not this server.
    Raw {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
}

impl HandlerResponse {
    pub fn xml(inner: impl Into<String>) -> Self {
        HandlerResponse::Xml(inner.into())
    }

    pub fn xml_at(resource: impl Into<String>, inner: impl Into<String>) -> Self {
        HandlerResponse::XmlAt {
            resource: resource.into(),
            inner: inner.into(),
        }
    }
}

/// One resource handler (C8). Every handler is registered at exactly one
/// trie path; the dispatcher never authenticates on the handler's behalf —
/// each `do_*` calls into [`AuthProvider`] itself so the body can feed the
/// MAC computation.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn auth_required(&self) -> bool {
        true
    }

    async fn do_get(&self, _ctx: &RequestContext) -> UcResult<HandlerResponse> {
        Err(UcError::NotImplemented("GET not supported here".to_string()))
    }
    async fn do_put(&self, _ctx: &RequestContext) -> UcResult<HandlerResponse> {
        Err(UcError::NotImplemented("PUT not supported here".to_string()))
    }
    async fn do_post(&self, _ctx: &RequestContext) -> UcResult<HandlerResponse> {
        Err(UcError::NotImplemented("POST not supported here".to_string()))
    }
    async fn do_delete(&self, _ctx: &RequestContext) -> UcResult<HandlerResponse> {
        Err(UcError::NotImplemented("DELETE not supported here".to_string()))
    }

    async fn standby_do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        self.do_get(ctx).await
    }
    async fn standby_do_put(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        self.do_put(ctx).await
    }
    async fn standby_do_post(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        self.do_post(ctx).await
    }
    async fn standby_do_delete(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        self.do_delete(ctx).await
    }
}

/// Percent-decodes a raw query string while preserving key/value pair order
/// — used for the envelope's echoed `resource=` attribute, which §4.7
/// reconstructs from the decoded query rather than the wire form.
fn decode_query(raw: &str) -> String {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or("");
            let key = crate::xml::percent_decode(key).unwrap_or_else(|_| key.to_string());
            match parts.next() {
                Some(value) => {
                    let value =
                        crate::xml::percent_decode(value).unwrap_or_else(|_| value.to_string());
                    format!("{key}={value}")
                }
                None => key,
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn parse_query(raw: &str) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    if raw.is_empty() {
        return out;
    }
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let mut parts = pair.splitn(2, '=');
        let key = parts.next().unwrap_or("");
        let value = parts.next().unwrap_or("");
        let key = crate::xml::percent_decode(key).unwrap_or_else(|_| key.to_string());
        let value = crate::xml::percent_decode(value).unwrap_or_else(|_| value.to_string());
        out.entry(key).or_default().push(value);
    }
    out
}

const CROSSDOMAIN_BODY: &str = concat!(
    "<?xml version=\"1.0\"?>\n",
    "<!DOCTYPE cross-domain-policy SYSTEM \"http://www.adobe.com/xml/dtds/cross-domain-policy.dtd\">\n",
    "<cross-domain-policy>\n",
    "  <allow-access-from domain=\"*\"/>\n",
    "</cross-domain-policy>\n",
);

fn crossdomain_response() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "text/xml")
        .body(Body::from(CROSSDOMAIN_BODY))
        .unwrap()
        .into_response()
}

fn render_response(resource_uri: &str, resp: HandlerResponse, head: bool) -> Response {
    if let HandlerResponse::Raw { status, headers, body } = resp {
        let body_bytes = if head { Vec::new() } else { body };
        let mut builder = Response::builder()
            .status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        return builder.body(Body::from(body_bytes)).unwrap().into_response();
    }

    let (status, body) = match resp {
        HandlerResponse::NoContent => (StatusCode::NO_CONTENT, String::new()),
        HandlerResponse::Xml(inner) => (
            StatusCode::OK,
            format!(
                "<response resource=\"{}\">{}</response>",
                escape_attr(resource_uri),
                inner
            ),
        ),
        HandlerResponse::XmlAt { resource, inner } => (
            StatusCode::OK,
            format!(
                "<response resource=\"{}\">{}</response>",
                escape_attr(&resource),
                inner
            ),
        ),
        HandlerResponse::Raw { .. } => unreachable!("handled above"),
    };

    let body_bytes = if head { String::new() } else { body };

    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/xml; charset=UTF-8")
        .header(http::header::CACHE_CONTROL, "no-cache")
        .header(http::header::CONTENT_LENGTH, body_bytes.len())
        .body(Body::from(body_bytes))
        .unwrap()
        .into_response()
}

fn error_response(err: UcError) -> Response {
    let body = err.to_xml();
    let mut builder = Response::builder()
        .status(StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        .header(http::header::CONTENT_TYPE, "application/xml; charset=UTF-8")
        .header(http::header::CACHE_CONTROL, "no-cache")
        .header(http::header::CONTENT_LENGTH, body.len());
    for (name, value) in err.extra_headers() {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(body)).unwrap().into_response()
}

/// Gates a handler body behind Digest or UC-Auth (§4.4/§4.5): a request
/// carrying `X-UCClientAuthorisation` is checked as UC-Auth, one carrying
/// only `Authorization` is checked as Digest, and a request with neither
/// receives a fresh UC-Auth challenge — matching §8's literal "UC-Auth
/// fresh challenge" scenario for an unauthenticated request. Each handler
/// calls this itself (never the dispatcher) so the request body can still
/// feed the MAC computation downstream.
pub async fn require_auth(ctx: &RequestContext) -> UcResult<()> {
    use crate::auth_iface::AuthRequest;

    let uc_header = ctx.header_str("x-ucclientauthorisation");
    let digest_header = ctx.header_str("authorization");

    if uc_header.is_none() && digest_header.is_some() {
        let request = AuthRequest {
            method: &ctx.method,
            uri: &ctx.resource_uri,
            body: &ctx.body,
            header: digest_header,
            client_ip: ctx.client_ip(),
        };
        let outcome = ctx.state.auth.check_digest(request).await;
        if outcome.authenticated {
            return Ok(());
        }
        let www_authenticate = ctx
            .state
            .auth
            .digest_challenge_header(ctx.client_ip(), outcome.stale)
            .await;
        return Err(UcError::Unauthorized {
            message: "digest authentication required".to_string(),
            www_authenticate,
        });
    }

    let request = AuthRequest {
        method: &ctx.method,
        uri: &ctx.resource_uri,
        body: &ctx.body,
        header: uc_header,
        client_ip: ctx.client_ip(),
    };
    let outcome = ctx.state.auth.check_uc_auth(request).await;
    if outcome.authenticated {
        return Ok(());
    }
    let challenge = ctx
        .state
        .auth
        .uc_auth_challenge_header(&ctx.method, &ctx.resource_uri, outcome.stale)
        .await;
    Err(UcError::NotAuthenticated {
        message: "uc-auth authentication required".to_string(),
        challenge: Some(("X-UCClientAuthenticate", challenge)),
    })
}

/// The Axum fallback entry point. Mount with `Server::add_fallback("/",
/// dispatch::handle)`; it must see every request, since the trie — not
/// Axum's router — owns path matching.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let rcvd_time = Utc::now();
    let path = uri.path();

    if path == "/crossdomain.xml" && method == Method::GET {
        return crossdomain_response();
    }

    let raw_query = uri.query().unwrap_or("").to_string();
    let parsed_query = parse_query(&raw_query);

    let mut effective_method = method.as_str().to_ascii_uppercase();
    let mut head = false;
    if let Some(values) = parsed_query.get("method_") {
        if let Some(m) = values.first() {
            effective_method = m.to_ascii_uppercase();
        }
    }
    if effective_method == "HEAD" {
        effective_method = "GET".to_string();
        head = true;
    }

    let segments = match trie::split_path(path) {
        Ok(s) => s,
        Err(err) => return error_response(err),
    };

    let Some((handler, captures)) = state.trie.lookup(&segments) else {
        return error_response(UcError::NotImplemented(format!(
            "no resource registered at {path}"
        )));
    };

    let decoded_query = decode_query(&raw_query);
    let resource_uri = if decoded_query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{decoded_query}")
    };

    let ctx = RequestContext {
        captures,
        raw_query,
        parsed_query,
        head,
        method: effective_method.clone(),
        rcvd_time,
        body,
        headers,
        resource_uri: resource_uri.clone(),
        state: state.clone(),
    };

    let standby = state.standby.load(Ordering::SeqCst);

    let result = match (effective_method.as_str(), standby) {
        ("GET", true) => handler.standby_do_get(&ctx).await,
        ("GET", false) => handler.do_get(&ctx).await,
        ("PUT", true) => handler.standby_do_put(&ctx).await,
        ("PUT", false) => handler.do_put(&ctx).await,
        ("POST", true) => handler.standby_do_post(&ctx).await,
        ("POST", false) => handler.do_post(&ctx).await,
        ("DELETE", true) => handler.standby_do_delete(&ctx).await,
        ("DELETE", false) => handler.do_delete(&ctx).await,
        (other, _) => Err(UcError::NotImplemented(format!(
            "method {other} not supported"
        ))),
    };

    match result {
        Ok(resp) => render_response(&resource_uri, resp, head),
        Err(err) => error_response(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_query_params_and_decodes() {
        let parsed = parse_query("sid=a&sid=b&text=hello%20world");
        assert_eq!(parsed["sid"], vec!["a".to_string(), "b".to_string()]);
        assert_eq!(parsed["text"], vec!["hello world".to_string()]);
    }

    #[test]
    fn empty_query_parses_to_empty_map() {
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn decode_query_percent_decodes_while_preserving_order() {
        assert_eq!(
            decode_query("global-content-id=crid%3A//example.com/abc"),
            "global-content-id=crid://example.com/abc"
        );
        assert_eq!(
            decode_query("client-id=abc&client-name=Tablet"),
            "client-id=abc&client-name=Tablet"
        );
    }
}
