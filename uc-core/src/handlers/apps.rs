//! `uc/apps`, `uc/apps/{aid}`, `uc/apps/{aid}/ext/**` (§4.7): app
//! activation and the reverse-proxied extension surface.

use async_trait::async_trait;

use crate::auth_iface::AuthRequest;
use crate::dispatch::{require_auth, HandlerResponse, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};
use crate::xml::escape_attr;

/// `POST uc/apps?sid=…[&cid=…]`, `DELETE uc/apps/{aid}`.
pub struct AppsHandler;

#[async_trait]
impl ResourceHandler for AppsHandler {
    async fn do_post(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let sid = ctx
            .query_one("sid")
            .ok_or_else(|| UcError::InvalidSyntax("missing sid".to_string()))?;
        let cid = ctx.query_one("cid").unwrap_or("");

        let aid = ctx.state.backend.apps.activate(sid, cid).await?;
        ctx.state.notifications.notify("uc/apps");

        Ok(HandlerResponse::xml(format!(
            "<app aid=\"{}\" sid=\"{}\" cid=\"{}\"/>",
            escape_attr(&aid),
            escape_attr(sid),
            escape_attr(cid),
        )))
    }

    async fn do_delete(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let aid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing aid".to_string()))?;
        ctx.state.backend.apps.deactivate(aid).await?;
        ctx.state.notifications.notify("uc/apps");
        Ok(HandlerResponse::NoContent)
    }
}

/// `uc/apps/{aid}/ext/**`: a reverse proxy into the app's own extension
/// surface. The handler strips the first four path segments (`uc`, `apps`,
/// `{aid}`, `ext`) before forwarding — the trie capture already carries
/// only the `aid` and the remainder, so there is nothing left to strip
/// here beyond splitting the remainder into segments for the extension.
pub struct AppExtensionHandler;

impl AppExtensionHandler {
    async fn proxy(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        let aid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing aid".to_string()))?;
        let remainder = ctx.captures.get(1).map(String::as_str).unwrap_or("");

        // Forwarded headers exclude both auth headers; authentication is
        // evaluated here and passed through as a plain bool instead.
        let headers: Vec<(String, String)> = ctx
            .headers
            .iter()
            .filter(|(name, _)| {
                let name = name.as_str();
                !name.eq_ignore_ascii_case("authorization")
                    && !name.eq_ignore_ascii_case("x-ucclientauthorisation")
            })
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let params: Vec<(String, String)> = ctx
            .parsed_query
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.clone(), v.clone())))
            .collect();

        let auth_header = ctx
            .header_str("x-ucclientauthorisation")
            .or_else(|| ctx.header_str("authorization"));
        let auth_request = AuthRequest {
            method: &ctx.method,
            uri: &ctx.resource_uri,
            body: &ctx.body,
            header: auth_header,
            client_ip: ctx.client_ip(),
        };
        let authenticated = if ctx.header_str("x-ucclientauthorisation").is_some() {
            ctx.state.auth.check_uc_auth(auth_request).await.authenticated
        } else if auth_header.is_some() {
            ctx.state.auth.check_digest(auth_request).await.authenticated
        } else {
            false
        };

        let response = ctx
            .state
            .backend
            .apps
            .request(
                aid,
                remainder,
                &ctx.method,
                &headers,
                &params,
                authenticated,
                &ctx.body,
            )
            .await?;

        // Protocol error for the extension to answer with an auth
        // challenge of its own; downgrade to 500 rather than relay it.
        let challenge_header = response
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("www-authenticate") || name.eq_ignore_ascii_case("x-ucclientauthenticate"));
        if response.status == 401 || response.status == 402 || challenge_header {
            return Err(UcError::ProcessingFailed(
                "extension returned an auth challenge".to_string(),
            ));
        }

        Ok(HandlerResponse::Raw {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }
}

#[async_trait]
impl ResourceHandler for AppExtensionHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        self.proxy(ctx).await
    }
    async fn do_put(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        self.proxy(ctx).await
    }
    async fn do_post(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        self.proxy(ctx).await
    }
    async fn do_delete(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        self.proxy(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_auth_headers_case_insensitively() {
        let mut map = http::HeaderMap::new();
        map.insert("Authorization", "Digest foo".parse().unwrap());
        map.insert("X-Other", "keep".parse().unwrap());
        let kept: Vec<String> = map
            .iter()
            .filter(|(name, _)| {
                let name = name.as_str();
                !name.eq_ignore_ascii_case("authorization")
                    && !name.eq_ignore_ascii_case("x-ucclientauthorisation")
            })
            .map(|(name, _)| name.as_str().to_string())
            .collect();
        assert_eq!(kept, vec!["x-other".to_string()]);
    }
}
