//! The mandatory `uc` resource plus `uc/time` and `uc/events` (§4.7).

use async_trait::async_trait;

use crate::dispatch::{HandlerResponse, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};
use crate::xml::{escape_attr, render_bool, render_time};

/// `GET uc`: capability advertisement.
pub struct BaseHandler;

#[async_trait]
impl ResourceHandler for BaseHandler {
    fn auth_required(&self) -> bool {
        false
    }

    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        let state = &ctx.state;
        let mut inner = String::new();
        for path in &state.enabled_resource_paths {
            inner.push_str(&format!("<resource rref=\"{}\"/>", escape_attr(path)));
        }

        let logo_attr = match &state.logo_href {
            Some(href) => format!(" logo-href=\"{}\"", escape_attr(href)),
            None => String::new(),
        };

        let body = format!(
            "<ucserver name=\"{}\" security-scheme=\"{}\" server-id=\"{}\" version=\"{}\"{}>{}</ucserver>",
            escape_attr(&state.name),
            render_bool(state.auth.security_scheme_enabled()),
            escape_attr(&state.server_id),
            escape_attr(&state.version),
            logo_attr,
            inner,
        );

        Ok(HandlerResponse::xml(body))
    }
}

/// `GET uc/time`: the dispatcher's receive timestamp plus "now".
pub struct TimeHandler;

#[async_trait]
impl ResourceHandler for TimeHandler {
    fn auth_required(&self) -> bool {
        false
    }

    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        let body = format!(
            "<time rcvdtime=\"{}\" replytime=\"{}\"/>",
            render_time(ctx.rcvd_time),
            render_time(chrono::Utc::now()),
        );
        Ok(HandlerResponse::xml(body))
    }
}

/// `GET uc/events?since=<hex64>`: the long-poll notification bus (C2).
pub struct EventsHandler;

#[async_trait]
impl ResourceHandler for EventsHandler {
    fn auth_required(&self) -> bool {
        false
    }

    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        let since_str = ctx
            .query_one("since")
            .ok_or_else(|| UcError::InvalidSyntax("missing since parameter".to_string()))?;
        let since = u64::from_str_radix(since_str, 16)
            .map_err(|_| UcError::InvalidSyntax("since must be 16 hex digits".to_string()))?;

        let standby = ctx
            .state
            .standby
            .load(std::sync::atomic::Ordering::SeqCst);

        let (counter, changed) = ctx
            .state
            .notifications
            .wait_for_events(since, ctx.state.long_poll_timeout, standby)
            .await?;

        let mut inner = String::new();
        for resource in &changed {
            inner.push_str(&format!("<resource rref=\"{}\"/>", escape_attr(resource)));
        }

        let body = format!(
            "<events notification-id=\"{:016x}\">{}</events>",
            counter, inner
        );
        Ok(HandlerResponse::xml(body))
    }
}
