//! `GET/PUT uc/power` (§4.7): `on|standby|off`.

use async_trait::async_trait;
use std::sync::atomic::Ordering;

use crate::dispatch::{require_auth, HandlerResponse, PowerMode, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};

pub struct PowerHandler;

fn requested_state(ctx: &RequestContext) -> UcResult<PowerMode> {
    let raw = ctx
        .query_one("state")
        .ok_or_else(|| UcError::InvalidSyntax("missing state parameter".to_string()))?;
    PowerMode::parse(raw).ok_or_else(|| UcError::InvalidSyntax(format!("unknown power state {raw}")))
}

#[async_trait]
impl ResourceHandler for PowerHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let mode = *ctx.state.power_mode.lock().unwrap();
        Ok(HandlerResponse::xml(format!(
            "<power state=\"{}\"/>",
            mode.as_wire()
        )))
    }

    async fn do_put(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let requested = requested_state(ctx)?;
        let going_to_standby = matches!(requested, PowerMode::Standby | PowerMode::Off);

        if going_to_standby {
            let accepted = ctx
                .state
                .backend
                .standby
                .set_standby(true)
                .await
                .map_err(|_| UcError::ProcessingFailed("backend refused standby".to_string()))?;
            if !accepted {
                return Err(UcError::ProcessingFailed(
                    "backend refused standby".to_string(),
                ));
            }
            ctx.state.standby.store(true, Ordering::SeqCst);
        } else {
            ctx.state
                .backend
                .standby
                .set_standby(false)
                .await
                .map_err(|_| UcError::ProcessingFailed("backend refused wake".to_string()))?;
            ctx.state.standby.store(false, Ordering::SeqCst);
        }

        *ctx.state.power_mode.lock().unwrap() = requested;
        ctx.state.notifications.notify("uc/power");

        Ok(HandlerResponse::NoContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_power_states() {
        assert_eq!(PowerMode::parse("on"), Some(PowerMode::On));
        assert_eq!(PowerMode::parse("standby"), Some(PowerMode::Standby));
        assert_eq!(PowerMode::parse("off"), Some(PowerMode::Off));
        assert_eq!(PowerMode::parse("sleep"), None);
    }
}
