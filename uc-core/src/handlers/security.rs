//! `POST uc/security` (§4.5): pairing key derivation.

use async_trait::async_trait;

use crate::dispatch::{HandlerResponse, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};
use crate::xml::escape_attr;

pub struct SecurityHandler;

#[async_trait]
impl ResourceHandler for SecurityHandler {
    fn auth_required(&self) -> bool {
        false
    }

    async fn do_post(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        let client_id = ctx
            .query_one("client-id")
            .ok_or_else(|| UcError::InvalidSyntax("missing client-id".to_string()))?;
        let client_name = ctx
            .query_one("client-name")
            .ok_or_else(|| UcError::InvalidSyntax("missing client-name".to_string()))?;

        let key = ctx.state.auth.pair(client_id, client_name).await?;

        Ok(HandlerResponse::xml(format!(
            "<security key=\"{}\"/>",
            escape_attr(&key)
        )))
    }
}
