//! `uc/credentials`, `uc/credentials/{cid}` (§3 Lifecycles): listing and
//! revoking paired-client credentials.

use async_trait::async_trait;

use crate::dispatch::{require_auth, HandlerResponse, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};
use crate::model::CredentialInfo;
use crate::xml::escape_attr;

fn render_credential(credential: &CredentialInfo) -> String {
    format!(
        "<credential client-id=\"{}\" name=\"{}\"/>",
        escape_attr(&credential.client_id),
        escape_attr(&credential.name),
    )
}

/// `GET uc/credentials`.
pub struct CredentialsHandler;

#[async_trait]
impl ResourceHandler for CredentialsHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let credentials = ctx.state.auth.list_credentials().await;
        let mut inner = String::new();
        for credential in &credentials {
            inner.push_str(&render_credential(credential));
        }
        Ok(HandlerResponse::xml(inner))
    }
}

/// `DELETE uc/credentials/{client-id}`. Deletes only the keyed entry — the
/// source bug this fixes deleted the whole credential table instead.
pub struct CredentialItemHandler;

#[async_trait]
impl ResourceHandler for CredentialItemHandler {
    async fn do_delete(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let client_id = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing client-id".to_string()))?;
        ctx.state.auth.revoke_credential(client_id).await?;
        ctx.state.notifications.notify("uc/credentials");
        Ok(HandlerResponse::NoContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_credential_attributes() {
        let credential = CredentialInfo {
            client_id: "c1".to_string(),
            name: "Tablet".to_string(),
        };
        let xml = render_credential(&credential);
        assert!(xml.contains("client-id=\"c1\""));
        assert!(xml.contains("name=\"Tablet\""));
    }
}
