//! `GET/POST uc/remote` (§4.7): simulated remote-control button presses.

use async_trait::async_trait;

use crate::dispatch::{require_auth, HandlerResponse, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};
use crate::xml::is_valid_identifier;

/// Splits a `button` value of the form `[profile:]code` into its parts.
/// The profile prefix is optional; a leading `:code` means "no profile".
fn parse_button(raw: &str) -> UcResult<(Option<&str>, &str)> {
    match raw.rsplit_once(':') {
        Some((profile, code)) => {
            if code.is_empty() || !is_valid_identifier(code) {
                return Err(UcError::InvalidSyntax(format!("invalid button code {raw}")));
            }
            if profile.is_empty() {
                Ok((None, code))
            } else if is_valid_identifier(profile) {
                Ok((Some(profile), code))
            } else {
                Err(UcError::InvalidSyntax(format!("invalid button profile {raw}")))
            }
        }
        None => {
            if raw.is_empty() || !is_valid_identifier(raw) {
                return Err(UcError::InvalidSyntax(format!("invalid button code {raw}")));
            }
            Ok((None, raw))
        }
    }
}

pub struct RemoteHandler;

#[async_trait]
impl ResourceHandler for RemoteHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        Ok(HandlerResponse::NoContent)
    }

    async fn do_post(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let raw_button = ctx
            .query_one("button")
            .ok_or_else(|| UcError::InvalidSyntax("missing button".to_string()))?;
        let (profile, code) = parse_button(raw_button)?;

        let full_code = match profile {
            Some(profile) => format!("{profile}:{code}"),
            None => code.to_string(),
        };

        let output = match ctx.query_one("output") {
            Some(requested) => {
                let outputs = ctx.state.outputs.lock().unwrap();
                Some(
                    outputs
                        .resolve(requested)
                        .map(|s| s.to_string())
                        .ok_or_else(|| UcError::CannotFind(format!("no such output {requested}")))?,
                )
            }
            None => None,
        };

        ctx.state
            .backend
            .button_handler
            .press(&full_code, output.as_deref())
            .await?;

        Ok(HandlerResponse::NoContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_code_without_profile() {
        let (profile, code) = parse_button(":ok").unwrap();
        assert_eq!(profile, None);
        assert_eq!(code, "ok");
    }

    #[test]
    fn parses_profiled_code() {
        let (profile, code) = parse_button("dvb:ok").unwrap();
        assert_eq!(profile, Some("dvb"));
        assert_eq!(code, "ok");
    }

    #[test]
    fn parses_bare_code() {
        let (profile, code) = parse_button("ok").unwrap();
        assert_eq!(profile, None);
        assert_eq!(code, "ok");
    }

    #[test]
    fn rejects_empty_code() {
        assert!(parse_button("dvb:").is_err());
    }
}
