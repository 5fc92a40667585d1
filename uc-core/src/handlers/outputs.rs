//! `uc/outputs`, `uc/outputs/{oid}`, `uc/outputs/{oid}/settings`,
//! `uc/outputs/{oid}/playhead` (§4.7).

use async_trait::async_trait;

use crate::dispatch::{require_auth, HandlerResponse, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};
use crate::model::{Aspect, Output, OutputRegistry, Selection};
use crate::xml::{escape_attr, render_bool};

/// Pulls `attr="value"` out of the first `<tag ...>` occurrence in `body`.
/// A pragmatic scan rather than a full XML parse: request bodies here are
/// single self-closing elements with a handful of attributes.
fn extract_tag_attr(body: &str, tag: &str, attr: &str) -> Option<String> {
    let tag_start = body.find(&format!("<{tag}"))?;
    let tag_end = body[tag_start..].find('>').map(|i| tag_start + i)?;
    let tag_body = &body[tag_start..tag_end];
    let needle = format!("{attr}=\"");
    let attr_start = tag_body.find(&needle)? + needle.len();
    let attr_end = tag_body[attr_start..].find('"')? + attr_start;
    Some(tag_body[attr_start..attr_end].to_string())
}

fn render_output_tree(registry: &OutputRegistry, output: &Output) -> String {
    let mut attrs = format!(
        "oid=\"{}\" name=\"{}\"",
        escape_attr(&output.oid),
        escape_attr(&output.name)
    );
    if !output.tags.is_empty() {
        attrs.push_str(&format!(" tags=\"{}\"", escape_attr(&output.tags.join(","))));
    }
    if let Some(parent) = &output.parent {
        attrs.push_str(&format!(" parent=\"{}\"", escape_attr(parent)));
    }
    let mut inner = String::new();
    for child in registry.children_of(&output.oid) {
        inner.push_str(&render_output_tree(registry, child));
    }
    format!("<output {attrs}>{inner}</output>")
}

fn render_output_detail(output: &Output) -> String {
    let mut attrs = format!(
        "oid=\"{}\" name=\"{}\" volume=\"{:.4}\" mute=\"{}\" aspect=\"{}\"",
        escape_attr(&output.oid),
        escape_attr(&output.name),
        output.settings.volume as f64 / 10000.0,
        render_bool(output.settings.mute),
        output.settings.aspect.as_wire(),
    );
    if !output.tags.is_empty() {
        attrs.push_str(&format!(" tags=\"{}\"", escape_attr(&output.tags.join(","))));
    }

    let mut inner = String::new();
    match &output.selection {
        Selection::None => {}
        Selection::Programme { sid, cid } => inner.push_str(&format!(
            "<programme sid=\"{}\" cid=\"{}\"/>",
            escape_attr(sid),
            escape_attr(cid)
        )),
        Selection::App { sid, cid } => inner.push_str(&format!(
            "<app sid=\"{}\" cid=\"{}\"/>",
            escape_attr(sid),
            escape_attr(cid)
        )),
    }
    if let Some(speed) = output.speed {
        inner.push_str(&format!("<playback speed=\"{speed}\"/>"));
    }

    format!("<output {attrs}>{inner}</output>")
}

fn resolve_oid(ctx: &RequestContext) -> UcResult<String> {
    let requested = ctx
        .captures
        .first()
        .ok_or_else(|| UcError::InvalidSyntax("missing oid".to_string()))?;
    let outputs = ctx.state.outputs.lock().unwrap();
    outputs
        .resolve(requested)
        .map(|s| s.to_string())
        .ok_or_else(|| UcError::CannotFind(format!("no such output {requested}")))
}

/// `GET uc/outputs`: nested root/child tree.
pub struct OutputsListHandler;

#[async_trait]
impl ResourceHandler for OutputsListHandler {
    fn auth_required(&self) -> bool {
        false
    }

    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        let outputs = ctx.state.outputs.lock().unwrap();
        let mut inner = String::new();
        for root in outputs.roots() {
            inner.push_str(&render_output_tree(&outputs, root));
        }
        Ok(HandlerResponse::xml(inner))
    }
}

/// `GET/POST uc/outputs/{oid}` (`main` is an alias for the main output).
pub struct OutputItemHandler;

#[async_trait]
impl ResourceHandler for OutputItemHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let oid = resolve_oid(ctx)?;
        let outputs = ctx.state.outputs.lock().unwrap();
        let output = outputs
            .get(&oid)
            .ok_or_else(|| UcError::CannotFind(format!("no such output {oid}")))?;
        Ok(HandlerResponse::xml(render_output_detail(output)))
    }

    async fn do_post(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let oid = resolve_oid(ctx)?;
        let body = std::str::from_utf8(&ctx.body).unwrap_or("");

        let selection = if let Some(sid) = extract_tag_attr(body, "programme", "sid") {
            let cid = extract_tag_attr(body, "programme", "cid").unwrap_or_default();
            ctx.state
                .backend
                .output_selector
                .select_programme(&oid, &sid, &cid, &[])
                .await?;
            Selection::Programme { sid, cid }
        } else if let Some(sid) = extract_tag_attr(body, "app", "sid") {
            let cid = extract_tag_attr(body, "app", "cid").unwrap_or_default();
            ctx.state.backend.output_selector.select_app(&oid, &sid, &cid).await?;
            Selection::App { sid, cid }
        } else if let (Some(sid), Some(cid)) = (ctx.query_one("sid"), ctx.query_one("cid")) {
            let (sid, cid) = (sid.to_string(), cid.to_string());
            ctx.state
                .backend
                .output_selector
                .select_content(&oid, &sid, &cid)
                .await?;
            Selection::Programme { sid, cid }
        } else {
            return Err(UcError::InvalidSyntax(
                "expected sid/cid query params or a programme/app body".to_string(),
            ));
        };

        {
            let mut outputs = ctx.state.outputs.lock().unwrap();
            if let Some(output) = outputs.outputs.get_mut(&oid) {
                output.selection = selection;
            }
        }
        ctx.state.notifications.notify(&format!("uc/outputs/{oid}"));

        Ok(HandlerResponse::NoContent)
    }
}

/// `GET/PUT uc/outputs/{oid}/settings`.
pub struct OutputSettingsHandler;

#[async_trait]
impl ResourceHandler for OutputSettingsHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let oid = resolve_oid(ctx)?;
        let outputs = ctx.state.outputs.lock().unwrap();
        let output = outputs
            .get(&oid)
            .ok_or_else(|| UcError::CannotFind(format!("no such output {oid}")))?;
        Ok(HandlerResponse::xml(format!(
            "<settings volume=\"{:.4}\" mute=\"{}\" aspect=\"{}\"/>",
            output.settings.volume as f64 / 10000.0,
            render_bool(output.settings.mute),
            output.settings.aspect.as_wire(),
        )))
    }

    async fn do_put(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let oid = resolve_oid(ctx)?;

        let volume = match ctx.query_one("volume") {
            Some(raw) => Some(
                (raw.parse::<f64>()
                    .map_err(|_| UcError::InvalidSyntax("invalid volume".to_string()))?
                    * 10000.0)
                    .round() as u32,
            ),
            None => None,
        };
        let mute = match ctx.query_one("mute") {
            Some(raw) => Some(
                crate::xml::parse_bool(raw)
                    .ok_or_else(|| UcError::InvalidSyntax("invalid mute".to_string()))?,
            ),
            None => None,
        };
        let aspect = match ctx.query_one("aspect") {
            Some(raw) => {
                Some(Aspect::parse(raw).ok_or_else(|| UcError::InvalidSyntax("invalid aspect".to_string()))?)
            }
            None => None,
        };

        {
            let mut outputs = ctx.state.outputs.lock().unwrap();
            let output = outputs
                .outputs
                .get_mut(&oid)
                .ok_or_else(|| UcError::CannotFind(format!("no such output {oid}")))?;
            if let Some(volume) = volume {
                output.settings.volume = volume.min(10000);
            }
            if let Some(mute) = mute {
                output.settings.mute = mute;
            }
            if let Some(aspect) = aspect {
                output.settings.aspect = aspect;
            }
        }

        ctx.state
            .notifications
            .notify(&format!("uc/outputs/{oid}/settings"));
        Ok(HandlerResponse::NoContent)
    }
}

/// `GET/PUT uc/outputs/{oid}/playhead`.
pub struct OutputPlayheadHandler;

#[async_trait]
impl ResourceHandler for OutputPlayheadHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let oid = resolve_oid(ctx)?;
        let outputs = ctx.state.outputs.lock().unwrap();
        let output = outputs
            .get(&oid)
            .ok_or_else(|| UcError::CannotFind(format!("no such output {oid}")))?;

        let Some(playhead) = &output.playhead else {
            return Ok(HandlerResponse::xml("<playhead/>"));
        };

        let mut attrs = format!(
            "precision=\"{}\" timestamp=\"{}\"",
            playhead.precision,
            crate::xml::render_time(playhead.timestamp)
        );
        if let Some(abs) = playhead.absolute {
            attrs.push_str(&format!(" position=\"{}\"", crate::xml::render_duration_100us(abs)));
        }
        if let Some(len) = playhead.length {
            attrs.push_str(&format!(" length=\"{}\"", crate::xml::render_duration_100us(len)));
        }
        Ok(HandlerResponse::xml(format!("<playhead {attrs}/>")))
    }

    async fn do_put(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let oid = resolve_oid(ctx)?;
        let body = std::str::from_utf8(&ctx.body).unwrap_or("");

        let absolute = extract_tag_attr(body, "aposition", "position")
            .and_then(|s| s.parse::<i64>().ok());
        let relative = extract_tag_attr(body, "rposition", "position")
            .and_then(|s| s.parse::<i64>().ok());
        let speed = ctx.query_one("speed").and_then(|s| s.parse::<f64>().ok());

        let mut outputs = ctx.state.outputs.lock().unwrap();
        let output = outputs
            .outputs
            .get_mut(&oid)
            .ok_or_else(|| UcError::CannotFind(format!("no such output {oid}")))?;

        if absolute.is_some() || relative.is_some() {
            let mut playhead = output.playhead.clone().unwrap_or(crate::model::Playhead {
                absolute: None,
                relative: None,
                precision: 0,
                timestamp: ctx.rcvd_time,
                length: None,
            });
            playhead.timestamp = ctx.rcvd_time;
            if let Some(abs) = absolute {
                playhead.absolute = Some(abs);
            }
            if let Some(rel) = relative {
                playhead.relative = Some(rel);
            }
            output.playhead = Some(playhead);
        } else if let Some(speed) = speed {
            output.speed = Some(speed);
        } else {
            return Err(UcError::InvalidSyntax(
                "expected aposition, rposition, or speed".to_string(),
            ));
        }
        drop(outputs);

        ctx.state
            .notifications
            .notify(&format!("uc/outputs/{oid}/playhead"));
        Ok(HandlerResponse::NoContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_attribute_from_self_closing_tag() {
        let body = r#"<programme sid="s1" cid="c1"/>"#;
        assert_eq!(extract_tag_attr(body, "programme", "sid"), Some("s1".to_string()));
        assert_eq!(extract_tag_attr(body, "programme", "cid"), Some("c1".to_string()));
        assert_eq!(extract_tag_attr(body, "app", "sid"), None);
    }

    #[test]
    fn renders_detail_with_mutually_exclusive_selection() {
        let output = Output {
            oid: "o1".to_string(),
            name: "Main".to_string(),
            tags: vec!["main".to_string()],
            parent: None,
            settings: crate::model::OutputSettings {
                volume: 2500,
                mute: false,
                aspect: Aspect::SixteenByNine,
            },
            selection: Selection::App {
                sid: "s1".to_string(),
                cid: "c1".to_string(),
            },
            speed: None,
            playhead: None,
        };
        let xml = render_output_detail(&output);
        assert!(xml.contains("volume=\"0.2500\""));
        assert!(xml.contains("<app sid=\"s1\" cid=\"c1\"/>"));
        assert!(!xml.contains("<programme"));
    }
}
