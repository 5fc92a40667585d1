//! `uc/sources`, `uc/sources/{sid}`, `uc/source-lists`,
//! `uc/source-lists/{list-id}` (§4.7).

use async_trait::async_trait;

use crate::dispatch::{HandlerResponse, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};
use crate::model::Source;
use crate::xml::{escape_attr, render_bool};

fn render_source(source: &Source) -> String {
    let mut attrs = format!(
        "sid=\"{}\" name=\"{}\" rref=\"{}\" live=\"{}\" linear=\"{}\" follow-on=\"{}\"",
        escape_attr(&source.sid),
        escape_attr(&source.name),
        escape_attr(&source.rref),
        render_bool(source.live),
        render_bool(source.linear),
        render_bool(source.follow_on),
    );
    if let Some(lcn) = source.lcn {
        attrs.push_str(&format!(" lcn=\"{lcn}\""));
    }
    if let Some(href) = &source.logo_href {
        attrs.push_str(&format!(" logo-href=\"{}\"", escape_attr(href)));
    }
    if let Some(owner) = &source.owner {
        attrs.push_str(&format!(" owner=\"{}\"", escape_attr(owner)));
    }
    if let Some(sref) = &source.sref {
        attrs.push_str(&format!(" sref=\"{}\"", escape_attr(sref)));
    }
    if let Some(cid) = &source.default_content_id {
        attrs.push_str(&format!(" default-content-id=\"{}\"", escape_attr(cid)));
    }
    format!("<source {attrs}/>")
}

/// `GET uc/sources`: always 204 (the index itself carries no listing; use
/// `uc/source-lists` to enumerate).
pub struct SourcesListHandler;

#[async_trait]
impl ResourceHandler for SourcesListHandler {
    fn auth_required(&self) -> bool {
        false
    }

    async fn do_get(&self, _ctx: &RequestContext) -> UcResult<HandlerResponse> {
        Ok(HandlerResponse::NoContent)
    }
}

/// `GET uc/sources/{sid}`.
pub struct SourceItemHandler;

#[async_trait]
impl ResourceHandler for SourceItemHandler {
    fn auth_required(&self) -> bool {
        false
    }

    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        let sid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing sid".to_string()))?;
        let sources = ctx.state.sources.lock().unwrap();
        let source = sources
            .get(sid)
            .ok_or_else(|| UcError::CannotFind(format!("no such source {sid}")))?;
        Ok(HandlerResponse::xml(render_source(source)))
    }
}

/// `GET uc/source-lists`: `uc_*` lists before vendor lists.
pub struct SourceListsHandler;

#[async_trait]
impl ResourceHandler for SourceListsHandler {
    fn auth_required(&self) -> bool {
        false
    }

    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        let lists = ctx.state.source_lists.lock().unwrap();
        let mut inner = String::new();
        for list in lists.ordered() {
            let mut attrs = format!(
                "list-id=\"{}\" name=\"{}\"",
                escape_attr(&list.list_id),
                escape_attr(&list.name)
            );
            if let Some(desc) = &list.description {
                attrs.push_str(&format!(" description=\"{}\"", escape_attr(desc)));
            }
            if let Some(href) = &list.logo_href {
                attrs.push_str(&format!(" logo-href=\"{}\"", escape_attr(href)));
            }
            inner.push_str(&format!("<source-list {attrs}/>"));
        }
        Ok(HandlerResponse::xml(inner))
    }
}

/// `GET uc/source-lists/{list-id}`: member sources in `lcn` order.
pub struct SourceListItemHandler;

#[async_trait]
impl ResourceHandler for SourceListItemHandler {
    fn auth_required(&self) -> bool {
        false
    }

    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        let list_id = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing list-id".to_string()))?;

        let lists = ctx.state.source_lists.lock().unwrap();
        if !lists.lists.contains_key(list_id) {
            return Err(UcError::CannotFind(format!("no such source list {list_id}")));
        }
        let sources = ctx.state.sources.lock().unwrap();
        let sids = lists.sorted_sids(list_id, &sources);

        let mut inner = String::new();
        for sid in &sids {
            if let Some(source) = sources.get(sid) {
                inner.push_str(&render_source(source));
            }
        }
        Ok(HandlerResponse::xml(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_required_and_optional_attributes() {
        let source = Source {
            sid: "s1".to_string(),
            name: "BBC One".to_string(),
            rref: "uc/sources/s1".to_string(),
            live: true,
            linear: true,
            follow_on: false,
            lcn: Some(1),
            logo_href: Some("http://example/logo.png".to_string()),
            owner: None,
            sref: None,
            default_content_id: None,
        };
        let xml = render_source(&source);
        assert!(xml.contains("sid=\"s1\""));
        assert!(xml.contains("lcn=\"1\""));
        assert!(xml.contains("logo-href=\"http://example/logo.png\""));
        assert!(!xml.contains("owner="));
    }
}
