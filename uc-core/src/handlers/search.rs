//! `uc/search/*` (§4.7): the eight sibling content-metadata query
//! resources sharing one query grammar.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use crate::backend::{SearchPage, SearchQuery};
use crate::dispatch::{require_auth, HandlerResponse, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};
use crate::model::ContentItem;
use crate::xml::{escape_attr, parse_bool, parse_time, render_bool, render_time};

/// Parses the query params common to every `uc/search/*` resource:
/// `results`, `offset`, repeated `field`, `interactive`, `AV`, `start`,
/// and `end` XOR `days`. Path-specific selectors (`sid`, `cid`,
/// `category`, ...) are layered on by each handler.
fn parse_common(ctx: &RequestContext) -> UcResult<SearchQuery> {
    let results = match ctx.query_one("results") {
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| UcError::InvalidSyntax("results must be >= 1".to_string()))?,
        None => 1,
    };
    let offset = match ctx.query_one("offset") {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| UcError::InvalidSyntax("invalid offset".to_string()))?,
        None => 0,
    };
    let fields = ctx
        .parsed_query
        .get("field")
        .cloned()
        .unwrap_or_default();
    let interactive = match ctx.query_one("interactive") {
        Some(raw) => parse_bool(raw).ok_or_else(|| UcError::InvalidSyntax("invalid interactive".to_string()))?,
        None => true,
    };
    let av = match ctx.query_one("AV") {
        Some(raw) => parse_bool(raw).ok_or_else(|| UcError::InvalidSyntax("invalid AV".to_string()))?,
        None => true,
    };
    let start = match ctx.query_one("start") {
        Some(raw) => parse_time(raw).ok_or_else(|| UcError::InvalidSyntax("invalid start".to_string()))?,
        None => ctx.rcvd_time,
    };

    let end_param = ctx.query_one("end");
    let days_param = ctx.query_one("days");
    if end_param.is_some() && days_param.is_some() {
        return Err(UcError::InvalidSyntax("end and days are mutually exclusive".to_string()));
    }
    let end = if let Some(raw) = end_param {
        Some(parse_time(raw).ok_or_else(|| UcError::InvalidSyntax("invalid end".to_string()))?)
    } else if let Some(raw) = days_param {
        let days = raw
            .parse::<i64>()
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| UcError::InvalidSyntax("days must be >= 1".to_string()))?;
        let midnight = Utc
            .with_ymd_and_hms(start.year(), start.month(), start.day(), 0, 0, 0)
            .single()
            .ok_or_else(|| UcError::InvalidSyntax("invalid start date".to_string()))?;
        Some(midnight + Duration::days(days))
    } else {
        None
    };

    Ok(SearchQuery {
        results,
        offset,
        sids: Vec::new(),
        cids: Vec::new(),
        series_ids: Vec::new(),
        global_content_ids: Vec::new(),
        global_series_ids: Vec::new(),
        global_app_ids: Vec::new(),
        categories: Vec::new(),
        text: Vec::new(),
        fields,
        interactive,
        av,
        start: Some(start),
        end,
    })
}

use chrono::Datelike;

fn render_content_item(item: &ContentItem) -> String {
    let mut attrs = format!(
        "sid=\"{}\" cid=\"{}\" interactive=\"{}\" presentable=\"{}\" acquirable=\"{}\" extension=\"{}\"",
        escape_attr(&item.sid),
        escape_attr(&item.cid),
        render_bool(item.interactive),
        render_bool(item.presentable),
        render_bool(item.acquirable),
        render_bool(item.extension),
    );
    if let Some(title) = &item.title {
        attrs.push_str(&format!(" title=\"{}\"", escape_attr(title)));
    }
    if let Some(synopsis) = &item.synopsis {
        attrs.push_str(&format!(" synopsis=\"{}\"", escape_attr(synopsis)));
    }
    if let Some(start) = item.start {
        attrs.push_str(&format!(" start=\"{}\"", render_time(start)));
    }
    if let Some(duration) = item.duration {
        attrs.push_str(&format!(" duration=\"{duration}\""));
    }
    if let Some(gcid) = &item.global_content_id {
        attrs.push_str(&format!(" global-content-id=\"{}\"", escape_attr(gcid)));
    }
    if let Some(gsid) = &item.global_series_id {
        attrs.push_str(&format!(" global-series-id=\"{}\"", escape_attr(gsid)));
    }
    if let Some(gaid) = &item.global_app_id {
        attrs.push_str(&format!(" global-app-id=\"{}\"", escape_attr(gaid)));
    }
    format!("<content {attrs}/>")
}

fn render_page(page: &SearchPage) -> String {
    let mut inner = String::new();
    for item in &page.items {
        inner.push_str(&render_content_item(item));
    }
    format!("<results more=\"{}\">{}</results>", render_bool(page.more), inner)
}

/// `uc/search/outputs/{oid}`.
pub struct SearchByOutputHandler;

#[async_trait]
impl ResourceHandler for SearchByOutputHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let oid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing oid".to_string()))?;
        let query = parse_common(ctx)?;
        let page = ctx.state.backend.content_metadata.by_output(oid, &query).await?;
        Ok(HandlerResponse::xml(render_page(&page)))
    }
}

/// `uc/search/sources/{id;id;...}`.
pub struct SearchBySourcesHandler;

#[async_trait]
impl ResourceHandler for SearchBySourcesHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let raw = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing sids".to_string()))?;
        let sids: Vec<String> = raw.split(';').filter(|s| !s.is_empty()).map(str::to_string).collect();
        if sids.is_empty() {
            return Err(UcError::InvalidSyntax("empty sid list".to_string()));
        }
        let query = parse_common(ctx)?;
        let page = ctx.state.backend.content_metadata.by_sources(&sids, &query).await?;
        Ok(HandlerResponse::xml(render_page(&page)))
    }
}

/// `uc/search/source-lists/{list-id}`: resolved against the list's member
/// sids, then delegated to the same backend method as `by_sources`.
pub struct SearchBySourceListHandler;

#[async_trait]
impl ResourceHandler for SearchBySourceListHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let list_id = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing list-id".to_string()))?;
        let lists = ctx.state.source_lists.lock().unwrap();
        let list = lists
            .lists
            .get(list_id)
            .ok_or_else(|| UcError::CannotFind(format!("no such source list {list_id}")))?;
        let sids = list.sids.clone();
        drop(lists);

        let query = parse_common(ctx)?;
        let page = ctx.state.backend.content_metadata.by_sources(&sids, &query).await?;
        Ok(HandlerResponse::xml(render_page(&page)))
    }
}

/// `uc/search/text/{w+w+w}`.
pub struct SearchByTextHandler;

#[async_trait]
impl ResourceHandler for SearchByTextHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let raw = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing text".to_string()))?;
        let words: Vec<String> = raw.split('+').filter(|s| !s.is_empty()).map(str::to_string).collect();
        if words.is_empty() {
            return Err(UcError::InvalidSyntax("empty text query".to_string()));
        }
        let query = parse_common(ctx)?;
        let page = ctx.state.backend.content_metadata.by_text(&words, &query).await?;
        Ok(HandlerResponse::xml(render_page(&page)))
    }
}

/// `uc/search/categories/{id}`.
pub struct SearchByCategoriesHandler;

#[async_trait]
impl ResourceHandler for SearchByCategoriesHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let raw = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing category".to_string()))?;
        let categories: Vec<String> = raw.split(';').filter(|s| !s.is_empty()).map(str::to_string).collect();
        if categories.is_empty() {
            return Err(UcError::InvalidSyntax("empty category list".to_string()));
        }
        let query = parse_common(ctx)?;
        let page = ctx
            .state
            .backend
            .content_metadata
            .by_categories(&categories, &query)
            .await?;
        Ok(HandlerResponse::xml(render_page(&page)))
    }
}

/// `uc/search/global-content-id/{gcid}`.
pub struct SearchByGlobalContentIdHandler;

#[async_trait]
impl ResourceHandler for SearchByGlobalContentIdHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let gcid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing gcid".to_string()))?;
        let query = parse_common(ctx)?;
        let page = ctx
            .state
            .backend
            .content_metadata
            .by_global_content_id(gcid, &query)
            .await?;
        Ok(HandlerResponse::xml(render_page(&page)))
    }
}

/// `uc/search/global-series-id/{gsid}`.
pub struct SearchByGlobalSeriesIdHandler;

#[async_trait]
impl ResourceHandler for SearchByGlobalSeriesIdHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let gsid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing gsid".to_string()))?;
        let query = parse_common(ctx)?;
        let page = ctx
            .state
            .backend
            .content_metadata
            .by_global_series_id(gsid, &query)
            .await?;
        Ok(HandlerResponse::xml(render_page(&page)))
    }
}

/// `uc/search/global-app-id/{gaid}`.
pub struct SearchByGlobalAppIdHandler;

#[async_trait]
impl ResourceHandler for SearchByGlobalAppIdHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let gaid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing gaid".to_string()))?;
        let query = parse_common(ctx)?;
        let page = ctx
            .state
            .backend
            .content_metadata
            .by_global_app_id(gaid, &query)
            .await?;
        Ok(HandlerResponse::xml(render_page(&page)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_page_with_more_flag() {
        let page = SearchPage {
            items: vec![ContentItem {
                sid: "s1".to_string(),
                cid: "c1".to_string(),
                title: Some("Show".to_string()),
                synopsis: None,
                start: None,
                duration: None,
                availability_start: None,
                availability_end: None,
                global_content_id: None,
                global_series_id: None,
                global_app_id: None,
                series_id: None,
                interactive: false,
                presentable: true,
                acquirable: true,
                extension: false,
                media_components: Default::default(),
                controls: vec![],
                links: vec![],
                categories: vec![],
            }],
            more: true,
        };
        let xml = render_page(&page);
        assert!(xml.contains("more=\"true\""));
        assert!(xml.contains("title=\"Show\""));
    }
}
