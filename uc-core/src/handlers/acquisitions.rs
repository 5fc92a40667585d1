//! `uc/acquisitions`, `uc/acquisitions/{aid}` (§4.7): scheduling and
//! cancelling future content acquisitions.

use async_trait::async_trait;

use crate::backend::AcquireRequest;
use crate::dispatch::{require_auth, HandlerResponse, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};
use crate::model::{Acquisition, ContentAcquisition, SeriesAcquisition};
use crate::xml::{escape_attr, render_bool, render_time};

fn render_acquisition(acquisition: &Acquisition) -> String {
    match acquisition {
        Acquisition::Content(c) => {
            let mut attrs = format!(
                "acquisition-id=\"{}\" sid=\"{}\" cid=\"{}\" interactive=\"{}\"",
                escape_attr(&c.aid),
                escape_attr(&c.sid),
                escape_attr(&c.cid),
                render_bool(c.interactive),
            );
            if let Some(start) = c.start {
                attrs.push_str(&format!(" start=\"{}\"", render_time(start)));
            }
            if let Some(end) = c.end {
                attrs.push_str(&format!(" end=\"{}\"", render_time(end)));
            }
            if let Some(priority) = c.priority {
                attrs.push_str(&format!(" priority=\"{priority}\""));
            }
            if let Some(active) = c.active {
                attrs.push_str(&format!(" active=\"{}\"", render_bool(active)));
            }
            if let Some(gcid) = &c.global_content_id {
                attrs.push_str(&format!(" global-content-id=\"{}\"", escape_attr(gcid)));
            }
            format!("<content-acquisition {attrs}/>")
        }
        Acquisition::Series(s) => {
            let mut attrs = format!(
                "acquisition-id=\"{}\" series-id=\"{}\"",
                escape_attr(&s.aid),
                escape_attr(&s.series_id),
            );
            if let Some(speculative) = s.speculative {
                attrs.push_str(&format!(" speculative=\"{}\"", render_bool(speculative)));
            }
            format!("<series-acquisition {attrs}/>")
        }
    }
}

/// `GET/POST uc/acquisitions`.
pub struct AcquisitionsHandler;

#[async_trait]
impl ResourceHandler for AcquisitionsHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let acquisitions = ctx.state.acquisitions.lock().unwrap();
        let mut inner = String::new();
        for acquisition in acquisitions.acquisitions.values() {
            inner.push_str(&render_acquisition(acquisition));
        }
        Ok(HandlerResponse::xml(inner))
    }

    async fn do_post(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let sid = ctx.query_one("sid").map(str::to_string);
        let cid = ctx.query_one("content-id").map(str::to_string);
        let gcid = ctx.query_one("global-content-id").map(str::to_string);
        let series_id = ctx.query_one("series-id").map(str::to_string);
        let priority = match ctx.query_one("priority") {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|_| UcError::InvalidSyntax("invalid priority".to_string()))?,
            ),
            None => None,
        };

        let selectors = [
            sid.is_some() && cid.is_some(),
            gcid.is_some(),
            series_id.is_some(),
        ];
        if selectors.iter().filter(|&&s| s).count() != 1 {
            return Err(UcError::InvalidSyntax(
                "expected exactly one of (sid,content-id), global-content-id, or series-id"
                    .to_string(),
            ));
        }

        let request = AcquireRequest {
            global_content_id: gcid.clone(),
            sid: sid.clone(),
            cid: cid.clone(),
            series_id: series_id.clone(),
            priority,
        };

        let Some(aid) = ctx.state.backend.acquirer.acquire(request).await? else {
            return Ok(HandlerResponse::NoContent);
        };

        let acquisition = if let Some(series_id) = series_id {
            Acquisition::Series(SeriesAcquisition {
                aid: aid.clone(),
                series_id,
                speculative: None,
            })
        } else {
            Acquisition::Content(ContentAcquisition {
                aid: aid.clone(),
                sid: sid.unwrap_or_default(),
                cid: cid.unwrap_or_default(),
                start: None,
                end: None,
                interactive: false,
                series_linked: None,
                priority,
                speculative: None,
                active: None,
                global_content_id: gcid,
            })
        };

        let rendered = render_acquisition(&acquisition);
        {
            let mut acquisitions = ctx.state.acquisitions.lock().unwrap();
            acquisitions.insert(acquisition);
        }
        ctx.state.notifications.notify("uc/acquisitions");

        Ok(HandlerResponse::xml_at(
            format!("uc/acquisitions/{aid}"),
            rendered,
        ))
    }
}

/// `GET/DELETE uc/acquisitions/{aid}`.
pub struct AcquisitionItemHandler;

#[async_trait]
impl ResourceHandler for AcquisitionItemHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let aid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing aid".to_string()))?;
        let acquisitions = ctx.state.acquisitions.lock().unwrap();
        let acquisition = acquisitions
            .acquisitions
            .get(aid)
            .ok_or_else(|| UcError::CannotFind(format!("no such acquisition {aid}")))?;
        Ok(HandlerResponse::xml(render_acquisition(acquisition)))
    }

    async fn do_delete(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let aid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing aid".to_string()))?;

        ctx.state.backend.acquirer.cancel(aid).await?;
        {
            let mut acquisitions = ctx.state.acquisitions.lock().unwrap();
            acquisitions.remove(aid);
        }
        ctx.state.notifications.notify("uc/acquisitions");

        Ok(HandlerResponse::NoContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_content_acquisition_with_optional_attrs() {
        let acquisition = Acquisition::Content(ContentAcquisition {
            aid: "aid-1".to_string(),
            sid: "s1".to_string(),
            cid: "c1".to_string(),
            start: Some(chrono::Utc::now()),
            end: Some(chrono::Utc::now()),
            interactive: true,
            series_linked: None,
            priority: Some(5),
            speculative: None,
            active: Some(true),
            global_content_id: None,
        });
        let xml = render_acquisition(&acquisition);
        assert!(xml.contains("acquisition-id=\"aid-1\""));
        assert!(xml.contains("priority=\"5\""));
        assert!(xml.contains("active=\"true\""));
        assert!(xml.contains("start="));
        assert!(xml.contains("end="));
    }

    #[test]
    fn fresh_gcid_acquisition_omits_fabricated_schedule() {
        let acquisition = Acquisition::Content(ContentAcquisition {
            aid: "aid-3".to_string(),
            sid: String::new(),
            cid: String::new(),
            start: None,
            end: None,
            interactive: false,
            series_linked: None,
            priority: None,
            speculative: None,
            active: None,
            global_content_id: Some("crid://example.com/abc".to_string()),
        });
        let xml = render_acquisition(&acquisition);
        assert!(xml.contains("acquisition-id=\"aid-3\""));
        assert!(xml.contains("global-content-id=\"crid://example.com/abc\""));
        assert!(!xml.contains("start="));
        assert!(!xml.contains("end="));
        assert!(!xml.contains("active="));
    }

    #[test]
    fn renders_series_acquisition() {
        let acquisition = Acquisition::Series(SeriesAcquisition {
            aid: "aid-2".to_string(),
            series_id: "series-1".to_string(),
            speculative: Some(true),
        });
        let xml = render_acquisition(&acquisition);
        assert!(xml.contains("series-id=\"series-1\""));
        assert!(xml.contains("speculative=\"true\""));
    }
}
