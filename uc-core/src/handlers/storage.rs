//! `uc/storage`, `uc/storage/{cid}` (§4.7): stored-recording listing and
//! deletion.

use async_trait::async_trait;

use crate::dispatch::{require_auth, HandlerResponse, RequestContext, ResourceHandler};
use crate::error::{UcError, UcResult};
use crate::model::StoredItem;
use crate::xml::{escape_attr, render_time};

fn render_stored_item(item: &StoredItem) -> String {
    let mut attrs = format!(
        "cid=\"{}\" sid=\"{}\" created-time=\"{}\"",
        escape_attr(&item.cid),
        escape_attr(&item.sid),
        render_time(item.created_time),
    );
    if let Some(size) = item.size {
        attrs.push_str(&format!(" size=\"{size}\""));
    }
    format!("<storage-item {attrs}/>")
}

/// `GET uc/storage`: flat list sorted by `(sid, cid)`.
pub struct StorageListHandler;

#[async_trait]
impl ResourceHandler for StorageListHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let storage = ctx.state.storage.lock().unwrap();
        let mut inner = String::new();
        for item in storage.sorted() {
            inner.push_str(&render_stored_item(item));
        }
        Ok(HandlerResponse::xml(inner))
    }
}

/// `GET/DELETE uc/storage/{cid}`.
pub struct StorageItemHandler;

#[async_trait]
impl ResourceHandler for StorageItemHandler {
    async fn do_get(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let cid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing cid".to_string()))?;
        let storage = ctx.state.storage.lock().unwrap();
        let item = storage
            .items
            .get(cid)
            .ok_or_else(|| UcError::CannotFind(format!("no such stored item {cid}")))?;
        Ok(HandlerResponse::xml(render_stored_item(item)))
    }

    async fn do_delete(&self, ctx: &RequestContext) -> UcResult<HandlerResponse> {
        require_auth(ctx).await?;
        let cid = ctx
            .captures
            .first()
            .ok_or_else(|| UcError::InvalidSyntax("missing cid".to_string()))?;

        ctx.state.backend.storage_deleter.delete(cid).await?;
        {
            let mut storage = ctx.state.storage.lock().unwrap();
            storage.items.remove(cid);
        }
        ctx.state.notifications.notify("uc/storage");

        Ok(HandlerResponse::NoContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_optional_size() {
        let item = StoredItem {
            cid: "c1".to_string(),
            sid: "s1".to_string(),
            created_time: chrono::Utc::now(),
            size: Some(1024),
        };
        let xml = render_stored_item(&item);
        assert!(xml.contains("size=\"1024\""));
    }

    #[test]
    fn omits_size_when_unknown() {
        let item = StoredItem {
            cid: "c1".to_string(),
            sid: "s1".to_string(),
            created_time: chrono::Utc::now(),
            size: None,
        };
        assert!(!render_stored_item(&item).contains("size="));
    }
}
