//! Backend provider contracts (§6.4): the pluggable collaborator surface
//! a concrete device implementation supplies. The core only ever talks to
//! these traits — it never assumes a particular device.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::UcResult;
use crate::model::{
    Acquisition, AcquisitionRegistry, Aid, Cid, ContentItem, OutputRegistry, Sid,
    SourceListRegistry, SourceRegistry, StorageRegistry,
};

/// `select_content/programme/app` (§6.4.1).
#[async_trait]
pub trait OutputSelector: Send + Sync {
    async fn select_content(&self, oid: &str, sid: &str, cid: &str) -> UcResult<()>;
    async fn select_programme(
        &self,
        oid: &str,
        sid: &str,
        cid: &str,
        components: &[String],
    ) -> UcResult<()>;
    async fn select_app(&self, oid: &str, sid: &str, cid: &str) -> UcResult<()>;
}

/// `press(code, output?)` (§6.4.2).
#[async_trait]
pub trait ButtonHandler: Send + Sync {
    async fn press(&self, code: &str, output: Option<&str>) -> UcResult<()>;
}

/// Parameters accepted by one `acquire` call; exactly one of
/// `global_content_id`, `(sid, cid)`, or `series_id` is populated by the
/// handler before the call (§4.7 `uc/acquisitions`).
#[derive(Debug, Clone, Default)]
pub struct AcquireRequest {
    pub global_content_id: Option<String>,
    pub sid: Option<Sid>,
    pub cid: Option<Cid>,
    pub series_id: Option<String>,
    pub priority: Option<i64>,
}

/// `acquire(...)  -> aid | null`, `cancel(aid)` (§6.4.3).
#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn acquire(&self, request: AcquireRequest) -> UcResult<Option<Aid>>;
    async fn cancel(&self, aid: &str) -> UcResult<()>;
}

/// One page of search results plus the `more` flag (§4.7 search grammar).
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<ContentItem>,
    pub more: bool,
}

/// Common query parameters shared by all `uc/search/*` resources.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub results: u32,
    pub offset: u32,
    pub sids: Vec<Sid>,
    pub cids: Vec<Cid>,
    pub series_ids: Vec<String>,
    pub global_content_ids: Vec<String>,
    pub global_series_ids: Vec<String>,
    pub global_app_ids: Vec<String>,
    pub categories: Vec<String>,
    pub text: Vec<String>,
    pub fields: Vec<String>,
    pub interactive: bool,
    pub av: bool,
    pub start: Option<chrono::DateTime<chrono::Utc>>,
    pub end: Option<chrono::DateTime<chrono::Utc>>,
}

/// The seven content-metadata query methods backing `uc/search/*`
/// (§6.4.4). `uc/search/source-lists/{id}` is resolved by the handler via
/// [`by_sources`](ContentMetadataProvider::by_sources) against each list's
/// member sids; it has no separate backend method.
#[async_trait]
pub trait ContentMetadataProvider: Send + Sync {
    async fn by_output(&self, oid: &str, query: &SearchQuery) -> UcResult<SearchPage>;
    async fn by_sources(&self, sids: &[Sid], query: &SearchQuery) -> UcResult<SearchPage>;
    async fn by_text(&self, words: &[String], query: &SearchQuery) -> UcResult<SearchPage>;
    async fn by_categories(&self, categories: &[String], query: &SearchQuery) -> UcResult<SearchPage>;
    async fn by_global_content_id(&self, gcid: &str, query: &SearchQuery) -> UcResult<SearchPage>;
    async fn by_global_series_id(&self, gsid: &str, query: &SearchQuery) -> UcResult<SearchPage>;
    async fn by_global_app_id(&self, gaid: &str, query: &SearchQuery) -> UcResult<SearchPage>;
}

/// An app's response to a proxied `uc/apps/{aid}/ext/**` request.
pub struct ExtensionResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// `activate/deactivate` plus the per-app `request` reverse-proxy
/// (§6.4.5).
#[async_trait]
pub trait AppProvider: Send + Sync {
    async fn activate(&self, sid: &str, cid: &str) -> UcResult<Aid>;
    async fn deactivate(&self, aid: &str) -> UcResult<()>;
    #[allow(clippy::too_many_arguments)]
    async fn request(
        &self,
        aid: &str,
        path: &str,
        verb: &str,
        headers: &[(String, String)],
        params: &[(String, String)],
        authenticated: bool,
        body: &[u8],
    ) -> UcResult<ExtensionResponse>;
}

/// `delete(cid)` (§6.4.6).
#[async_trait]
pub trait StorageDeleter: Send + Sync {
    async fn delete(&self, cid: &str) -> UcResult<()>;
}

/// `set_standby(bool) -> bool` (§6.4.7).
#[async_trait]
pub trait StandbyCallback: Send + Sync {
    async fn set_standby(&self, standby: bool) -> UcResult<bool>;
}

/// The full collaborator surface, bundled for convenient dependency
/// injection into handlers. Fields are `Arc`-shared rather than `Box`-owned
/// so a single backing struct implementing several traits (such as
/// [`InMemoryBackend`]) can be wired into more than one field at once — see
/// [`Backend::in_memory`].
pub struct Backend {
    pub output_selector: Arc<dyn OutputSelector>,
    pub button_handler: Arc<dyn ButtonHandler>,
    pub acquirer: Arc<dyn Acquirer>,
    pub content_metadata: Arc<dyn ContentMetadataProvider>,
    pub apps: Arc<dyn AppProvider>,
    pub storage_deleter: Arc<dyn StorageDeleter>,
    pub standby: Arc<dyn StandbyCallback>,
}

impl Backend {
    /// Wires one shared [`InMemoryBackend`] instance into every collaborator
    /// slot, for tests and for running without a real device attached.
    pub fn in_memory(backend: Arc<InMemoryBackend>) -> Self {
        Self {
            output_selector: backend.clone(),
            button_handler: backend.clone(),
            acquirer: backend.clone(),
            content_metadata: backend.clone(),
            apps: backend.clone(),
            storage_deleter: backend.clone(),
            standby: backend,
        }
    }
}

/// An in-memory reference backend over the §3 registries, suitable for
/// tests and for exercising the dispatcher without a real device.
#[derive(Default)]
pub struct InMemoryBackend {
    pub sources: Mutex<SourceRegistry>,
    pub source_lists: Mutex<SourceListRegistry>,
    pub outputs: Mutex<OutputRegistry>,
    pub acquisitions: Mutex<AcquisitionRegistry>,
    pub storage: Mutex<StorageRegistry>,
    standby: Mutex<bool>,
}

#[async_trait]
impl OutputSelector for InMemoryBackend {
    async fn select_content(&self, oid: &str, sid: &str, cid: &str) -> UcResult<()> {
        let mut outputs = self.outputs.lock().unwrap();
        let output = outputs
            .outputs
            .get_mut(oid)
            .ok_or_else(|| crate::error::UcError::CannotFind(format!("no such output {oid}")))?;
        output.selection = crate::model::Selection::Programme {
            sid: sid.to_string(),
            cid: cid.to_string(),
        };
        Ok(())
    }

    async fn select_programme(
        &self,
        oid: &str,
        sid: &str,
        cid: &str,
        _components: &[String],
    ) -> UcResult<()> {
        self.select_content(oid, sid, cid).await
    }

    async fn select_app(&self, oid: &str, sid: &str, cid: &str) -> UcResult<()> {
        let mut outputs = self.outputs.lock().unwrap();
        let output = outputs
            .outputs
            .get_mut(oid)
            .ok_or_else(|| crate::error::UcError::CannotFind(format!("no such output {oid}")))?;
        output.selection = crate::model::Selection::App {
            sid: sid.to_string(),
            cid: cid.to_string(),
        };
        Ok(())
    }
}

#[async_trait]
impl ButtonHandler for InMemoryBackend {
    async fn press(&self, _code: &str, _output: Option<&str>) -> UcResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Acquirer for InMemoryBackend {
    async fn acquire(&self, request: AcquireRequest) -> UcResult<Option<Aid>> {
        let mut registry = self.acquisitions.lock().unwrap();
        let aid = registry.mint_aid();
        let acquisition = if let Some(series_id) = request.series_id {
            Acquisition::Series(crate::model::SeriesAcquisition {
                aid: aid.clone(),
                series_id,
                speculative: None,
            })
        } else {
            let sid = request.sid.unwrap_or_default();
            let cid = request.cid.unwrap_or_default();
            Acquisition::Content(crate::model::ContentAcquisition {
                aid: aid.clone(),
                sid,
                cid,
                start: None,
                end: None,
                interactive: false,
                series_linked: None,
                priority: request.priority,
                speculative: None,
                active: None,
                global_content_id: request.global_content_id,
            })
        };
        registry.insert(acquisition);
        Ok(Some(aid))
    }

    async fn cancel(&self, aid: &str) -> UcResult<()> {
        let mut registry = self.acquisitions.lock().unwrap();
        registry
            .remove(aid)
            .map(|_| ())
            .ok_or_else(|| crate::error::UcError::CannotFind(format!("no such acquisition {aid}")))
    }
}

#[async_trait]
impl ContentMetadataProvider for InMemoryBackend {
    async fn by_output(&self, _oid: &str, _query: &SearchQuery) -> UcResult<SearchPage> {
        Ok(SearchPage::default())
    }

    async fn by_sources(&self, _sids: &[Sid], _query: &SearchQuery) -> UcResult<SearchPage> {
        Ok(SearchPage::default())
    }

    async fn by_text(&self, _words: &[String], _query: &SearchQuery) -> UcResult<SearchPage> {
        Ok(SearchPage::default())
    }

    async fn by_categories(&self, _categories: &[String], _query: &SearchQuery) -> UcResult<SearchPage> {
        Ok(SearchPage::default())
    }

    async fn by_global_content_id(&self, _gcid: &str, _query: &SearchQuery) -> UcResult<SearchPage> {
        Ok(SearchPage::default())
    }

    async fn by_global_series_id(&self, _gsid: &str, _query: &SearchQuery) -> UcResult<SearchPage> {
        Ok(SearchPage::default())
    }

    async fn by_global_app_id(&self, _gaid: &str, _query: &SearchQuery) -> UcResult<SearchPage> {
        Ok(SearchPage::default())
    }
}

#[async_trait]
impl AppProvider for InMemoryBackend {
    async fn activate(&self, _sid: &str, _cid: &str) -> UcResult<Aid> {
        Err(crate::error::UcError::NotImplemented(
            "no app installer configured".to_string(),
        ))
    }

    async fn deactivate(&self, _aid: &str) -> UcResult<()> {
        Err(crate::error::UcError::NotImplemented(
            "no app installer configured".to_string(),
        ))
    }

    async fn request(
        &self,
        _aid: &str,
        _path: &str,
        _verb: &str,
        _headers: &[(String, String)],
        _params: &[(String, String)],
        _authenticated: bool,
        _body: &[u8],
    ) -> UcResult<ExtensionResponse> {
        Err(crate::error::UcError::NotImplemented(
            "no app installer configured".to_string(),
        ))
    }
}

#[async_trait]
impl StorageDeleter for InMemoryBackend {
    async fn delete(&self, cid: &str) -> UcResult<()> {
        let mut storage = self.storage.lock().unwrap();
        storage
            .items
            .remove(cid)
            .map(|_| ())
            .ok_or_else(|| crate::error::UcError::CannotFind(format!("no such stored item {cid}")))
    }
}

#[async_trait]
impl StandbyCallback for InMemoryBackend {
    async fn set_standby(&self, standby: bool) -> UcResult<bool> {
        *self.standby.lock().unwrap() = standby;
        Ok(standby)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Aspect, Output, OutputSettings, Selection};

    fn backend_with_output(oid: &str) -> InMemoryBackend {
        let backend = InMemoryBackend::default();
        backend.outputs.lock().unwrap().outputs.insert(
            oid.to_string(),
            Output {
                oid: oid.to_string(),
                name: "Main".to_string(),
                tags: vec!["main".to_string()],
                parent: None,
                settings: OutputSettings {
                    volume: 5000,
                    mute: false,
                    aspect: Aspect::Source,
                },
                selection: Selection::None,
                speed: None,
                playhead: None,
            },
        );
        backend
    }

    #[tokio::test]
    async fn select_content_updates_output_selection() {
        let backend = backend_with_output("o1");
        backend.select_content("o1", "s1", "c1").await.unwrap();
        let outputs = backend.outputs.lock().unwrap();
        match &outputs.outputs["o1"].selection {
            Selection::Programme { sid, cid } => {
                assert_eq!(sid, "s1");
                assert_eq!(cid, "c1");
            }
            other => panic!("unexpected selection: {other:?}"),
        }
    }

    #[tokio::test]
    async fn acquire_without_series_id_creates_content_acquisition() {
        let backend = InMemoryBackend::default();
        let aid = backend
            .acquire(AcquireRequest {
                sid: Some("s1".to_string()),
                cid: Some("c1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();
        assert!(backend.acquisitions.lock().unwrap().acquisitions.contains_key(&aid));
    }

    #[tokio::test]
    async fn cancel_missing_acquisition_is_not_found() {
        let backend = InMemoryBackend::default();
        let err = backend.cancel("nope").await.unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn set_standby_round_trips() {
        let backend = InMemoryBackend::default();
        let result = backend.set_standby(true).await.unwrap();
        assert!(result);
    }
}
