//! Builds the resource trie (C7) from the configured options set (§6.5):
//! `uc` and `uc/security` are always registered; everything else is gated
//! by membership in `enabled`.

use std::sync::Arc;

use crate::dispatch::ResourceHandler;
use crate::handlers::*;
use crate::trie::TrieNode;

fn insert(trie: &mut TrieNode<Arc<dyn ResourceHandler>>, path: &str, handler: Arc<dyn ResourceHandler>) {
    let segments: Vec<&str> = path.split('/').collect();
    trie.insert(&segments, handler);
}

/// Returns the populated trie plus the `uc/...` paths to advertise from
/// `GET uc`'s `<resource rref="...">` children.
pub fn build_trie(enabled: &[String]) -> (TrieNode<Arc<dyn ResourceHandler>>, Vec<String>) {
    let mut trie = TrieNode::new();
    let mut enabled_paths = Vec::new();
    let has = |name: &str| enabled.iter().any(|o| o == name);

    insert(&mut trie, "uc", Arc::new(base::BaseHandler));
    insert(&mut trie, "uc/security", Arc::new(security::SecurityHandler));

    if has("power") {
        insert(&mut trie, "uc/power", Arc::new(power::PowerHandler));
        enabled_paths.push("uc/power".to_string());
    }
    if has("time") {
        insert(&mut trie, "uc/time", Arc::new(base::TimeHandler));
        enabled_paths.push("uc/time".to_string());
    }
    if has("events") {
        insert(&mut trie, "uc/events", Arc::new(base::EventsHandler));
        enabled_paths.push("uc/events".to_string());
    }
    if has("outputs") {
        insert(&mut trie, "uc/outputs", Arc::new(outputs::OutputsListHandler));
        insert(&mut trie, "uc/outputs/*", Arc::new(outputs::OutputItemHandler));
        insert(
            &mut trie,
            "uc/outputs/*/settings",
            Arc::new(outputs::OutputSettingsHandler),
        );
        insert(
            &mut trie,
            "uc/outputs/*/playhead",
            Arc::new(outputs::OutputPlayheadHandler),
        );
        enabled_paths.push("uc/outputs".to_string());
    }
    if has("source-lists") {
        insert(&mut trie, "uc/source-lists", Arc::new(sources::SourceListsHandler));
        insert(
            &mut trie,
            "uc/source-lists/*",
            Arc::new(sources::SourceListItemHandler),
        );
        enabled_paths.push("uc/source-lists".to_string());
    }
    if has("sources") {
        insert(&mut trie, "uc/sources", Arc::new(sources::SourcesListHandler));
        insert(&mut trie, "uc/sources/*", Arc::new(sources::SourceItemHandler));
        enabled_paths.push("uc/sources".to_string());
    }
    if has("search") {
        insert(&mut trie, "uc/search/outputs/*", Arc::new(search::SearchByOutputHandler));
        insert(
            &mut trie,
            "uc/search/sources/*",
            Arc::new(search::SearchBySourcesHandler),
        );
        insert(
            &mut trie,
            "uc/search/source-lists/*",
            Arc::new(search::SearchBySourceListHandler),
        );
        insert(&mut trie, "uc/search/text/*", Arc::new(search::SearchByTextHandler));
        insert(
            &mut trie,
            "uc/search/categories/*",
            Arc::new(search::SearchByCategoriesHandler),
        );
        insert(
            &mut trie,
            "uc/search/global-content-id/*",
            Arc::new(search::SearchByGlobalContentIdHandler),
        );
        insert(
            &mut trie,
            "uc/search/global-series-id/*",
            Arc::new(search::SearchByGlobalSeriesIdHandler),
        );
        insert(
            &mut trie,
            "uc/search/global-app-id/*",
            Arc::new(search::SearchByGlobalAppIdHandler),
        );
        enabled_paths.push("uc/search".to_string());
    }
    if has("acquisitions") {
        insert(&mut trie, "uc/acquisitions", Arc::new(acquisitions::AcquisitionsHandler));
        insert(
            &mut trie,
            "uc/acquisitions/*",
            Arc::new(acquisitions::AcquisitionItemHandler),
        );
        enabled_paths.push("uc/acquisitions".to_string());
    }
    if has("storage") {
        insert(&mut trie, "uc/storage", Arc::new(storage::StorageListHandler));
        insert(&mut trie, "uc/storage/*", Arc::new(storage::StorageItemHandler));
        enabled_paths.push("uc/storage".to_string());
    }
    if has("credentials") {
        insert(&mut trie, "uc/credentials", Arc::new(credentials::CredentialsHandler));
        insert(
            &mut trie,
            "uc/credentials/*",
            Arc::new(credentials::CredentialItemHandler),
        );
        enabled_paths.push("uc/credentials".to_string());
    }
    if has("categories") {
        insert(&mut trie, "uc/categories", Arc::new(misc::CategoriesHandler));
        enabled_paths.push("uc/categories".to_string());
    }
    if has("apps") {
        insert(&mut trie, "uc/apps", Arc::new(apps::AppsHandler));
        insert(&mut trie, "uc/apps/*", Arc::new(apps::AppsHandler));
        insert(&mut trie, "uc/apps/*/ext/**", Arc::new(apps::AppExtensionHandler));
        enabled_paths.push("uc/apps".to_string());
    }
    if has("remote") {
        insert(&mut trie, "uc/remote", Arc::new(remote::RemoteHandler));
        enabled_paths.push("uc/remote".to_string());
    }
    if has("feedback") {
        insert(&mut trie, "uc/feedback", Arc::new(misc::FeedbackHandler));
        enabled_paths.push("uc/feedback".to_string());
    }
    if has("images") {
        insert(&mut trie, "uc/images", Arc::new(misc::ImagesHandler));
        enabled_paths.push("uc/images".to_string());
    }

    enabled_paths.sort();
    (trie, enabled_paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::split_path;

    #[test]
    fn always_registers_base_and_security() {
        let (trie, _) = build_trie(&[]);
        assert!(trie.lookup(&split_path("uc").unwrap()).is_some());
        assert!(trie.lookup(&split_path("uc/security").unwrap()).is_some());
        assert!(trie.lookup(&split_path("uc/power").unwrap()).is_none());
    }

    #[test]
    fn gates_optional_resources_by_name() {
        let (trie, paths) = build_trie(&["power".to_string(), "outputs".to_string()]);
        assert!(trie.lookup(&split_path("uc/power").unwrap()).is_some());
        assert!(trie.lookup(&split_path("uc/outputs/o1/settings").unwrap()).is_some());
        assert!(trie.lookup(&split_path("uc/storage").unwrap()).is_none());
        assert_eq!(paths, vec!["uc/outputs".to_string(), "uc/power".to_string()]);
    }

    #[test]
    fn registers_apps_extension_subtree() {
        let (trie, _) = build_trie(&["apps".to_string()]);
        let (_, captures) = trie
            .lookup(&split_path("uc/apps/aid-1/ext/foo/bar").unwrap())
            .unwrap();
        assert_eq!(captures, vec!["aid-1".to_string(), "foo/bar".to_string()]);
    }
}
