//! The shared data model (§3): sources, source lists, outputs, content
//! items, acquisitions, stored items, and credential records.
//!
//! Cross-references (source lists into sources, outputs into their parent)
//! are represented as string ids resolved through a registry, never as
//! pointers — see the "Cyclic parent/child references" redesign note.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

pub type Sid = String;
pub type Oid = String;
pub type Aid = String;
pub type Cid = String;
pub type ListId = String;
pub type Mcid = String;

/// A TV channel, radio channel, storage group, menu root, game catalogue,
/// external-apps pseudo-source, or net-vision feed.
#[derive(Debug, Clone)]
pub struct Source {
    pub sid: Sid,
    pub name: String,
    pub rref: String,
    pub live: bool,
    pub linear: bool,
    pub follow_on: bool,
    pub lcn: Option<i64>,
    pub logo_href: Option<String>,
    pub owner: Option<String>,
    pub sref: Option<String>,
    pub default_content_id: Option<Cid>,
}

#[derive(Debug, Clone)]
pub struct SourceList {
    pub list_id: ListId,
    pub name: String,
    pub description: Option<String>,
    pub logo_href: Option<String>,
    pub sids: Vec<Sid>,
}

impl SourceList {
    pub fn is_uc_list(&self) -> bool {
        self.list_id.starts_with("uc_")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aspect {
    Source,
    FourByThree,
    FourteenByNine,
    SixteenByNine,
    SixteenByTen,
    TwentyOneByNine,
}

impl Aspect {
    pub fn as_wire(self) -> &'static str {
        match self {
            Aspect::Source => "source",
            Aspect::FourByThree => "4:3",
            Aspect::FourteenByNine => "14:9",
            Aspect::SixteenByNine => "16:9",
            Aspect::SixteenByTen => "16:10",
            Aspect::TwentyOneByNine => "21:9",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "source" => Some(Aspect::Source),
            "4:3" => Some(Aspect::FourByThree),
            "14:9" => Some(Aspect::FourteenByNine),
            "16:9" => Some(Aspect::SixteenByNine),
            "16:10" => Some(Aspect::SixteenByTen),
            "21:9" => Some(Aspect::TwentyOneByNine),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub volume: u32,
    pub mute: bool,
    pub aspect: Aspect,
}

/// Mutually exclusive selection state: at most one of a programme or an
/// app is selected on an output at any time.
#[derive(Debug, Clone)]
pub enum Selection {
    None,
    Programme { sid: Sid, cid: Cid },
    App { sid: Sid, cid: Cid },
}

#[derive(Debug, Clone)]
pub struct Playhead {
    pub absolute: Option<i64>,
    pub relative: Option<i64>,
    pub precision: u32,
    pub timestamp: DateTime<Utc>,
    pub length: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Output {
    pub oid: Oid,
    pub name: String,
    pub tags: Vec<String>,
    pub parent: Option<Oid>,
    pub settings: OutputSettings,
    pub selection: Selection,
    pub speed: Option<f64>,
    pub playhead: Option<Playhead>,
}

impl Output {
    pub fn is_main(&self) -> bool {
        self.tags.iter().any(|t| t == "main")
    }
}

#[derive(Debug, Clone)]
pub struct MediaComponent {
    pub mcid: Mcid,
    pub component_type: String,
    pub name: Option<String>,
    pub default: Option<bool>,
    pub aspect: Option<Aspect>,
    pub lang: Option<String>,
    pub vidformat: Option<String>,
    pub intent: Option<String>,
    pub colour: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ContentItem {
    pub sid: Sid,
    pub cid: Cid,
    pub title: Option<String>,
    pub synopsis: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub availability_start: Option<DateTime<Utc>>,
    pub availability_end: Option<DateTime<Utc>>,
    pub global_content_id: Option<String>,
    pub global_series_id: Option<String>,
    pub global_app_id: Option<String>,
    pub series_id: Option<String>,
    pub interactive: bool,
    pub presentable: bool,
    pub acquirable: bool,
    pub extension: bool,
    pub media_components: HashMap<Mcid, MediaComponent>,
    pub controls: Vec<String>,
    pub links: Vec<String>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ContentAcquisition {
    pub aid: Aid,
    pub sid: Sid,
    pub cid: Cid,
    /// Echoed only when the booking actually carries a schedule.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub interactive: bool,
    pub series_linked: Option<bool>,
    pub priority: Option<i64>,
    pub speculative: Option<bool>,
    pub active: Option<bool>,
    /// The `global-content-id` selector this acquisition was booked from, if
    /// any — echoed back on the rendered record rather than looked up.
    pub global_content_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SeriesAcquisition {
    pub aid: Aid,
    pub series_id: String,
    pub speculative: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum Acquisition {
    Content(ContentAcquisition),
    Series(SeriesAcquisition),
}

impl Acquisition {
    pub fn aid(&self) -> &str {
        match self {
            Acquisition::Content(c) => &c.aid,
            Acquisition::Series(s) => &s.aid,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredItem {
    pub cid: Cid,
    pub sid: Sid,
    pub created_time: DateTime<Utc>,
    pub size: Option<u64>,
}

/// Public-facing view of a confirmed client credential (the per-request
/// HMAC key itself is owned by the auth engine, never exposed here).
#[derive(Debug, Clone)]
pub struct CredentialInfo {
    pub client_id: String,
    pub name: String,
}

/// Sources set by the backend at startup; the core only reads this map,
/// all mutation and change-notification is the backend's responsibility.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    pub sources: HashMap<Sid, Source>,
}

impl SourceRegistry {
    pub fn get(&self, sid: &str) -> Option<&Source> {
        self.sources.get(sid)
    }
}

#[derive(Debug, Default)]
pub struct SourceListRegistry {
    pub lists: HashMap<ListId, SourceList>,
}

impl SourceListRegistry {
    /// All lists, `uc_*` lists first (stable order within each group).
    pub fn ordered(&self) -> Vec<&SourceList> {
        let mut lists: Vec<&SourceList> = self.lists.values().collect();
        lists.sort_by_key(|l| !l.is_uc_list());
        lists
    }

    /// The sids of `list_id`, sorted by `lcn` ascending (missing `lcn`
    /// sorts as `-1`).
    pub fn sorted_sids(&self, list_id: &str, sources: &SourceRegistry) -> Vec<Sid> {
        let Some(list) = self.lists.get(list_id) else {
            return Vec::new();
        };
        let mut sids = list.sids.clone();
        sids.sort_by_key(|sid| sources.get(sid).and_then(|s| s.lcn).unwrap_or(-1));
        sids
    }
}

#[derive(Debug, Default)]
pub struct OutputRegistry {
    pub outputs: HashMap<Oid, Output>,
    pub main_oid: Option<Oid>,
}

impl OutputRegistry {
    /// Resolves the `main` path alias to the designated main output id.
    pub fn resolve(&self, oid_or_main: &str) -> Option<&str> {
        if oid_or_main == "main" {
            self.main_oid.as_deref()
        } else {
            self.outputs.get(oid_or_main).map(|o| o.oid.as_str())
        }
    }

    pub fn get(&self, oid: &str) -> Option<&Output> {
        self.outputs.get(oid)
    }

    pub fn children_of<'a>(&'a self, oid: &str) -> Vec<&'a Output> {
        self.outputs
            .values()
            .filter(|o| o.parent.as_deref() == Some(oid))
            .collect()
    }

    pub fn roots(&self) -> Vec<&Output> {
        self.outputs.values().filter(|o| o.parent.is_none()).collect()
    }
}

#[derive(Debug, Default)]
pub struct AcquisitionRegistry {
    pub acquisitions: HashMap<Aid, Acquisition>,
    next_id: u64,
}

impl AcquisitionRegistry {
    /// Mints a fresh `aid`, unique across both content- and
    /// series-acquisition tables.
    pub fn mint_aid(&mut self) -> Aid {
        self.next_id += 1;
        format!("aid-{:x}", self.next_id)
    }

    pub fn insert(&mut self, acquisition: Acquisition) -> Aid {
        let aid = acquisition.aid().to_string();
        self.acquisitions.insert(aid.clone(), acquisition);
        aid
    }

    pub fn remove(&mut self, aid: &str) -> Option<Acquisition> {
        self.acquisitions.remove(aid)
    }
}

#[derive(Debug, Default)]
pub struct StorageRegistry {
    pub items: HashMap<Cid, StoredItem>,
}

impl StorageRegistry {
    /// A flat list of stored items sorted by `(sid, cid)`.
    pub fn sorted(&self) -> Vec<&StoredItem> {
        let mut items: Vec<&StoredItem> = self.items.values().collect();
        items.sort_by(|a, b| (&a.sid, &a.cid).cmp(&(&b.sid, &b.cid)));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(sid: &str, lcn: Option<i64>) -> Source {
        Source {
            sid: sid.to_string(),
            name: sid.to_string(),
            rref: format!("uc/sources/{sid}"),
            live: true,
            linear: true,
            follow_on: false,
            lcn,
            logo_href: None,
            owner: None,
            sref: None,
            default_content_id: None,
        }
    }

    #[test]
    fn orders_uc_lists_before_vendor_lists() {
        let mut registry = SourceListRegistry::default();
        registry.lists.insert(
            "vendor_list".to_string(),
            SourceList {
                list_id: "vendor_list".to_string(),
                name: "Vendor".to_string(),
                description: None,
                logo_href: None,
                sids: vec![],
            },
        );
        registry.lists.insert(
            "uc_all".to_string(),
            SourceList {
                list_id: "uc_all".to_string(),
                name: "All".to_string(),
                description: None,
                logo_href: None,
                sids: vec![],
            },
        );
        let ordered = registry.ordered();
        assert_eq!(ordered[0].list_id, "uc_all");
    }

    #[test]
    fn sorts_sids_by_lcn_with_missing_as_negative_one() {
        let mut sources = SourceRegistry::default();
        sources.sources.insert("s1".to_string(), source("s1", Some(5)));
        sources.sources.insert("s2".to_string(), source("s2", None));
        sources.sources.insert("s3".to_string(), source("s3", Some(1)));

        let mut lists = SourceListRegistry::default();
        lists.lists.insert(
            "uc_all".to_string(),
            SourceList {
                list_id: "uc_all".to_string(),
                name: "All".to_string(),
                description: None,
                logo_href: None,
                sids: vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
            },
        );

        let sorted = lists.sorted_sids("uc_all", &sources);
        assert_eq!(sorted, vec!["s2", "s3", "s1"]);
    }

    #[test]
    fn resolves_main_output_alias() {
        let mut registry = OutputRegistry::default();
        registry.outputs.insert(
            "o1".to_string(),
            Output {
                oid: "o1".to_string(),
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
        registry.main_oid = Some("o1".to_string());
        assert_eq!(registry.resolve("main"), Some("o1"));
        assert_eq!(registry.resolve("o1"), Some("o1"));
        assert_eq!(registry.resolve("missing"), None);
    }

    #[test]
    fn mints_unique_acquisition_ids() {
        let mut registry = AcquisitionRegistry::default();
        let a = registry.mint_aid();
        let b = registry.mint_aid();
        assert_ne!(a, b);
    }
}
