//! Catalog trait and common types for the manga catalog API.
//!
//! This module defines the interface the rest of the crate uses to talk to
//! the remote catalog, along with the typed records it hands back. Loosely
//! typed JSON never leaves the implementation in [`mangadex`].

mod mangadex;

pub use mangadex::MangaDexClient;

use crate::config::CatalogConfig;
use crate::error::CatalogError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Maximum page size accepted by the chapter feed endpoint.
pub const FEED_PAGE_LIMIT: u32 = 500;

/// Matches a MangaDex UUID anywhere in the input.
static UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

/// Matches a legacy numeric id in a title URL.
static LEGACY_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:title|manga)/(\d+)(?:/|$)").unwrap());

/// A single chapter release as listed in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRecord {
    /// Chapter UUID.
    pub id: String,

    /// Chapter number as displayed, `None` for oneshots.
    pub chapter: Option<String>,

    /// Volume label, `None` when unassigned.
    pub volume: Option<String>,

    /// Chapter title, if any.
    pub title: Option<String>,

    /// Number of pages hosted by the catalog.
    pub pages: u32,

    /// Scanlation group ids, in relationship order.
    pub group_ids: Vec<String>,

    /// Uploader user ids, in relationship order.
    pub uploader_ids: Vec<String>,
}

impl ChapterRecord {
    /// Returns true if this chapter has no number.
    pub fn is_oneshot(&self) -> bool {
        self.chapter.is_none()
    }

    /// Returns the chapter number, or "Oneshot" when it has none.
    pub fn display_number(&self) -> &str {
        self.chapter.as_deref().unwrap_or("Oneshot")
    }
}

/// One page of the chapter feed.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    /// Total number of records the catalog reports for the feed.
    pub total: u32,

    /// Records on this page, ordered by volume then chapter.
    pub records: Vec<ChapterRecord>,
}

/// Per-chapter image delivery information.
#[derive(Debug, Clone)]
pub struct DeliverySession {
    /// Base URL of the delivery node.
    pub base_url: String,

    /// Chapter hash used in page paths.
    pub hash: String,

    /// Full quality page filenames.
    pub data: Vec<String>,

    /// Reduced quality page filenames.
    pub data_saver: Vec<String>,
}

impl DeliverySession {
    /// Builds the page image URLs for the requested quality.
    pub fn page_urls(&self, data_saver: bool) -> Vec<String> {
        let (mode, files) = if data_saver {
            ("data-saver", &self.data_saver)
        } else {
            ("data", &self.data)
        };
        let base = self.base_url.trim_end_matches('/');

        files
            .iter()
            .map(|file| format!("{}/{}/{}/{}", base, mode, self.hash, file))
            .collect()
    }
}

/// Kinds of named entities attached to a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A scanlation group.
    Group,
    /// An uploading user.
    User,
}

impl EntityKind {
    /// Relationship type used by the feed.
    pub fn relationship_type(self) -> &'static str {
        match self {
            EntityKind::Group => "scanlation_group",
            EntityKind::User => "user",
        }
    }

    /// API path segment for lookups.
    pub fn path(self) -> &'static str {
        match self {
            EntityKind::Group => "group",
            EntityKind::User => "user",
        }
    }
}

/// The identifier a user typed or pasted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MangaId {
    /// Current UUID identifier.
    Uuid(String),
    /// Numeric id from the old site, needs mapping.
    Legacy(u64),
}

/// Parses a manga URL, UUID, or legacy numeric id.
pub fn parse_manga_id(input: &str) -> Result<MangaId, CatalogError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CatalogError::InvalidId(input.to_string()));
    }

    if let Ok(number) = input.parse::<u64>() {
        return Ok(MangaId::Legacy(number));
    }

    if input.contains("/chapter/") {
        return Err(CatalogError::InvalidId(input.to_string()));
    }

    if let Some(m) = UUID_REGEX.find(input) {
        return Ok(MangaId::Uuid(m.as_str().to_lowercase()));
    }

    LEGACY_URL_REGEX
        .captures(input)
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .map(MangaId::Legacy)
        .ok_or_else(|| CatalogError::InvalidId(input.to_string()))
}

/// Resolves display names for groups and users.
///
/// Split from [`Catalog`] so the disambiguation engine can be driven by
/// canned names in tests.
#[async_trait]
pub trait NameLookup: Send + Sync {
    /// Fetches the display name of a group or user.
    async fn lookup_name(&self, kind: EntityKind, id: &str) -> Result<String, CatalogError>;
}

/// Trait for the remote manga catalog.
#[async_trait]
pub trait Catalog: NameLookup {
    /// Maps a legacy numeric id to its UUID.
    async fn resolve_legacy_id(&self, legacy_id: u64) -> Result<String, CatalogError>;

    /// Fetches the manga title in the given language, with fallbacks.
    async fn title(&self, uuid: &str, lang: &str) -> Result<String, CatalogError>;

    /// Fetches one page of the chapter feed.
    async fn chapter_feed(
        &self,
        uuid: &str,
        lang: &str,
        offset: u32,
        limit: u32,
    ) -> Result<FeedPage, CatalogError>;

    /// Fetches the delivery session for a chapter.
    async fn delivery_session(&self, chapter_id: &str) -> Result<DeliverySession, CatalogError>;

    /// Resolves any identifier form to a UUID.
    async fn resolve_id(&self, id: &MangaId) -> Result<String, CatalogError> {
        match id {
            MangaId::Uuid(uuid) => Ok(uuid.clone()),
            MangaId::Legacy(number) => self.resolve_legacy_id(*number).await,
        }
    }
}

/// Common HTTP client configuration.
pub fn create_http_client(config: &CatalogConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("mangadl/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.timeout_sec))
        .build()
}

/// Applies rate limiting delay.
pub async fn rate_limit(delay_sec: f64) {
    if delay_sec > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(delay_sec)).await;
    }
}
