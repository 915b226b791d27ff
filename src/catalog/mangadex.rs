//! MangaDex (api.mangadex.org) catalog implementation.
//!
//! Talks to the public v5 API: legacy id mapping, manga titles, the
//! translated chapter feed, at-home delivery sessions, and group/user names.

use super::{
    Catalog, ChapterRecord, DeliverySession, EntityKind, FeedPage, NameLookup,
    create_http_client,
};
use crate::config::CatalogConfig;
use crate::error::CatalogError;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use url::Url;

/// Content ratings requested from the feed.
const CONTENT_RATINGS: &[&str] = &["safe", "suggestive", "erotica", "pornographic"];

/// Legacy id mapping response.
#[derive(Debug, Deserialize)]
struct MappingResponse {
    data: Vec<MappingData>,
}

#[derive(Debug, Deserialize)]
struct MappingData {
    attributes: MappingAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MappingAttributes {
    new_id: String,
}

/// Manga response.
#[derive(Debug, Deserialize)]
struct MangaResponse {
    data: MangaData,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    attributes: MangaAttributes,
}

/// Manga attributes relevant to titles.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaAttributes {
    #[serde(default)]
    title: HashMap<String, String>,
    #[serde(default)]
    alt_titles: Vec<HashMap<String, String>>,
}

/// Chapter feed response. `total` is optional so a missing field can be
/// reported as a bad language code instead of a parse failure.
#[derive(Debug, Deserialize)]
struct FeedResponse {
    total: Option<u32>,
    #[serde(default)]
    data: Vec<FeedChapter>,
}

#[derive(Debug, Deserialize)]
struct FeedChapter {
    id: String,
    attributes: FeedChapterAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct FeedChapterAttributes {
    chapter: Option<String>,
    volume: Option<String>,
    title: Option<String>,
    #[serde(default)]
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    id: String,
    #[serde(rename = "type")]
    rel_type: String,
}

/// At-home server response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeResponse {
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeChapter {
    hash: String,
    data: Vec<String>,
    data_saver: Vec<String>,
}

/// Group or user response.
#[derive(Debug, Deserialize)]
struct EntityResponse {
    data: EntityData,
}

#[derive(Debug, Deserialize)]
struct EntityData {
    attributes: EntityAttributes,
}

#[derive(Debug, Deserialize)]
struct EntityAttributes {
    name: Option<String>,
    username: Option<String>,
}

impl FeedChapter {
    fn into_record(self) -> ChapterRecord {
        let ids_of = |kind: EntityKind| -> Vec<String> {
            self.relationships
                .iter()
                .filter(|rel| rel.rel_type == kind.relationship_type())
                .map(|rel| rel.id.clone())
                .collect()
        };
        let group_ids = ids_of(EntityKind::Group);
        let uploader_ids = ids_of(EntityKind::User);

        ChapterRecord {
            id: self.id,
            chapter: self.attributes.chapter,
            volume: self.attributes.volume,
            title: self.attributes.title.filter(|t| !t.trim().is_empty()),
            pages: self.attributes.pages,
            group_ids,
            uploader_ids,
        }
    }
}

/// Picks the title for a language: main titles, then alt titles, then English.
fn pick_title(attributes: &MangaAttributes, lang: &str) -> Option<String> {
    attributes
        .title
        .get(lang)
        .or_else(|| {
            attributes
                .alt_titles
                .iter()
                .rev()
                .find_map(|alt| alt.get(lang))
        })
        .or_else(|| attributes.title.get("en"))
        .cloned()
}

/// Turns a feed reply into a page. Anything but a transport failure or a
/// well-formed reply with a `total` means the language code was rejected.
fn feed_page(response: Result<FeedResponse, CatalogError>) -> Result<FeedPage, CatalogError> {
    let invalid_feed = || {
        CatalogError::Api(
            "Error retrieving the chapters list. Did you specify a valid language code?"
                .to_string(),
        )
    };

    let response = response.map_err(|e| match e {
        CatalogError::HttpError(e) => CatalogError::HttpError(e),
        _ => invalid_feed(),
    })?;

    let total = response.total.ok_or_else(invalid_feed)?;
    Ok(FeedPage {
        total,
        records: response
            .data
            .into_iter()
            .map(FeedChapter::into_record)
            .collect(),
    })
}

/// MangaDex catalog client.
pub struct MangaDexClient {
    client: reqwest::Client,
    config: CatalogConfig,
}

impl MangaDexClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        let client = create_http_client(&config)?;
        Ok(Self { client, config })
    }

    /// Returns the underlying HTTP client, shared with the page downloader.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    fn endpoint(&self, path: &str) -> Result<Url, CatalogError> {
        let base = self.config.api_base.trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| CatalogError::Api(format!("invalid endpoint {}: {}", path, e)))
    }

    fn debug(&self, message: &str) {
        if self.config.debug {
            eprintln!("[MangaDex Debug] {}", message);
        }
    }

    /// Builds the feed URL for one page.
    fn feed_url(&self, uuid: &str, lang: &str, offset: u32, limit: u32) -> Result<Url, CatalogError> {
        let mut url = self.endpoint(&format!("manga/{}/feed", uuid))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("limit", &limit.to_string())
                .append_pair("offset", &offset.to_string())
                .append_pair("translatedLanguage[]", lang)
                .append_pair("order[volume]", "asc")
                .append_pair("order[chapter]", "asc");
            for rating in CONTENT_RATINGS {
                query.append_pair("contentRating[]", rating);
            }
        }
        Ok(url)
    }

    /// Sends a request and decodes the JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, CatalogError> {
        let response = request.send().await?;
        let status = response.status();
        self.debug(&format!("{} -> {}", what, status.as_u16()));

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.debug(&format!("{} body: {}", what, body));
            return Err(CatalogError::Api(format!("HTTP {} for {}", status, what)));
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| CatalogError::Api(format!("unexpected response for {}: {}", what, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, CatalogError> {
        self.send_json(self.client.get(url), what).await
    }
}

#[async_trait]
impl NameLookup for MangaDexClient {
    async fn lookup_name(&self, kind: EntityKind, id: &str) -> Result<String, CatalogError> {
        let url = self.endpoint(&format!("{}/{}", kind.path(), id))?;
        let response: EntityResponse = self
            .get_json(url, &format!("{} {}", kind.path(), id))
            .await?;

        let attributes = response.data.attributes;
        let name = match kind {
            EntityKind::Group => attributes.name,
            EntityKind::User => attributes.username,
        };
        name.ok_or_else(|| CatalogError::NotFound(format!("name of {} {}", kind.path(), id)))
    }
}

#[async_trait]
impl Catalog for MangaDexClient {
    async fn resolve_legacy_id(&self, legacy_id: u64) -> Result<String, CatalogError> {
        let url = self.endpoint("legacy/mapping")?;
        let body = serde_json::json!({ "type": "manga", "ids": [legacy_id] });
        let request = self.client.post(url).json(&body);

        let response: MappingResponse = self
            .send_json(request, &format!("legacy id {}", legacy_id))
            .await
            .map_err(|e| match e {
                CatalogError::HttpError(e) => CatalogError::HttpError(e),
                _ => CatalogError::InvalidId(legacy_id.to_string()),
            })?;

        response
            .data
            .into_iter()
            .next()
            .map(|mapping| mapping.attributes.new_id)
            .ok_or_else(|| CatalogError::InvalidId(legacy_id.to_string()))
    }

    async fn title(&self, uuid: &str, lang: &str) -> Result<String, CatalogError> {
        let url = self.endpoint(&format!("manga/{}", uuid))?;
        let response: MangaResponse = self
            .get_json(url, &format!("manga {}", uuid))
            .await
            .map_err(|e| match e {
                CatalogError::NotFound(_) => CatalogError::InvalidId(uuid.to_string()),
                other => other,
            })?;

        pick_title(&response.data.attributes, lang)
            .ok_or_else(|| CatalogError::MissingTitle(uuid.to_string()))
    }

    async fn chapter_feed(
        &self,
        uuid: &str,
        lang: &str,
        offset: u32,
        limit: u32,
    ) -> Result<FeedPage, CatalogError> {
        let url = self.feed_url(uuid, lang, offset, limit)?;
        let response = self
            .get_json(url, &format!("feed of {} at {}", uuid, offset))
            .await;
        feed_page(response)
    }

    async fn delivery_session(&self, chapter_id: &str) -> Result<DeliverySession, CatalogError> {
        let url = self.endpoint(&format!("at-home/server/{}", chapter_id))?;
        let response: AtHomeResponse = self
            .get_json(url, &format!("delivery session {}", chapter_id))
            .await?;

        if response.base_url.is_empty() || response.chapter.hash.is_empty() {
            return Err(CatalogError::Api(format!(
                "incomplete delivery session for chapter {}",
                chapter_id
            )));
        }

        Ok(DeliverySession {
            base_url: response.base_url,
            hash: response.chapter.hash,
            data: response.chapter.data,
            data_saver: response.chapter.data_saver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MangaDexClient {
        MangaDexClient::new(CatalogConfig::default()).unwrap()
    }

    #[test]
    fn test_feed_url() {
        let url = client().feed_url("abc", "pt-br", 500, 500).unwrap();
        let query = url.query().unwrap();

        assert!(url.as_str().starts_with("https://api.mangadex.org/manga/abc/feed?"));
        assert!(query.contains("offset=500"));
        assert!(query.contains("translatedLanguage%5B%5D=pt-br"));
        assert!(query.find("order%5Bvolume%5D").unwrap() < query.find("order%5Bchapter%5D").unwrap());
        assert_eq!(query.matches("contentRating%5B%5D=").count(), 4);
    }

    #[test]
    fn test_feed_chapter_into_record() {
        let json = r#"{
            "id": "ch-1",
            "attributes": {"chapter": "3", "volume": "1", "title": "", "pages": 18},
            "relationships": [
                {"id": "g-1", "type": "scanlation_group"},
                {"id": "m-1", "type": "manga"},
                {"id": "u-1", "type": "user"},
                {"id": "g-2", "type": "scanlation_group"}
            ]
        }"#;
        let chapter: FeedChapter = serde_json::from_str(json).unwrap();
        let record = chapter.into_record();

        assert_eq!(record.chapter.as_deref(), Some("3"));
        assert_eq!(record.volume.as_deref(), Some("1"));
        assert_eq!(record.title, None);
        assert_eq!(record.pages, 18);
        assert_eq!(record.group_ids, vec!["g-1".to_string(), "g-2".to_string()]);
        assert_eq!(record.uploader_ids, vec!["u-1".to_string()]);
    }

    fn is_language_error(result: Result<FeedPage, CatalogError>) -> bool {
        matches!(result, Err(CatalogError::Api(message)) if message.contains("valid language code"))
    }

    #[test]
    fn test_feed_without_total_is_a_language_error() {
        let response: FeedResponse =
            serde_json::from_str(r#"{"result": "error", "errors": []}"#).unwrap();
        assert!(response.total.is_none());
        assert!(is_language_error(feed_page(Ok(response))));
    }

    #[test]
    fn test_feed_api_failures_are_language_errors() {
        let rejected = Err(CatalogError::Api("HTTP 400 Bad Request for feed".to_string()));
        assert!(is_language_error(feed_page(rejected)));

        let missing = Err(CatalogError::NotFound("feed of x at 0".to_string()));
        assert!(is_language_error(feed_page(missing)));
    }

    #[test]
    fn test_feed_page_keeps_total_and_records() {
        let response: FeedResponse = serde_json::from_str(
            r#"{"total": 1, "data": [{"id": "ch-1", "attributes": {"chapter": "1", "pages": 3}}]}"#,
        )
        .unwrap();
        let page = feed_page(Ok(response)).unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, "ch-1");
        assert!(page.records[0].group_ids.is_empty());
    }

    #[test]
    fn test_pick_title_fallbacks() {
        let attributes: MangaAttributes = serde_json::from_str(
            r#"{
                "title": {"en": "Frieren"},
                "altTitles": [{"ja": "葬送のフリーレン"}, {"fr": "Frieren FR"}]
            }"#,
        )
        .unwrap();

        assert_eq!(pick_title(&attributes, "en").as_deref(), Some("Frieren"));
        assert_eq!(pick_title(&attributes, "ja").as_deref(), Some("葬送のフリーレン"));
        assert_eq!(pick_title(&attributes, "de").as_deref(), Some("Frieren"));

        let no_english: MangaAttributes =
            serde_json::from_str(r#"{"title": {"ja-ro": "Sousou"}}"#).unwrap();
        assert_eq!(pick_title(&no_english, "de"), None);
    }
}
