//! Listing normalization.
//!
//! Flattens the paginated chapter feed into one ordered listing, dropping
//! chapters hosted elsewhere (zero pages) and, in volume mode, grouping
//! record indices by volume label.

use crate::catalog::{Catalog, ChapterRecord, FEED_PAGE_LIMIT, FeedPage};
use crate::error::CatalogError;

/// Label shown and accepted for chapters without a volume.
pub const NO_VOLUME_LABEL: &str = "N/A";

/// Whether the user selects chapters or whole volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Chapters,
    Volumes,
}

impl Mode {
    /// Returns the noun used in prompts and diagnostics.
    pub fn noun(self) -> &'static str {
        match self {
            Mode::Chapters => "chapter",
            Mode::Volumes => "volume",
        }
    }
}

/// The listing records that belong to one volume label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeGroup {
    /// Volume label, `None` for chapters without a volume.
    pub label: Option<String>,

    /// Indices into the listing records, in listing order.
    pub indices: Vec<usize>,
}

impl VolumeGroup {
    /// Returns the label as displayed to the user.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(NO_VOLUME_LABEL)
    }

    /// Checks whether a user token names this volume.
    pub fn matches(&self, token: &str) -> bool {
        match &self.label {
            Some(label) => label == token,
            None => token.eq_ignore_ascii_case(NO_VOLUME_LABEL),
        }
    }
}

/// Ordered chapter listing for one manga and language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    mode: Mode,
    records: Vec<ChapterRecord>,
    volumes: Vec<VolumeGroup>,
}

impl Listing {
    /// Builds a listing from feed pages, in page order.
    ///
    /// A volume group starts whenever the label differs from the previous
    /// kept record's label. A label that comes back after another volume
    /// replaces the indices stored under it; the group keeps the position
    /// where the label was first seen.
    pub fn from_pages<I>(pages: I, mode: Mode) -> Self
    where
        I: IntoIterator<Item = FeedPage>,
    {
        let mut records: Vec<ChapterRecord> = Vec::new();
        let mut volumes: Vec<VolumeGroup> = Vec::new();
        // Position in `volumes` of the group being filled.
        let mut current: Option<usize> = None;

        for page in pages {
            for record in page.records.into_iter().filter(|r| r.pages > 0) {
                if mode == Mode::Volumes {
                    let continues = current
                        .map(|pos| volumes[pos].label == record.volume)
                        .unwrap_or(false);

                    if !continues {
                        let pos = match volumes.iter().position(|v| v.label == record.volume) {
                            Some(pos) => {
                                volumes[pos].indices.clear();
                                pos
                            }
                            None => {
                                volumes.push(VolumeGroup {
                                    label: record.volume.clone(),
                                    indices: Vec::new(),
                                });
                                volumes.len() - 1
                            }
                        };
                        current = Some(pos);
                    }

                    if let Some(pos) = current {
                        volumes[pos].indices.push(records.len());
                    }
                }
                records.push(record);
            }
        }

        Self {
            mode,
            records,
            volumes,
        }
    }

    /// Returns the selection mode the listing was built for.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns all kept records in catalog order.
    pub fn records(&self) -> &[ChapterRecord] {
        &self.records
    }

    /// Returns the volume groups (empty in chapter mode).
    pub fn volumes(&self) -> &[VolumeGroup] {
        &self.volumes
    }

    /// Looks up a volume group by the label a user typed.
    pub fn volume(&self, token: &str) -> Option<&VolumeGroup> {
        self.volumes.iter().find(|v| v.matches(token))
    }

    /// Returns true if no record survived normalization.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Renders the available chapters or volumes for display.
    pub fn summary(&self) -> String {
        match self.mode {
            Mode::Chapters => summarize_chapters(self.records.iter()),
            Mode::Volumes => self
                .volumes
                .iter()
                .map(|volume| {
                    let chapters = volume.indices.iter().map(|&i| &self.records[i]);
                    format!(
                        "Vol. {} : {}",
                        volume.display_label(),
                        summarize_chapters(chapters)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Joins chapter numbers, collapsing contiguous duplicates as `12(3)`.
fn summarize_chapters<'a, I>(records: I) -> String
where
    I: Iterator<Item = &'a ChapterRecord>,
{
    let mut parts: Vec<String> = Vec::new();
    let mut previous: Option<&Option<String>> = None;
    let mut same_count = 0usize;

    let flush = |label: Option<&Option<String>>, count: usize, parts: &mut Vec<String>| {
        if let Some(label) = label {
            let text = label.as_deref().unwrap_or("Oneshot");
            if count > 1 {
                parts.push(format!("{}({})", text, count));
            } else {
                parts.push(text.to_string());
            }
        }
    };

    for record in records {
        if previous == Some(&record.chapter) {
            same_count += 1;
            continue;
        }
        flush(previous, same_count, &mut parts);
        previous = Some(&record.chapter);
        same_count = 1;
    }
    flush(previous, same_count, &mut parts);

    parts.join(", ")
}

/// Fetches every feed page and normalizes it into a listing.
pub async fn fetch_listing<C>(
    catalog: &C,
    uuid: &str,
    lang: &str,
    mode: Mode,
) -> Result<Listing, CatalogError>
where
    C: Catalog + ?Sized,
{
    let first = catalog.chapter_feed(uuid, lang, 0, FEED_PAGE_LIMIT).await?;
    let total = first.total;
    if total == 0 {
        return Err(CatalogError::NoChapters);
    }

    let mut pages = vec![first];
    let mut offset = FEED_PAGE_LIMIT;
    while offset < total {
        pages.push(catalog.chapter_feed(uuid, lang, offset, FEED_PAGE_LIMIT).await?);
        offset += FEED_PAGE_LIMIT;
    }

    let listing = Listing::from_pages(pages, mode);
    if listing.is_empty() {
        return Err(CatalogError::NoChapters);
    }
    Ok(listing)
}
