//! Same-number chapter disambiguation.
//!
//! Several groups often release the same chapter number. After selection,
//! contiguous records that share a chapter number form a *run*; each run is
//! reduced by the user's preferred uploaders and groups, or failing that by
//! a [`SameChapterPolicy`].
//!
//! The scan is a two-state machine over the selected records:
//!
//! - `Idle`: the current record is emitted directly unless the next record
//!   shares its number, in which case a run starts.
//! - `Accumulating(run)`: records join the run until the next record has a
//!   different number; the run is then resolved and the state returns to
//!   `Idle`.
//!
//! Duplicates separated by other records are independent singletons.

use crate::catalog::{ChapterRecord, EntityKind, NameLookup};
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do with a run no preference matched.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SameChapterPolicy {
    /// Keep every release.
    All,
    /// Ask the user which releases to keep.
    Ask,
    /// Keep the first release in listing order.
    First,
    /// Keep the last release in listing order.
    Last,
}

/// Preferred uploaders and groups, most preferred first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceSet {
    /// Uploader user names. Checked before groups.
    pub uploaders: Vec<String>,

    /// Scanlation group names.
    pub groups: Vec<String>,
}

impl PreferenceSet {
    /// Creates a preference set from already split lists.
    pub fn new(uploaders: Vec<String>, groups: Vec<String>) -> Self {
        Self { uploaders, groups }
    }

    /// Splits a comma separated list of names, dropping empty entries.
    pub fn parse_list(input: &str) -> Vec<String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A selected record together with its resolved credit names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// The catalog record.
    pub record: ChapterRecord,

    /// Scanlation group names, in relationship order.
    pub groups: Vec<String>,

    /// Uploader names. Only fetched when needed, empty otherwise.
    pub uploaders: Vec<String>,
}

impl Release {
    /// Returns the group names.
    pub fn group_names(&self) -> &[String] {
        &self.groups
    }

    /// Returns the uploader names.
    pub fn uploader_names(&self) -> &[String] {
        &self.uploaders
    }

    /// Names credited for the release: groups, or uploaders when there is
    /// no group.
    pub fn credit(&self) -> &[String] {
        if self.groups.is_empty() {
            &self.uploaders
        } else {
            &self.groups
        }
    }
}

/// Memoized group and user names, keyed by entity kind and id.
pub struct NameCache<'a, L: NameLookup + ?Sized> {
    lookup: &'a L,
    names: HashMap<(EntityKind, String), Option<String>>,
}

impl<'a, L: NameLookup + ?Sized> NameCache<'a, L> {
    /// Creates an empty cache in front of a lookup.
    pub fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            names: HashMap::new(),
        }
    }

    /// Returns the name of one entity, `None` if the catalog has none.
    pub async fn name(&mut self, kind: EntityKind, id: &str) -> Result<Option<String>, CatalogError> {
        let key = (kind, id.to_string());
        if let Some(cached) = self.names.get(&key) {
            return Ok(cached.clone());
        }

        let name = match self.lookup.lookup_name(kind, id).await {
            Ok(name) => Some(name),
            Err(CatalogError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        self.names.insert(key, name.clone());
        Ok(name)
    }

    /// Returns the known names for a list of ids, in order.
    pub async fn names(&mut self, kind: EntityKind, ids: &[String]) -> Result<Vec<String>, CatalogError> {
        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(name) = self.name(kind, id).await? {
                names.push(name);
            }
        }
        Ok(names)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.names.len()
    }
}

/// Chooses run members under [`SameChapterPolicy::Ask`].
pub trait Arbiter {
    /// Returns zero-based indices into `run`, in the order to keep them.
    fn choose(&mut self, run: &[Release]) -> Vec<usize>;
}

/// Result of parsing an answer to the "which release" question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunChoice {
    /// Zero-based indices of the chosen members.
    Picked(Vec<usize>),
    /// The answer could not be understood; ask again.
    Retry,
}

/// Parses an answer such as `1, 3-4` against a run of `run_len` members.
///
/// Entries are 1-based like the displayed list. Any entry that is not a
/// number or range within the run makes the whole answer a retry.
pub fn parse_run_choice(run_len: usize, input: &str) -> RunChoice {
    let parse_index = |raw: &str| -> Option<usize> {
        raw.trim()
            .parse::<usize>()
            .ok()
            .filter(|&n| (1..=run_len).contains(&n))
    };

    let mut picked = Vec::new();
    for entry in input.split(',').map(str::trim) {
        if entry.is_empty() {
            continue;
        }

        if entry.contains('-') {
            let mut parts = entry.split('-');
            let low = parts.next().and_then(parse_index);
            let high = parts.next_back().and_then(parse_index);
            match (low, high) {
                (Some(low), Some(high)) if low <= high => picked.extend(low - 1..high),
                _ => return RunChoice::Retry,
            }
        } else {
            match parse_index(entry) {
                Some(n) => picked.push(n - 1),
                None => return RunChoice::Retry,
            }
        }
    }

    if picked.is_empty() {
        RunChoice::Retry
    } else {
        RunChoice::Picked(picked)
    }
}

/// Lines shown when asking about a run: ` 1) by user from Group: Title`.
pub fn describe_run(run: &[Release]) -> Vec<String> {
    run.iter()
        .enumerate()
        .map(|(i, release)| {
            let mut line = format!(" {}) by {}", i + 1, release.uploaders.join(", "));
            if !release.groups.is_empty() {
                line.push_str(" from ");
                line.push_str(&release.groups.join(", "));
            }
            if let Some(title) = &release.record.title {
                line.push_str(": ");
                line.push_str(title);
            }
            line
        })
        .collect()
}

/// Scan state.
enum ScanState {
    Idle,
    Accumulating(Vec<Release>),
}

/// Callback receiving (done, total) while records are prepared.
type ProgressCallback<'a> = Box<dyn FnMut(usize, usize) + 'a>;

/// Reduces selected records to the final download sequence.
pub struct Disambiguator<'a, L: NameLookup + ?Sized> {
    names: NameCache<'a, L>,
    preferences: &'a PreferenceSet,
    policy: SameChapterPolicy,
    progress: Option<ProgressCallback<'a>>,
}

impl<'a, L: NameLookup + ?Sized> Disambiguator<'a, L> {
    /// Creates an engine resolving names through `lookup`.
    pub fn new(lookup: &'a L, preferences: &'a PreferenceSet, policy: SameChapterPolicy) -> Self {
        Self {
            names: NameCache::new(lookup),
            preferences,
            policy,
            progress: None,
        }
    }

    /// Registers a callback invoked before each record is prepared.
    pub fn on_progress(mut self, callback: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    #[cfg(test)]
    fn names(&self) -> &NameCache<'a, L> {
        &self.names
    }

    /// Scans `selected` and returns the releases to download, in order.
    pub async fn resolve(
        &mut self,
        selected: &[ChapterRecord],
        arbiter: &mut dyn Arbiter,
    ) -> Result<Vec<Release>, CatalogError> {
        let total = selected.len();
        let mut resolved = Vec::with_capacity(total);
        let mut state = ScanState::Idle;

        for (i, record) in selected.iter().enumerate() {
            if let Some(progress) = self.progress.as_mut() {
                progress(i, total);
            }

            let continues_run = selected
                .get(i + 1)
                .is_some_and(|next| next.chapter == record.chapter);
            let in_run = continues_run || matches!(state, ScanState::Accumulating(_));
            let release = self.prepare(record, in_run).await?;

            state = match (state, continues_run) {
                (ScanState::Idle, false) => {
                    resolved.push(release);
                    ScanState::Idle
                }
                (ScanState::Idle, true) => ScanState::Accumulating(vec![release]),
                (ScanState::Accumulating(mut run), true) => {
                    run.push(release);
                    ScanState::Accumulating(run)
                }
                (ScanState::Accumulating(mut run), false) => {
                    run.push(release);
                    resolved.extend(self.resolve_run(run, arbiter));
                    ScanState::Idle
                }
            };
        }

        if let ScanState::Accumulating(run) = state {
            resolved.extend(self.resolve_run(run, arbiter));
        }

        if let Some(progress) = self.progress.as_mut() {
            progress(total, total);
        }

        Ok(resolved)
    }

    /// Looks up the names a record needs.
    async fn prepare(&mut self, record: &ChapterRecord, in_run: bool) -> Result<Release, CatalogError> {
        let groups = self.names.names(EntityKind::Group, &record.group_ids).await?;

        let needs_uploaders = groups.is_empty() || in_run || !self.preferences.uploaders.is_empty();
        let uploaders = if needs_uploaders {
            self.names.names(EntityKind::User, &record.uploader_ids).await?
        } else {
            Vec::new()
        };

        Ok(Release {
            record: record.clone(),
            groups,
            uploaders,
        })
    }

    /// Resolves one closed run.
    fn resolve_run(&self, mut run: Vec<Release>, arbiter: &mut dyn Arbiter) -> Vec<Release> {
        if let Some(pos) = self.preferred_member(&run) {
            return vec![run.swap_remove(pos)];
        }

        match self.policy {
            SameChapterPolicy::All => run,
            SameChapterPolicy::First => run.into_iter().take(1).collect(),
            SameChapterPolicy::Last => run.pop().into_iter().collect(),
            SameChapterPolicy::Ask => arbiter
                .choose(&run)
                .into_iter()
                .filter_map(|i| run.get(i).cloned())
                .collect(),
        }
    }

    /// First-match-wins over uploader preferences, then group preferences.
    fn preferred_member(&self, run: &[Release]) -> Option<usize> {
        first_match(run, &self.preferences.uploaders, Release::uploader_names)
            .or_else(|| first_match(run, &self.preferences.groups, Release::group_names))
    }
}

/// Returns the first member carrying the most preferred name present.
fn first_match(
    run: &[Release],
    preferred: &[String],
    names: fn(&Release) -> &[String],
) -> Option<usize> {
    preferred
        .iter()
        .find_map(|name| run.iter().position(|release| names(release).contains(name)))
}
