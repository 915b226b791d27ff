//! Selection parsing.
//!
//! Turns the comma separated list a user types (`1, 3-5, oneshot`) into the
//! ordered records it names. Unknown labels never abort the run; they are
//! reported as [`Skip`] diagnostics next to the records that did match.

use crate::catalog::ChapterRecord;
use crate::listing::{Listing, Mode};
use std::fmt;

/// One comma separated entry of the user's selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionToken {
    /// A single chapter number or volume label.
    Index(String),
    /// An inclusive range between two labels.
    Range(String, String),
    /// Every chapter without a number.
    Oneshot,
}

impl SelectionToken {
    /// Classifies one trimmed entry. Returns `None` for empty entries.
    pub fn parse(raw: &str, mode: Mode) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if raw.contains('-') {
            let mut parts = raw.split('-');
            let low = parts.next().unwrap_or_default().trim().to_string();
            let high = parts.next_back().unwrap_or_default().trim().to_string();
            return Some(SelectionToken::Range(low, high));
        }

        if mode == Mode::Chapters && raw.eq_ignore_ascii_case("oneshot") {
            return Some(SelectionToken::Oneshot);
        }

        Some(SelectionToken::Index(raw.to_string()))
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionToken::Index(label) => write!(f, "{}", label),
            SelectionToken::Range(low, high) => write!(f, "{}-{}", low, high),
            SelectionToken::Oneshot => write!(f, "oneshot"),
        }
    }
}

/// Splits a full selection string into tokens, left to right.
pub fn tokenize(input: &str, mode: Mode) -> Vec<SelectionToken> {
    input
        .split(',')
        .filter_map(|raw| SelectionToken::parse(raw, mode))
        .collect()
}

/// Why a token selected nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// A single label is not in the listing.
    Missing { noun: &'static str, label: String },
    /// A range bound is not in the listing; the whole range is dropped.
    MissingBound {
        noun: &'static str,
        bound: String,
        token: String,
    },
    /// `oneshot` was requested but every chapter has a number.
    NoOneshot,
    /// Both bounds exist but the high one comes first.
    EmptyRange { token: String },
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::Missing { noun, label } => {
                write!(f, "{} {} does not exist. Skipping.", capitalize(noun), label)
            }
            Skip::MissingBound { noun, bound, token } => write!(
                f,
                "{} {} does not exist. Skipping range {}.",
                capitalize(noun),
                bound,
                token
            ),
            Skip::NoOneshot => write!(f, "Chapter Oneshot does not exist. Skipping."),
            Skip::EmptyRange { token } => {
                write!(f, "Range {} selects nothing. Skipping.", token)
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The records a selection string named, plus what was skipped.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Matched records, token by token, each token in listing order.
    pub records: Vec<ChapterRecord>,

    /// Diagnostics for tokens that matched nothing.
    pub skipped: Vec<Skip>,
}

/// Resolves a selection string against a listing.
pub fn select(listing: &Listing, input: &str) -> Selection {
    let mut selection = Selection::default();

    for token in tokenize(input, listing.mode()) {
        match resolve_token(listing, &token) {
            Ok(indices) => selection
                .records
                .extend(indices.into_iter().map(|i| listing.records()[i].clone())),
            Err(skip) => selection.skipped.push(skip),
        }
    }

    selection
}

/// Resolves one token to listing indices.
fn resolve_token(listing: &Listing, token: &SelectionToken) -> Result<Vec<usize>, Skip> {
    let noun = listing.mode().noun();
    let records = listing.records();

    match (listing.mode(), token) {
        (Mode::Chapters, SelectionToken::Index(label)) => {
            let matches: Vec<usize> = records
                .iter()
                .enumerate()
                .filter(|(_, r)| r.chapter.as_deref() == Some(label.as_str()))
                .map(|(i, _)| i)
                .collect();
            if matches.is_empty() {
                return Err(Skip::Missing {
                    noun,
                    label: label.clone(),
                });
            }
            Ok(matches)
        }
        (Mode::Chapters, SelectionToken::Oneshot) => {
            let matches: Vec<usize> = records
                .iter()
                .enumerate()
                .filter(|(_, r)| r.is_oneshot())
                .map(|(i, _)| i)
                .collect();
            if matches.is_empty() {
                return Err(Skip::NoOneshot);
            }
            Ok(matches)
        }
        (Mode::Chapters, SelectionToken::Range(low, high)) => {
            let missing = |bound: &str| Skip::MissingBound {
                noun,
                bound: bound.to_string(),
                token: token.to_string(),
            };

            let start = records
                .iter()
                .position(|r| r.chapter.as_deref() == Some(low.as_str()))
                .ok_or_else(|| missing(low))?;
            // The range stops at the first release of the upper number.
            let end = records
                .iter()
                .position(|r| r.chapter.as_deref() == Some(high.as_str()))
                .ok_or_else(|| missing(high))?;

            if start > end {
                return Err(Skip::EmptyRange {
                    token: token.to_string(),
                });
            }
            Ok((start..=end).collect())
        }
        (Mode::Volumes, SelectionToken::Index(label)) => listing
            .volume(label)
            .map(|volume| volume.indices.clone())
            .ok_or_else(|| Skip::Missing {
                noun,
                label: label.clone(),
            }),
        (Mode::Volumes, SelectionToken::Range(low, high)) => {
            let volumes = listing.volumes();
            let missing = |bound: &str| Skip::MissingBound {
                noun,
                bound: bound.to_string(),
                token: token.to_string(),
            };

            let start = volumes
                .iter()
                .position(|v| v.matches(low))
                .ok_or_else(|| missing(low))?;
            let end = volumes
                .iter()
                .position(|v| v.matches(high))
                .ok_or_else(|| missing(high))?;

            if start > end {
                return Err(Skip::EmptyRange {
                    token: token.to_string(),
                });
            }
            Ok(volumes[start..=end]
                .iter()
                .flat_map(|v| v.indices.iter().copied())
                .collect())
        }
        // `oneshot` is only a keyword in chapter mode; tokenize never yields
        // it for volumes.
        (Mode::Volumes, SelectionToken::Oneshot) => Err(Skip::Missing {
            noun,
            label: token.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FeedPage;
    use crate::listing::tests::record;

    fn listing(records: Vec<ChapterRecord>, mode: Mode) -> Listing {
        Listing::from_pages(
            vec![FeedPage {
                total: records.len() as u32,
                records,
            }],
            mode,
        )
    }

    fn ids(selection: &Selection) -> Vec<&str> {
        selection.records.iter().map(|r| r.id.as_str()).collect()
    }

    fn chapters() -> Listing {
        listing(
            vec![
                record("1a", Some("1"), Some("1")),
                record("1b", Some("1"), Some("1")),
                record("2", Some("2"), Some("1")),
                record("3", Some("3"), Some("2")),
                record("4a", Some("4"), Some("2")),
                record("4b", Some("4"), Some("2")),
                record("5", Some("5"), Some("3")),
            ],
            Mode::Chapters,
        )
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize(" 1, 2-4 ,OneShot,, 7-8-9", Mode::Chapters),
            vec![
                SelectionToken::Index("1".to_string()),
                SelectionToken::Range("2".to_string(), "4".to_string()),
                SelectionToken::Oneshot,
                SelectionToken::Range("7".to_string(), "9".to_string()),
            ]
        );
        assert_eq!(
            tokenize("oneshot", Mode::Volumes),
            vec![SelectionToken::Index("oneshot".to_string())]
        );
    }

    #[test]
    fn test_single_number_selects_every_release() {
        let selection = select(&chapters(), "4");
        assert_eq!(ids(&selection), vec!["4a", "4b"]);
        assert!(selection.skipped.is_empty());
    }

    #[test]
    fn test_tokens_concatenate_in_token_order() {
        let selection = select(&chapters(), "5, 1, 2-3");
        assert_eq!(ids(&selection), vec!["5", "1a", "1b", "2", "3"]);
    }

    #[test]
    fn test_overlapping_tokens_keep_duplicates() {
        let selection = select(&chapters(), "2, 1-2");
        assert_eq!(ids(&selection), vec!["2", "1a", "1b", "2"]);
    }

    #[test]
    fn test_range_ends_at_first_release_of_upper_bound() {
        let selection = select(&chapters(), "1-4");
        assert_eq!(ids(&selection), vec!["1a", "1b", "2", "3", "4a"]);

        let short = listing(
            vec![
                record("1", Some("1"), None),
                record("2a", Some("2"), None),
                record("2b", Some("2"), None),
            ],
            Mode::Chapters,
        );
        assert_eq!(ids(&select(&short, "1-2")), vec!["1", "2a"]);
        assert_eq!(ids(&select(&short, "2")), vec!["2a", "2b"]);
    }

    #[test]
    fn test_range_with_missing_bounds_is_dropped() {
        let selection = select(&chapters(), "9-3, 2-9, 3");
        assert_eq!(ids(&selection), vec!["3"]);
        assert_eq!(
            selection.skipped,
            vec![
                Skip::MissingBound {
                    noun: "chapter",
                    bound: "9".to_string(),
                    token: "9-3".to_string(),
                },
                Skip::MissingBound {
                    noun: "chapter",
                    bound: "9".to_string(),
                    token: "2-9".to_string(),
                },
            ]
        );
        assert_eq!(
            selection.skipped[0].to_string(),
            "Chapter 9 does not exist. Skipping range 9-3."
        );
    }

    #[test]
    fn test_reversed_range_selects_nothing() {
        let selection = select(&chapters(), "3-1");
        assert!(selection.records.is_empty());
        assert_eq!(
            selection.skipped,
            vec![Skip::EmptyRange {
                token: "3-1".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_single_label() {
        let selection = select(&chapters(), "42");
        assert!(selection.records.is_empty());
        assert_eq!(selection.skipped[0].to_string(), "Chapter 42 does not exist. Skipping.");
    }

    #[test]
    fn test_oneshot() {
        let with_oneshot = listing(
            vec![record("1", Some("1"), None), record("os", None, None)],
            Mode::Chapters,
        );
        let selection = select(&with_oneshot, "ONESHOT");
        assert_eq!(ids(&selection), vec!["os"]);

        let selection = select(&chapters(), "oneshot");
        assert!(selection.records.is_empty());
        assert_eq!(selection.skipped, vec![Skip::NoOneshot]);
    }

    #[test]
    fn test_volume_selection() {
        let volumes = listing(chapters().records().to_vec(), Mode::Volumes);

        let selection = select(&volumes, "2");
        assert_eq!(ids(&selection), vec!["3", "4a", "4b"]);

        let selection = select(&volumes, "1-2, 3");
        assert_eq!(ids(&selection), vec!["1a", "1b", "2", "3", "4a", "4b", "5"]);

        let selection = select(&volumes, "7, oneshot");
        assert!(selection.records.is_empty());
        assert_eq!(selection.skipped.len(), 2);
        assert_eq!(selection.skipped[0].to_string(), "Volume 7 does not exist. Skipping.");
    }

    #[test]
    fn test_selection_preserves_listing_order_within_token() {
        let listing = chapters();
        let selection = select(&listing, "1-5");
        let positions: Vec<usize> = selection
            .records
            .iter()
            .map(|r| listing.records().iter().position(|l| l.id == r.id).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
