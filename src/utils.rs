//! Utility functions for naming downloaded files and folders.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Characters that are not allowed in file names on common filesystems.
static ILLEGAL_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[/<>:"\\|?*]"#).unwrap());

/// Zero pads the integer part of a chapter or volume number to three digits.
///
/// `"5"` becomes `"005"` and `"10.5"` becomes `"010.5"`.
pub fn zpad(number: &str) -> String {
    match number.split_once('.') {
        Some((whole, fraction)) => format!("{:0>3}.{}", whole, fraction),
        None => format!("{:0>3}", number),
    }
}

/// Replaces characters that are illegal in file names with `-`.
pub fn sanitize(name: &str) -> String {
    ILLEGAL_CHARS.replace_all(name.trim(), "-").into_owned()
}

/// Decodes HTML entities in a catalog title and makes it path safe.
pub fn clean_title(title: &str) -> String {
    let decoded = html_escape::decode_html_entities(title);
    let cleaned = sanitize(&decoded);
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// Returns `dir/<start><end>`, or the first `dir/<start>-<n><end>` that
/// does not exist yet.
pub fn uniquify(dir: &Path, start: &str, end: &str) -> PathBuf {
    let mut candidate = dir.join(format!("{}{}", start, end));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}-{}{}", start, counter, end));
        counter += 1;
    }
    candidate
}

/// Extracts the file extension (with the dot) from a page URL.
pub fn page_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();

    match file.rfind('.') {
        Some(dot) if dot + 1 < file.len() => file[dot..].to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zpad() {
        assert_eq!(zpad("5"), "005");
        assert_eq!(zpad("10.5"), "010.5");
        assert_eq!(zpad("1234"), "1234");
        assert_eq!(zpad("0"), "000");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("What? Who: me/you"), "What- Who- me-you");
        assert_eq!(sanitize(r#"a\b|c*d"e<f>"#), "a-b-c-d-e-f-");
        assert_eq!(sanitize("  plain  "), "plain");
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(clean_title("Re:Zero"), "Re-Zero");
        assert_eq!(clean_title("  "), "untitled");
    }

    #[test]
    fn test_uniquify() {
        let dir = tempfile::tempdir().unwrap();

        let first = uniquify(dir.path(), "c001", " [Group]");
        assert_eq!(first, dir.path().join("c001 [Group]"));
        std::fs::create_dir(&first).unwrap();

        let second = uniquify(dir.path(), "c001", " [Group]");
        assert_eq!(second, dir.path().join("c001-1 [Group]"));
        std::fs::create_dir(&second).unwrap();

        let third = uniquify(dir.path(), "c001", " [Group]");
        assert_eq!(third, dir.path().join("c001-2 [Group]"));
    }

    #[test]
    fn test_page_extension() {
        assert_eq!(page_extension("https://x.org/data/h/1-abc.png"), ".png");
        assert_eq!(page_extension("https://x.org/data/h/2-abc.jpg?token=1"), ".jpg");
        assert_eq!(page_extension("https://x.org/data/h/noext"), "");
    }
}
