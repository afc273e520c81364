//! Tag normalization and the [`TagSummary`] type written to `tags.json`.

use serde::Serialize;
use url::Url;

/// Normalizes a raw tag as written by an author: surrounding whitespace is
/// trimmed and the result is lower-cased so e.g., `Rust` and ` rust` resolve to
/// the same tag. Returns `None` for tags that are empty after trimming.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    match trimmed.is_empty() {
        true => None,
        false => Some(trimmed.to_lowercase()),
    }
}

/// The path segment under which a tag's pages live. Tags are free text, so
/// this slugifies them (`c++` and `C` both become `c`; see
/// [`crate::page::Error::TagPathCollision`]). Tags made only of punctuation
/// have no segment at all and are rejected by [`crate::parser`].
pub fn path_segment(tag: &str) -> String {
    slug::slugify(tag)
}

/// One entry of the tag summary: a tag, how many posts carry it, and where
/// its first page lives.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TagSummary {
    pub name: String,
    pub count: usize,
    pub url: Url,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(Some("rust".to_owned()), normalize("  Rust\t"));
        assert_eq!(Some("static sites".to_owned()), normalize("Static Sites"));
        assert_eq!(None, normalize("   "));
    }

    #[test]
    fn test_path_segment() {
        assert_eq!("static-sites", path_segment("static sites"));
        assert_eq!("c", path_segment("c++"));
    }
}
