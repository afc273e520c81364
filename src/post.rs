//! Defines the [`Post`] type, the typed form of one source file.

use std::{cmp::Ordering, collections::BTreeSet, path::PathBuf};

use chrono::{DateTime, FixedOffset};
use url::Url;

/// The marker separating a post's summary from the rest of its body.
pub const FOLD_TAG: &str = "<!-- more -->";

/// Represents a single post. Posts are only ever produced by
/// [`crate::parser::Parser`] and are never modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    /// The post's unique identifier, derived from its source path (see
    /// [`crate::parser::slug_for_path`]).
    pub slug: String,

    /// The path of the source file relative to the content root.
    pub source_path: PathBuf,

    /// The permanent URL of the post (`{posts_url}/{slug}.html`).
    pub url: Url,

    /// The title of the post.
    pub title: String,

    /// The post's summary as HTML. See [`summarize`].
    pub summary: String,

    /// The post's body, rendered to HTML.
    pub body: String,

    /// The normalized tags of the post.
    pub tags: BTreeSet<String>,

    /// When the post was published.
    pub published_at: DateTime<FixedOffset>,

    /// When the post was last modified, if the author said so.
    pub updated_at: Option<DateTime<FixedOffset>>,

    /// Drafts are left out of every derived artifact.
    pub draft: bool,
}

impl Post {
    /// The most recent of the post's publish and modification dates.
    pub fn updated(&self) -> DateTime<FixedOffset> {
        match self.updated_at {
            Some(updated) if updated > self.published_at => updated,
            _ => self.published_at,
        }
    }

    /// Orders posts most recent first; posts published at the same instant
    /// are ordered by slug so the order is total.
    pub fn newest_first(a: &Post, b: &Post) -> Ordering {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.slug.cmp(&b.slug))
    }
}

/// Derives a summary from rendered HTML `body`: everything above the
/// [`FOLD_TAG`] if there is one, otherwise the first paragraph. The second
/// return value reports whether the summary is shorter than the body.
pub fn summarize(body: &str) -> (&str, bool) {
    if let Some(i) = body.find(FOLD_TAG) {
        return (body[..i].trim_end(), true);
    }

    const PARAGRAPH_END: &str = "</p>";
    match body.find(PARAGRAPH_END) {
        Some(i) => {
            let end = i + PARAGRAPH_END.len();
            (&body[..end], !body[end..].trim().is_empty())
        }
        None => (body.trim_end(), false),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_summarize_fold() {
        let body = "<p>intro</p>\n<!-- more -->\n<p>rest</p>";
        assert_eq!(("<p>intro</p>", true), summarize(body));
    }

    #[test]
    fn test_summarize_first_paragraph() {
        let body = "<p>one</p>\n<p>two</p>\n";
        assert_eq!(("<p>one</p>", true), summarize(body));
    }

    #[test]
    fn test_summarize_single_paragraph() {
        assert_eq!(("<p>only</p>", false), summarize("<p>only</p>\n"));
    }

    #[test]
    fn test_summarize_no_paragraph() {
        assert_eq!(("<h1>x</h1>", false), summarize("<h1>x</h1>\n"));
    }
}
