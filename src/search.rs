//! Builds the search index: one slim [`Document`] per published post, for a
//! client-side search widget. Post bodies are deliberately left out to keep
//! the index small.

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{index::Index, post::Post, write};

/// The searchable fields of one post.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub slug: String,
    pub title: String,
    pub tags: Vec<String>,
    pub summary: String,
    pub link: Url,
    pub published_at: DateTime<FixedOffset>,
}

impl From<&Post> for Document {
    fn from(post: &Post) -> Document {
        Document {
            slug: post.slug.clone(),
            title: post.title.clone(),
            tags: post.tags.iter().cloned().collect(),
            summary: post.summary.clone(),
            link: post.url.clone(),
            published_at: post.published_at,
        }
    }
}

/// One [`Document`] per post in [`Index::all`] order.
pub fn documents(index: &Index) -> Vec<Document> {
    index.all().iter().map(Document::from).collect()
}

/// Writes `documents` as a single JSON array to `path`.
pub fn write_search_index(path: &Path, documents: &[Document]) -> write::Result<()> {
    write::write_json(path, documents)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::index::test::{draft, post};
    use tempfile::TempDir;

    #[test]
    fn test_documents() {
        let index = Index::build(vec![
            post("old", "2023-01-01", &["rust"]),
            draft("hidden", "2024-01-01", &[]),
            post("new", "2024-06-01", &[]),
        ])
        .unwrap();

        let documents = documents(&index);
        assert_eq!(
            vec!["new", "old"],
            documents.iter().map(|d| d.slug.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(vec!["rust".to_owned()], documents[1].tags);
        assert_eq!("OLD", documents[1].title);
    }

    #[test]
    fn test_write_search_index_omits_body() -> write::Result<()> {
        let dir = TempDir::new().unwrap();
        let index = Index::build(vec![post("only", "2024-01-01", &[])]).unwrap();
        let path = dir.path().join("search.json");

        write_search_index(&path, &documents(&index))?;

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(!json.contains("\"body\""));
        assert!(!json.contains("<p>more</p>"));
        let parsed: Vec<Document> = serde_json::from_str(&json).unwrap();
        assert_eq!(documents(&index), parsed);
        Ok(())
    }
}
