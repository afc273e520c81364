//! Splits an [`Index`] into listing pages: one page set for all posts and
//! one page set per tag. Pages are plain data; what they look like is up to
//! whatever consumes them.
//!
//! A page set lives under a base URL and directory. The first page is
//! `index.json`, the following ones are `1.json`, `2.json`, etc. The main
//! page set lives directly under the pages URL; each tag's page set lives
//! under `{pages_url}/tags/{tag}/`.

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{index::Index, post::Post, tag};

/// One post as it appears on a listing page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub slug: String,
    pub title: String,
    pub link: Url,
    pub published_at: DateTime<FixedOffset>,
    pub summary: String,
    pub tags: Vec<String>,
}

impl From<&Post> for Entry {
    fn from(post: &Post) -> Entry {
        Entry {
            slug: post.slug.clone(),
            title: post.title.clone(),
            link: post.url.clone(),
            published_at: post.published_at,
            summary: post.summary.clone(),
            tags: post.tags.iter().cloned().collect(),
        }
    }
}

/// A single listing page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// The tag whose posts the page lists, or `None` for the main listing.
    pub tag: Option<String>,

    /// The zero-based position of the page in its page set.
    pub number: usize,

    /// The number of pages in the page set.
    pub total_pages: usize,

    /// The posts on this page, in index order.
    pub entries: Vec<Entry>,

    /// The URL of this page.
    pub url: Url,

    /// The URL for the previous page, if any.
    pub prev: Option<Url>,

    /// The URL for the next page, if any.
    pub next: Option<Url>,

    /// Where the page goes, relative to the pages output directory.
    #[serde(skip)]
    pub file_path: PathBuf,
}

/// The pages URL and directory-relative path of a page set.
struct PageSet<'a> {
    tag: Option<&'a str>,
    url: Url,
    directory: PathBuf,
}

impl PageSet<'_> {
    fn file_name(number: usize) -> String {
        match number > 0 {
            false => String::from("index.json"),
            true => format!("{}.json", number),
        }
    }

    /// Converts a list of posts into pages of at most `page_size` posts each.
    /// An empty list still produces one (empty) page.
    fn to_pages(&self, posts: &[&Post], page_size: usize) -> Result<Vec<Page>> {
        let total_pages = match posts.len() % page_size {
            0 => (posts.len() / page_size).max(1),
            _ => posts.len() / page_size + 1,
        };

        let mut pages = Vec::with_capacity(total_pages);
        for i in 0..total_pages {
            let start = (i * page_size).min(posts.len());
            let end = (start + page_size).min(posts.len());
            pages.push(Page {
                tag: self.tag.map(str::to_owned),
                number: i,
                total_pages,
                entries: posts[start..end].iter().map(|&p| Entry::from(p)).collect(),
                url: self.url.join(&Self::file_name(i))?,
                prev: match i {
                    0 => None,
                    _ => Some(self.url.join(&Self::file_name(i - 1))?),
                },
                next: match i + 1 < total_pages {
                    false => None,
                    true => Some(self.url.join(&Self::file_name(i + 1))?),
                },
                file_path: self.directory.join(Self::file_name(i)),
            });
        }
        Ok(pages)
    }
}

/// Partitions [`Index::all`] into consecutive pages of at most `page_size`
/// posts, preserving order. `pages_url` should end in a trailing slash.
pub fn listing_pages(index: &Index, page_size: usize, pages_url: &Url) -> Result<Vec<Page>> {
    if page_size == 0 {
        return Err(Error::InvalidPageSize);
    }
    let posts: Vec<&Post> = index.all().iter().collect();
    PageSet {
        tag: None,
        url: pages_url.clone(),
        directory: PathBuf::new(),
    }
    .to_pages(&posts, page_size)
}

/// Produces one page set per tag in [`Index::tags`], paginated exactly like
/// [`listing_pages`]. Page sets are returned in tag order. Fails if two tags
/// would share a directory (e.g., `C++` and `C` both slugify to `c`).
pub fn tag_pages(index: &Index, page_size: usize, pages_url: &Url) -> Result<Vec<Vec<Page>>> {
    if page_size == 0 {
        return Err(Error::InvalidPageSize);
    }

    let mut owners: BTreeMap<String, &str> = BTreeMap::new();
    for t in index.tags() {
        if let Some(other) = owners.insert(tag::path_segment(t), t) {
            return Err(Error::TagPathCollision {
                segment: tag::path_segment(t),
                first: other.to_owned(),
                second: t.to_owned(),
            });
        }
    }

    index
        .tags()
        .map(|t| {
            PageSet {
                tag: Some(t),
                url: tag_url(pages_url, t)?,
                directory: PathBuf::from("tags").join(tag::path_segment(t)),
            }
            .to_pages(&index.by_tag(t), page_size)
        })
        .collect()
}

/// The URL of the first page of a tag's page set.
pub fn tag_index_url(pages_url: &Url, tag: &str) -> Result<Url> {
    Ok(tag_url(pages_url, tag)?.join(&PageSet::file_name(0))?)
}

fn tag_url(pages_url: &Url, tag: &str) -> Result<Url> {
    // NOTE: the trailing slash matters; without it `Url::join` would treat
    // the tag segment as a file name and replace it.
    Ok(pages_url.join(&format!("tags/{}/", tag::path_segment(tag)))?)
}

/// The number of entries across a page set.
pub fn entry_count(pages: &[Page]) -> usize {
    pages.iter().map(|p| p.entries.len()).sum()
}

/// Represents the result of a pagination operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to paginate.
#[derive(Debug)]
pub enum Error {
    /// Returned when asked for pages of zero posts.
    InvalidPageSize,

    /// Returned when a page URL can't be built.
    UrlParse(url::ParseError),

    /// Returned when two distinct tags map to the same directory.
    TagPathCollision {
        segment: String,
        first: String,
        second: String,
    },
}

impl std::fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::InvalidPageSize => write!(f, "page size must be greater than zero"),
            Error::UrlParse(err) => err.fmt(f),
            Error::TagPathCollision {
                segment,
                first,
                second,
            } => write!(
                f,
                "tags `{}` and `{}` would both be written to `tags/{}/`",
                first, second, segment
            ),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidPageSize => None,
            Error::UrlParse(err) => Some(err),
            Error::TagPathCollision { .. } => None,
        }
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator when joining page URLs.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}
