//! Defines the [`Index`], the ordered, read-only collection of published
//! posts that every output artifact is derived from.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::PathBuf,
};

use tracing::debug;

use crate::{post::Post, tag};

/// All published (non-draft) posts, most recent first, plus a per-tag view.
/// An [`Index`] can't be modified after [`Index::build`].
#[derive(Debug)]
pub struct Index {
    posts: Vec<Post>,

    /// Maps each tag to the positions (into `posts`) of the posts carrying it,
    /// in ascending order so tag views keep the main order.
    tags: BTreeMap<String, Vec<usize>>,
}

impl Index {
    /// Builds an index from parsed posts. Drafts are dropped; the remaining
    /// posts are sorted by [`Post::newest_first`]. Fails if two published
    /// posts share a slug.
    pub fn build(posts: Vec<Post>) -> Result<Index> {
        let mut published: Vec<Post> = Vec::with_capacity(posts.len());
        for post in posts {
            match post.draft {
                true => debug!(path = %post.source_path.display(), "skipping draft"),
                false => published.push(post),
            }
        }

        let mut seen: HashMap<&str, &Post> = HashMap::with_capacity(published.len());
        for post in published.iter() {
            if let Some(first) = seen.insert(&post.slug, post) {
                let (first, second) = ordered_paths(first, post);
                return Err(Error::DuplicateSlug {
                    slug: post.slug.clone(),
                    first,
                    second,
                });
            }
        }

        published.sort_by(Post::newest_first);

        let mut tags: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, post) in published.iter().enumerate() {
            for tag in post.tags.iter() {
                tags.entry(tag.clone()).or_insert_with(Vec::new).push(i);
            }
        }

        Ok(Index {
            posts: published,
            tags,
        })
    }

    /// The number of published posts.
    pub fn count(&self) -> usize {
        self.posts.len()
    }

    /// Every published post, most recent first.
    pub fn all(&self) -> &[Post] {
        &self.posts
    }

    /// The posts carrying `tag`, in the same order as [`Index::all`]. `tag`
    /// is normalized first, so `Rust` finds posts tagged `rust`. Empty for
    /// unknown tags.
    pub fn by_tag(&self, tag: &str) -> Vec<&Post> {
        match tag::normalize(tag).and_then(|t| self.tags.get(&t)) {
            Some(positions) => positions.iter().map(|&i| &self.posts[i]).collect(),
            None => Vec::new(),
        }
    }

    /// Every tag carried by at least one published post, in lexical order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    /// Every tag with the number of published posts carrying it.
    pub fn tag_counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.tags
            .iter()
            .map(|(tag, positions)| (tag.as_str(), positions.len()))
    }
}

// Orders the two colliding paths so the error message doesn't depend on
// input order.
fn ordered_paths(a: &Post, b: &Post) -> (PathBuf, PathBuf) {
    match a.source_path <= b.source_path {
        true => (a.source_path.clone(), b.source_path.clone()),
        false => (b.source_path.clone(), a.source_path.clone()),
    }
}

/// Represents the result of building an [`Index`].
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to build an [`Index`].
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Returned when two published posts resolve to the same slug. Both
    /// source paths are reported.
    DuplicateSlug {
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::DuplicateSlug {
                slug,
                first,
                second,
            } => write!(
                f,
                "posts `{}` and `{}` both resolve to slug `{}`",
                first.display(),
                second.display(),
                slug
            ),
        }
    }
}

impl std::error::Error for Error {}
