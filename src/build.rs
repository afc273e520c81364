//! Exports the [`build_site`] function which stitches together the high-level
//! steps of a build: loading post files ([`crate::load`]), parsing them
//! ([`crate::parser`]), indexing them ([`crate::index`]), and deriving the
//! output artifacts from the index: listing and tag pages ([`crate::page`]),
//! the Atom feed ([`crate::feed`]) and the search index ([`crate::search`]).
//!
//! Nothing is written until every artifact has been derived, so a failed
//! build leaves the previous output untouched.

use crate::config::Config;
use crate::feed::{self, FeedConfig, FeedReport};
use crate::index::{self, Index};
use crate::load::{self, Loader};
use crate::page::{self, Page};
use crate::parser::{self, Parser};
use crate::search::{self, Document};
use crate::tag::TagSummary;
use crate::util::rmdir;
use crate::write::{self, Writer};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::info;

/// Summarizes a build. `published` always equals `listing_entries`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BuildReport {
    /// The number of post files found under the content directory.
    pub discovered: usize,

    /// The number of other files found there; `discovered + skipped` is
    /// every file in the tree.
    pub skipped: usize,
    pub published: usize,
    pub drafts: usize,
    pub listing_pages: usize,
    pub listing_entries: usize,
    pub tags: usize,
    pub tag_pages: usize,
    pub feed_entries: usize,
    pub feed_rejected: usize,
    pub search_documents: usize,
}

/// The posts of a site, loaded, parsed and indexed.
pub struct Collected {
    pub index: Index,
    pub discovered: usize,

    /// The number of files under the content directory that aren't posts.
    pub skipped: usize,
}

/// Everything derived from an [`Index`], ready to be written.
struct Artifacts {
    listing: Vec<Page>,
    tags: Vec<Vec<Page>>,
    tag_summaries: Vec<TagSummary>,
    feed: Vec<u8>,
    feed_report: FeedReport,
    documents: Vec<Document>,
}

/// Loads, parses and indexes every post under the configured content
/// directory.
pub fn collect(config: &Config) -> Result<Collected> {
    let content = Loader::new(&config.content_extensions, config.read_retries)
        .load(&config.content_directory)?;
    let discovered = content.records.len();
    let skipped = content.skipped.len();
    info!(
        directory = %config.content_directory.display(),
        files = discovered,
        skipped,
        "loaded posts"
    );

    let posts = Parser::new(config.posts_url.clone()).parse_posts(
        content.records,
        config.threads,
        config.file_timeout,
    )?;
    let index = Index::build(posts)?;
    info!(
        published = index.count(),
        drafts = discovered - index.count(),
        "indexed posts"
    );

    Ok(Collected {
        index,
        discovered,
        skipped,
    })
}

/// Runs the whole pipeline without writing anything. Useful for validating
/// content before publishing.
pub fn check_site(config: &Config) -> Result<BuildReport> {
    let collected = collect(config)?;
    let artifacts = derive(config, &collected.index)?;
    Ok(report(&collected, &artifacts))
}

/// Builds the site from a [`Config`] object and writes the artifacts to the
/// configured output directory:
///
/// * `pages/index.json`, `pages/1.json`, ...: the listing pages
/// * `pages/tags/{tag}/index.json`, ...: the pages for each tag
/// * `tags.json`: every tag with its post count
/// * `feed.atom`: the Atom feed
/// * `search.json`: the search index
pub fn build_site(config: &Config) -> Result<BuildReport> {
    let collected = collect(config)?;
    let artifacts = derive(config, &collected.index)?;

    // Blow away the old pages so pages for tags that no longer exist don't
    // linger.
    rmdir(&config.pages_output_directory).map_err(|err| Error::Clean {
        path: config.pages_output_directory.clone(),
        err,
    })?;
    create_dir(&config.output_directory)?;

    let writer = Writer {
        pages_directory: &config.pages_output_directory,
    };
    writer.write_pages(artifacts.listing.iter().chain(artifacts.tags.iter().flatten()))?;
    write::write_tags(&config.tags_file, &artifacts.tag_summaries)?;
    std::fs::write(&config.feed_file, &artifacts.feed).map_err(|err| Error::Io {
        path: config.feed_file.clone(),
        err,
    })?;
    search::write_search_index(&config.search_file, &artifacts.documents)?;

    let report = report(&collected, &artifacts);
    info!(
        output = %config.output_directory.display(),
        published = report.published,
        skipped = report.skipped,
        listing_pages = report.listing_pages,
        tags = report.tags,
        feed_entries = report.feed_entries,
        feed_rejected = report.feed_rejected,
        "built site"
    );
    Ok(report)
}

/// Derives every artifact from the index. The page, feed and search builders
/// only read the index, so with more than one thread they run concurrently.
fn derive(config: &Config, index: &Index) -> Result<Artifacts> {
    let build_pages = || -> page::Result<(Vec<Page>, Vec<Vec<Page>>, Vec<TagSummary>)> {
        let listing = page::listing_pages(index, config.index_page_size, &config.pages_url)?;
        let tags = page::tag_pages(index, config.index_page_size, &config.pages_url)?;
        let summaries = index
            .tag_counts()
            .map(|(name, count)| {
                Ok(TagSummary {
                    name: name.to_owned(),
                    count,
                    url: page::tag_index_url(&config.pages_url, name)?,
                })
            })
            .collect::<page::Result<Vec<_>>>()?;
        Ok((listing, tags, summaries))
    };
    let build_feed = || -> feed::Result<(Vec<u8>, FeedReport)> {
        let mut out = Vec::new();
        let report = feed::write_feed(&feed_config(config), index, &mut out)?;
        Ok((out, report))
    };
    let build_search = || search::documents(index);

    let (pages, feed, documents) = match config.threads > 1 {
        false => (build_pages(), build_feed(), build_search()),
        true => thread::scope(|s| {
            let pages = s.spawn(build_pages);
            let feed = s.spawn(build_feed);
            let search = s.spawn(build_search);
            (join(pages), join(feed), join(search))
        }),
    };
    let (listing, tags, tag_summaries) = pages?;
    let (feed, feed_report) = feed?;

    let listing_entries = page::entry_count(&listing);
    if listing_entries != index.count() {
        return Err(Error::CountMismatch {
            expected: index.count(),
            found: listing_entries,
        });
    }

    Ok(Artifacts {
        listing,
        tags,
        tag_summaries,
        feed,
        feed_report,
        documents,
    })
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn feed_config(config: &Config) -> FeedConfig {
    FeedConfig {
        title: config.title.clone(),
        id: config.home_page.to_string(),
        subtitle: config.description.clone(),
        author: config.author.clone(),
        home_page: config.home_page.clone(),
        feed_url: config.feed_url.clone(),
        max_entries: config.feed_length,
    }
}

fn report(collected: &Collected, artifacts: &Artifacts) -> BuildReport {
    BuildReport {
        discovered: collected.discovered,
        skipped: collected.skipped,
        published: collected.index.count(),
        drafts: collected.discovered - collected.index.count(),
        listing_pages: artifacts.listing.len(),
        listing_entries: page::entry_count(&artifacts.listing),
        tags: artifacts.tags.len(),
        tag_pages: artifacts.tags.iter().map(Vec::len).sum(),
        feed_entries: artifacts.feed_report.entries,
        feed_rejected: artifacts.feed_report.rejected.len(),
        search_documents: artifacts.documents.len(),
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|err| Error::Io {
        path: dir.to_owned(),
        err,
    })
}

/// Represents the result of a build.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can occur while loading,
/// parsing, indexing, deriving or writing.
#[derive(Debug)]
pub enum Error {
    /// Returned when the content tree can't be loaded.
    Load(load::Error),

    /// Returned for malformed posts.
    Parse(parser::Error),

    /// Returned when the posts can't be indexed (duplicate slugs).
    Index(index::Error),

    /// Returned when the posts can't be paginated.
    Page(page::Error),

    /// Returned for errors writing pages and other JSON documents.
    Write(write::Error),

    /// Returned for errors writing the feed.
    Feed(feed::Error),

    /// Returned when the listing pages don't hold exactly the published
    /// posts.
    CountMismatch { expected: usize, found: usize },

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for other I/O errors.
    Io { path: PathBuf, err: std::io::Error },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Load(err) => err.fmt(f),
            Error::Parse(err) => err.fmt(f),
            Error::Index(err) => err.fmt(f),
            Error::Page(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::CountMismatch { expected, found } => write!(
                f,
                "listing pages hold {} posts but {} were published",
                found, expected
            ),
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::Io { path, err } => write!(f, "'{}': {}", path.display(), err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Load(err) => Some(err),
            Error::Parse(err) => Some(err),
            Error::Index(err) => Some(err),
            Error::Page(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::CountMismatch { .. } => None,
            Error::Clean { path: _, err } => Some(err),
            Error::Io { path: _, err } => Some(err),
        }
    }
}

impl From<load::Error> for Error {
    /// Converts [`load::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: load::Error) -> Error {
        Error::Load(err)
    }
}

impl From<parser::Error> for Error {
    /// Converts [`parser::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: parser::Error) -> Error {
        Error::Parse(err)
    }
}

impl From<index::Error> for Error {
    /// Converts [`index::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: index::Error) -> Error {
        Error::Index(err)
    }
}

impl From<page::Error> for Error {
    /// Converts [`page::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: page::Error) -> Error {
        Error::Page(err)
    }
}

impl From<write::Error> for Error {
    /// Converts [`write::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: write::Error) -> Error {
        Error::Write(err)
    }
}

impl From<feed::Error> for Error {
    /// Converts [`feed::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: feed::Error) -> Error {
        Error::Feed(err)
    }
}
