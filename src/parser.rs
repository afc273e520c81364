//! Defines the [`Parser`] and its [`Error`] type: the logic for turning the
//! [`Record`]s found by [`crate::load`] into typed [`Post`]s. Parsing is
//! strict: a post is either complete or it's an error naming the offending
//! file.

use std::{
    collections::BTreeSet,
    fmt,
    path::{Component, Path, PathBuf},
    thread,
    time::Duration,
};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::{
    load::Record,
    markdown,
    post::{self, Post},
    tag,
};

/// Parses [`Post`] objects from [`Record`]s.
#[derive(Clone, Debug)]
pub struct Parser {
    /// `posts_url` is the base URL for post pages. It's used to build post
    /// permalinks (i.e., the URL for a post is `{posts_url}/{slug}.html`).
    posts_url: Url,
}

impl Parser {
    /// Constructs a new parser. `posts_url` should end in a trailing slash.
    pub fn new(posts_url: Url) -> Parser {
        Parser { posts_url }
    }

    /// Parses a single [`Post`] from a [`Record`]. Errors are annotated with
    /// the record's relative path.
    pub fn parse(&self, record: &Record) -> Result<Post> {
        match self._parse(record) {
            Ok(p) => Ok(p),
            Err(e) => Err(Error::Annotated(record.relative_path.clone(), Box::new(e))),
        }
    }

    fn _parse(&self, record: &Record) -> Result<Post> {
        fn frontmatter_indices(input: &str) -> Result<(usize, usize, usize)> {
            const FENCE: &str = "---";
            const CLOSING_FENCE: &str = "\n---";
            if !input.starts_with(FENCE) {
                return Err(Error::FrontmatterMissingStartFence);
            }
            match input[FENCE.len()..].find(CLOSING_FENCE) {
                None => Err(Error::FrontmatterMissingEndFence),
                Some(offset) => Ok((
                    FENCE.len(),                                // yaml_start
                    FENCE.len() + offset,                       // yaml_stop
                    FENCE.len() + offset + CLOSING_FENCE.len(), // body_start
                )),
            }
        }

        let input = record.contents.trim_start_matches('\u{feff}');
        let (yaml_start, yaml_stop, body_start) = frontmatter_indices(input)?;
        let yaml = &input[yaml_start..yaml_stop];
        let frontmatter: Frontmatter = match yaml.trim().is_empty() {
            true => Frontmatter::default(),
            false => serde_yaml::from_str(yaml)?,
        };

        let title = match frontmatter.title {
            Some(title) if !title.trim().is_empty() => title.trim().to_owned(),
            _ => return Err(Error::MissingField("title")),
        };
        let published_at = match frontmatter.date {
            Some(date) if !date.trim().is_empty() => {
                parse_date(&date).ok_or(Error::InvalidDate(date))?
            }
            _ => return Err(Error::MissingField("date")),
        };
        let updated_at = match frontmatter.lastmod {
            Some(lastmod) => Some(parse_date(&lastmod).ok_or(Error::InvalidDate(lastmod))?),
            None => None,
        };

        let mut tags = BTreeSet::new();
        for raw in frontmatter.tags.map(TagList::into_vec).unwrap_or_default() {
            if let Some(t) = tag::normalize(&raw) {
                if tag::path_segment(&t).is_empty() {
                    return Err(Error::InvalidTag(raw));
                }
                tags.insert(t);
            }
        }

        let slug = slug_for_path(&record.relative_path)
            .ok_or_else(|| Error::InvalidFileName(record.relative_path.clone()))?;
        let body = markdown::to_html(&input[body_start..]);
        // Summaries are HTML either way; a hand-written one is markdown.
        let summary = match frontmatter.summary {
            Some(summary) if !summary.trim().is_empty() => {
                markdown::to_html(summary.trim()).trim_end().to_owned()
            }
            _ => post::summarize(&body).0.to_owned(),
        };

        Ok(Post {
            url: self.posts_url.join(&format!("{}.html", slug))?,
            slug,
            source_path: record.relative_path.clone(),
            title,
            summary,
            body,
            tags,
            published_at,
            updated_at,
            draft: frontmatter.draft.unwrap_or(false),
        })
    }

    /// Parses every record into a [`Post`]. Each post file must be structured
    /// as follows:
    ///
    /// 1. Initial frontmatter fence (`---`)
    /// 2. YAML frontmatter with fields `Title`, `Date`, and optionally `Tags`,
    ///    `Summary`, `Draft` and `Lastmod` (lower-case keys work too)
    /// 3. Terminal frontmatter fence (`---`)
    /// 4. Post body
    ///
    /// For example:
    ///
    /// ```md
    /// ---
    /// Title: Hello, world!
    /// Date: 2021-04-16
    /// Tags: [greet]
    /// ---
    /// # Hello
    ///
    /// World
    /// ```
    ///
    /// With `threads > 1` the records are spread across a pool of worker
    /// threads and each result must arrive within `timeout` of the previous
    /// one. The returned posts are in the same order as `records`, and if
    /// several records fail, the error for the earliest one is returned.
    pub fn parse_posts(
        &self,
        records: Vec<Record>,
        threads: usize,
        timeout: Duration,
    ) -> Result<Vec<Post>> {
        if threads < 2 || records.len() < 2 {
            return records.iter().map(|r| self.parse(r)).collect();
        }
        let parser = self.clone();
        self.run_pool(records, threads, timeout, move |r| parser.parse(r))
    }

    fn run_pool<F>(
        &self,
        records: Vec<Record>,
        threads: usize,
        timeout: Duration,
        parse: F,
    ) -> Result<Vec<Post>>
    where
        F: Fn(&Record) -> Result<Post> + Clone + Send + 'static,
    {
        let total = records.len();
        let (job_tx, job_rx) = unbounded::<(usize, Record)>();
        let (result_tx, result_rx) = unbounded::<(usize, Result<Post>)>();

        for _ in 0..threads.min(total) {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let parse = parse.clone();
            thread::spawn(move || {
                for (i, record) in job_rx {
                    if result_tx.send((i, parse(&record))).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for job in records.into_iter().enumerate() {
            job_tx.send(job).map_err(|_| Error::WorkerDisconnected)?;
        }
        drop(job_tx);

        let mut results = Vec::with_capacity(total);
        while results.len() < total {
            match result_rx.recv_timeout(timeout) {
                Ok(result) => results.push(result),
                Err(RecvTimeoutError::Timeout) => return Err(Error::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(Error::WorkerDisconnected),
            }
        }
        debug!(posts = total, threads, "parsed posts");

        results.sort_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

/// Derives a post's slug from its path relative to the content root: the
/// extension is dropped, a trailing `index` component (a post bundle like
/// `foo/index.md`) is dropped, every remaining component is slugified and
/// the components are joined with `/`. For example, `2024/My Post.md` becomes
/// `2024/my-post`. Returns `None` if any component slugifies to nothing.
pub fn slug_for_path(relative_path: &Path) -> Option<String> {
    let mut components = Vec::new();
    for component in relative_path.with_extension("").components() {
        if let Component::Normal(c) = component {
            components.push(slug::slugify(c.to_str()?));
        }
    }
    if components.len() > 1 && components.last().map(String::as_str) == Some("index") {
        components.pop();
    }
    if components.is_empty() || components.iter().any(String::is_empty) {
        return None;
    }
    Some(components.join("/"))
}

/// Parses a front-matter date. Accepts RFC 3339 (`2024-06-01T10:00:00+02:00`),
/// `2024-06-01 10:00:00` and a bare `2024-06-01`; the latter two are taken as
/// UTC.
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    fn utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
        Utc.from_utc_datetime(&naive).into()
    }

    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date);
    }
    for format in &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(utc(naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(utc)
}

#[derive(Deserialize, Default)]
struct Frontmatter {
    /// The title of the post.
    #[serde(default, rename = "Title", alias = "title")]
    title: Option<String>,

    /// The publish date of the post.
    #[serde(default, rename = "Date", alias = "date")]
    date: Option<String>,

    /// The date the post was last modified.
    #[serde(default, rename = "Lastmod", alias = "lastmod")]
    lastmod: Option<String>,

    /// The tags associated with the post.
    #[serde(default, rename = "Tags", alias = "tags")]
    tags: Option<TagList>,

    /// A hand-written summary, used instead of the derived one.
    #[serde(default, rename = "Summary", alias = "summary")]
    summary: Option<String>,

    #[serde(default, rename = "Draft", alias = "draft")]
    draft: Option<bool>,
}

/// Tags may be written as a list or, for a single tag, a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagList {
    One(String),
    Many(Vec<String>),
}

impl TagList {
    fn into_vec(self) -> Vec<String> {
        match self {
            TagList::One(tag) => vec![tag],
            TagList::Many(tags) => tags,
        }
    }
}

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Post`] object. Every variant signals an
/// authoring problem (or a stuck worker) and is fatal to the build.
#[derive(Debug)]
pub enum Error {
    /// Returned when a post source file is missing its starting frontmatter
    /// fence (`---`).
    FrontmatterMissingStartFence,

    /// Returned when a post source file is missing its terminal frontmatter
    /// fence (`---` i.e., the starting fence was found but the ending one was
    /// missing).
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the frontmatter as YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when a mandatory frontmatter field is missing or blank.
    MissingField(&'static str),

    /// Returned when a date field can't be parsed.
    InvalidDate(String),

    /// Returned when a tag has no usable path segment (e.g., `!!!`).
    InvalidTag(String),

    /// Returned when no slug can be derived from a source path.
    InvalidFileName(PathBuf),

    /// Returned when there is a problem building the post's URL.
    UrlParse(url::ParseError),

    /// Returned when no post finished parsing within the per-file timeout.
    Timeout(Duration),

    /// Returned when the parsing workers went away before finishing.
    WorkerDisconnected,

    /// An error annotated with the path of the post it concerns.
    Annotated(PathBuf, Box<Error>),
}

impl Error {
    /// The path of the offending post, if known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::Annotated(path, _) => Some(path),
            _ => None,
        }
    }

    /// The underlying error, without any annotation.
    pub fn root(&self) -> &Error {
        match self {
            Error::Annotated(_, err) => err.root(),
            _ => self,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingStartFence => {
                write!(f, "Post must begin with `---`")
            }
            Error::FrontmatterMissingEndFence => {
                write!(f, "Missing closing `---`")
            }
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::MissingField(field) => {
                write!(f, "missing mandatory field `{}`", field)
            }
            Error::InvalidDate(value) => write!(f, "invalid date `{}`", value),
            Error::InvalidTag(tag) => {
                write!(f, "tag `{}` must contain at least one letter or digit", tag)
            }
            Error::InvalidFileName(path) => {
                write!(f, "can't derive a slug from file name {:?}", path)
            }
            Error::UrlParse(err) => err.fmt(f),
            Error::Timeout(timeout) => {
                write!(f, "timed out after {:?} waiting for a post to parse", timeout)
            }
            Error::WorkerDisconnected => write!(f, "post parsing workers exited early"),
            Error::Annotated(path, err) => {
                write!(f, "parsing post `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DeserializeYaml(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing and joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}
