//! Support for creating Atom feeds from an [`Index`].

use crate::config::Author;
use crate::index::Index;
use crate::post::Post;
use atom_syndication::{Category, Entry, Error as AtomError, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;
use url::Url;

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub id: String,
    pub subtitle: Option<String>,
    pub author: Option<Author>,
    pub home_page: Url,

    /// Where the feed itself will be published; advertised as the feed's
    /// `self` link.
    pub feed_url: Url,

    /// The maximum number of entries in the feed.
    pub max_entries: usize,
}

/// What went into a feed: how many entries made it and which posts were
/// left out because they couldn't be encoded.
#[derive(Debug, Default)]
pub struct FeedReport {
    pub entries: usize,
    pub rejected: Vec<EncodingError>,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and the most
/// recent posts of an [`Index`] and writes the result to a
/// [`std::io::Write`]. Posts that can't be encoded are left out (and logged);
/// they don't fail the feed.
pub fn write_feed<W: Write>(config: &FeedConfig, index: &Index, w: W) -> Result<FeedReport> {
    let (feed, report) = feed(config, index)?;
    feed.write_to(w)?;
    Ok(report)
}

/// Builds the feed from the first `config.max_entries` posts of
/// [`Index::all`]. Fails if the feed's own text (title, subtitle or author)
/// can't be encoded.
pub fn feed(config: &FeedConfig, index: &Index) -> Result<(Feed, FeedReport)> {
    check_config(config)?;

    let mut report = FeedReport::default();
    let mut entries: Vec<Entry> = Vec::with_capacity(config.max_entries.min(index.count()));

    for post in index.all().iter().take(config.max_entries) {
        match check_encodable(post) {
            Ok(()) => entries.push(feed_entry(config, post)),
            Err(err) => {
                warn!(slug = %err.slug, "leaving post out of the feed: {}", err);
                report.rejected.push(err);
            }
        }
    }
    report.entries = entries.len();

    // The newest entry dates the feed so rebuilding unchanged content yields
    // an identical feed.
    let updated: DateTime<FixedOffset> = entries
        .iter()
        .map(|e| *e.updated())
        .max()
        .unwrap_or_else(|| Utc::now().into());

    let mut feed = Feed::default();
    feed.set_title(config.title.as_str());
    feed.set_id(config.id.as_str());
    feed.set_subtitle(config.subtitle.as_ref().map(|s| Text::plain(s.as_str())));
    feed.set_updated(updated);
    feed.set_authors(author_to_people(config.author.as_ref()));
    feed.set_links(vec![
        link(config.home_page.as_str(), "alternate"),
        link(config.feed_url.as_str(), "self"),
    ]);
    feed.set_entries(entries);
    Ok((feed, report))
}

fn feed_entry(config: &FeedConfig, post: &Post) -> Entry {
    let mut entry = Entry::default();
    entry.set_id(post.url.as_str());
    entry.set_title(post.title.as_str());
    entry.set_updated(post.updated());
    entry.set_published(Some(post.published_at));
    entry.set_authors(author_to_people(config.author.as_ref()));
    entry.set_links(vec![link(post.url.as_str(), "alternate")]);
    entry.set_summary(Some(Text::html(post.summary.as_str())));
    entry.set_categories(
        post.tags
            .iter()
            .map(|t| {
                let mut category = Category::default();
                category.set_term(t.as_str());
                category
            })
            .collect::<Vec<_>>(),
    );
    entry
}

fn link(href: &str, rel: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel(rel);
    link
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name.as_str());
            person.set_email(author.email.clone());
            vec![person]
        }
        None => Vec::new(),
    }
}

/// Checks that every text field of a post, tags included, can be carried
/// by an XML document.
fn check_encodable(post: &Post) -> std::result::Result<(), EncodingError> {
    let fields = [("title", &post.title), ("summary", &post.summary)];
    let tags = post.tags.iter().map(|t| ("tags", t));
    for (field, value) in fields.iter().copied().chain(tags) {
        if let Some(character) = find_invalid(value) {
            return Err(EncodingError {
                slug: post.slug.clone(),
                path: post.source_path.clone(),
                field,
                character,
            });
        }
    }
    Ok(())
}

fn check_config(config: &FeedConfig) -> Result<()> {
    let mut fields = vec![("title", config.title.as_str()), ("id", config.id.as_str())];
    if let Some(subtitle) = &config.subtitle {
        fields.push(("subtitle", subtitle.as_str()));
    }
    if let Some(author) = &config.author {
        fields.push(("author", author.name.as_str()));
        if let Some(email) = &author.email {
            fields.push(("author email", email.as_str()));
        }
    }
    for (field, value) in fields {
        if let Some(character) = find_invalid(value) {
            return Err(Error::InvalidText { field, character });
        }
    }
    Ok(())
}

fn find_invalid(value: &str) -> Option<char> {
    value.chars().find(|&c| !is_xml_char(c))
}

/// Whether `c` is allowed in an XML 1.0 document.
fn is_xml_char(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => true,
        '\u{0}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}' => false,
        _ => true,
    }
}

/// A post that was left out of the feed because one of its fields holds a
/// character XML can't carry.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingError {
    pub slug: String,
    pub path: PathBuf,
    pub field: &'static str,
    pub character: char,
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "post `{}`: field `{}` contains character {:?} which can't be encoded in XML",
            self.path.display(),
            self.field,
            self.character
        )
    }
}

impl std::error::Error for EncodingError {}

/// Represents the result of a fallible feed operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem writing a feed. Unlike [`EncodingError`], these fail
/// the whole feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when the feed can't be serialized or written.
    Atom(AtomError),

    /// Returned when one of the feed's own fields holds a character XML
    /// can't carry.
    InvalidText {
        field: &'static str,
        character: char,
    },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Atom(err) => err.fmt(f),
            Error::InvalidText { field, character } => write!(
                f,
                "feed {} contains character {:?} which can't be encoded in XML",
                field, character
            ),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Atom(err) => Some(err),
            Error::InvalidText { .. } => None,
        }
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::index::test::{draft, post};

    fn config(max_entries: usize) -> FeedConfig {
        FeedConfig {
            title: "Example".to_owned(),
            id: "https://example.com/".to_owned(),
            subtitle: None,
            author: Some(Author {
                name: "Jane".to_owned(),
                email: None,
            }),
            home_page: Url::parse("https://example.com/").unwrap(),
            feed_url: Url::parse("https://example.com/feed.atom").unwrap(),
            max_entries,
        }
    }

    fn ids(feed: &Feed) -> Vec<&str> {
        feed.entries().iter().map(|e| e.id()).collect()
    }

    #[test]
    fn test_feed_newest_first() -> Result<()> {
        let index = Index::build(vec![
            post("january", "2024-01-01", &[]),
            post("june", "2024-06-01", &[]),
        ])
        .unwrap();

        let (feed, report) = feed(&config(10), &index)?;
        assert_eq!(2, report.entries);
        assert_eq!(
            vec![
                "https://example.com/posts/june.html",
                "https://example.com/posts/january.html"
            ],
            ids(&feed)
        );
        assert_eq!("2024-06-01T00:00:00+00:00", feed.updated().to_rfc3339());
        Ok(())
    }

    #[test]
    fn test_feed_bounded_length() -> Result<()> {
        let index = Index::build(
            (1..=9)
                .map(|i| post(&format!("p{}", i), &format!("2024-01-0{}", i), &[]))
                .collect(),
        )
        .unwrap();

        for n in 0..12 {
            let (feed, _) = feed(&config(n), &index)?;
            assert!(feed.entries().len() <= n.min(index.count()));
        }
        let (feed, _) = feed(&config(3), &index)?;
        assert_eq!(
            vec![
                "https://example.com/posts/p9.html",
                "https://example.com/posts/p8.html",
                "https://example.com/posts/p7.html"
            ],
            ids(&feed)
        );
        Ok(())
    }

    #[test]
    fn test_feed_excludes_drafts() -> Result<()> {
        let index = Index::build(vec![
            post("public", "2024-01-01", &[]),
            draft("secret", "2024-06-01", &[]),
        ])
        .unwrap();
        let (feed, _) = feed(&config(10), &index)?;
        assert_eq!(vec!["https://example.com/posts/public.html"], ids(&feed));
        Ok(())
    }

    #[test]
    fn test_feed_rejects_unencodable_post() -> Result<()> {
        let mut bad = post("bad", "2024-06-01", &[]);
        bad.title = "bell \u{7}".to_owned();
        let index = Index::build(vec![post("good", "2024-01-01", &[]), bad]).unwrap();

        let mut out = Vec::new();
        let report = write_feed(&config(10), &index, &mut out)?;
        assert_eq!(1, report.entries);
        assert_eq!(1, report.rejected.len());
        assert_eq!("bad", report.rejected[0].slug);
        assert_eq!("title", report.rejected[0].field);

        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains("https://example.com/posts/good.html"));
        assert!(!xml.contains("https://example.com/posts/bad.html"));
        Ok(())
    }

    #[test]
    fn test_feed_rejects_unencodable_tag() -> Result<()> {
        let mut out = Vec::new();
        let parsed = crate::parser::Parser::new(Url::parse("https://example.com/posts/").unwrap())
            .parse(&crate::load::Record {
                path: PathBuf::from("/content/bell.md"),
                relative_path: PathBuf::from("bell.md"),
                contents: "---\nTitle: Bell\nDate: 2024-06-01\nTags: [\"bell\\a\"]\n---\nDing\n"
                    .to_owned(),
            })
            .unwrap();
        assert!(parsed.tags.contains("bell\u{7}"));
        let index = Index::build(vec![post("good", "2024-01-01", &["ok"]), parsed]).unwrap();

        let report = write_feed(&config(10), &index, &mut out)?;
        assert_eq!(1, report.entries);
        assert_eq!(1, report.rejected.len());
        assert_eq!("bell", report.rejected[0].slug);
        assert_eq!("tags", report.rejected[0].field);
        assert_eq!('\u{7}', report.rejected[0].character);

        let xml = String::from_utf8(out).unwrap();
        assert!(!xml.contains('\u{7}'));
        assert!(xml.contains("term=\"ok\""));
        Ok(())
    }

    #[test]
    fn test_feed_rejects_unencodable_config() {
        let index = Index::build(vec![post("good", "2024-01-01", &[])]).unwrap();
        let mut config = config(10);
        config.subtitle = Some("null \u{0}".to_owned());
        match feed(&config, &index) {
            Err(Error::InvalidText { field, character }) => {
                assert_eq!(("subtitle", '\u{0}'), (field, character))
            }
            other => panic!("wanted InvalidText; found {:?}", other.map(|(_, r)| r)),
        }
    }

    #[test]
    fn test_is_xml_char() {
        assert!(is_xml_char('\n'));
        assert!(is_xml_char('é'));
        assert!(!is_xml_char('\u{0}'));
        assert!(!is_xml_char('\u{1b}'));
        assert!(!is_xml_char('\u{ffff}'));
    }
}
