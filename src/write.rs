//! Writes listing pages and the tag summary to disk as JSON documents.

use std::{
    collections::HashSet,
    fmt,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{page::Page, tag::TagSummary};

/// Responsible for writing [`Page`]s (and the tag summary) to disk.
pub struct Writer<'a> {
    /// The directory in which the page files will be written. The main page
    /// files will be located at `{pages_directory}/index.json`,
    /// `{pages_directory}/1.json`, etc. The tag page files will be located at
    /// `{pages_directory}/tags/{tag}/index.json`,
    /// `{pages_directory}/tags/{tag}/1.json`, etc.
    pub pages_directory: &'a Path,
}

impl Writer<'_> {
    /// Writes every page to its `file_path` under the pages directory,
    /// creating directories as needed. Tag path collisions are caught by
    /// [`crate::page::tag_pages`] before anything gets here.
    pub fn write_pages<'p>(&self, pages: impl IntoIterator<Item = &'p Page>) -> Result<usize> {
        let pages: Vec<&Page> = pages.into_iter().collect();

        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
        for page in pages.iter() {
            let file_path = self.pages_directory.join(&page.file_path);
            if let Some(dir) = file_path.parent() {
                if seen_dirs.insert(dir.to_owned()) {
                    fs::create_dir_all(dir).map_err(|err| Error::Io {
                        path: dir.to_owned(),
                        err,
                    })?;
                }
            }
            write_json(&file_path, page)?;
        }
        Ok(pages.len())
    }
}

/// Serializes `value` as pretty-printed JSON into a new file at `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let annotate = |err: io::Error| Error::Io {
        path: path.to_owned(),
        err,
    };
    let mut w = BufWriter::new(File::create(path).map_err(annotate)?);
    serde_json::to_writer_pretty(&mut w, value).map_err(|err| Error::Json {
        path: path.to_owned(),
        err,
    })?;
    w.flush().map_err(annotate)
}

/// Writes the tag summary (every tag with its post count and first page URL)
/// to `path`.
pub fn write_tags(path: &Path, tags: &[TagSummary]) -> Result<()> {
    write_json(path, tags)
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error writing the output files.
    Io { path: PathBuf, err: io::Error },

    /// An error serializing a document.
    Json {
        path: PathBuf,
        err: serde_json::Error,
    },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io { path, err } => write!(f, "writing `{}`: {}", path.display(), err),
            Error::Json { path, err } => {
                write!(f, "serializing `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { path: _, err } => Some(err),
            Error::Json { path: _, err } => Some(err),
        }
    }
}
