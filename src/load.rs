//! Discovers post source files under a content root. The loader only finds
//! and reads files; turning their contents into [`crate::post::Post`]s is the
//! job of [`crate::parser`].

use std::{
    fmt,
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// The raw contents of one source file.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// The full path to the file on disk.
    pub path: PathBuf,

    /// The path of the file relative to the content root. Slugs are derived
    /// from this.
    pub relative_path: PathBuf,

    /// The file's contents.
    pub contents: String,
}

/// Everything found under a content root.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Content {
    /// The post source files, ordered by relative path.
    pub records: Vec<Record>,

    /// Files that aren't posts (e.g., images in a post bundle), relative to
    /// the content root.
    pub skipped: Vec<PathBuf>,
}

/// Walks a content root and reads every post source file beneath it.
pub struct Loader<'a> {
    /// File extensions (without the leading `.`) that mark a file as a post.
    extensions: &'a [String],

    /// How many times a read is retried on a transient I/O error before
    /// giving up.
    retries: usize,
}

impl<'a> Loader<'a> {
    pub fn new(extensions: &'a [String], retries: usize) -> Loader<'a> {
        Loader {
            extensions,
            retries,
        }
    }

    /// Recursively loads every post source file under `root`. Records are
    /// returned ordered by relative path. Symbolic links are followed. Any
    /// file system error encountered during the walk (including a link
    /// loop) fails the whole load; files that aren't posts are reported in
    /// [`Content::skipped`].
    pub fn load(&self, root: &Path) -> Result<Content> {
        let metadata = match root.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                return Err(Error::RootNotFound {
                    path: root.to_owned(),
                    err,
                })
            }
        };
        if !metadata.is_dir() {
            return Err(Error::NotADirectory(root.to_owned()));
        }

        let mut content = Content::default();
        let walk = WalkDir::new(root)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));
        for result in walk {
            let entry = result?;
            if entry.file_type().is_dir() {
                continue;
            }

            // `entry` always lives under `root`
            let relative_path = match entry.path().strip_prefix(root) {
                Ok(relative) => relative.to_owned(),
                Err(_) => entry.path().to_owned(),
            };
            if !entry.file_type().is_file() || !self.is_content(entry.path()) {
                warn!(path = %entry.path().display(), "skipping file that isn't a post");
                content.skipped.push(relative_path);
                continue;
            }
            content.records.push(Record {
                contents: self.read(entry.path())?,
                path: entry.path().to_owned(),
                relative_path,
            });
        }

        debug!(
            root = %root.display(),
            files = content.records.len(),
            skipped = content.skipped.len(),
            "loaded posts"
        );
        Ok(content)
    }

    fn is_content(&self, path: &Path) -> bool {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.read_with(path, read_to_string)
    }

    fn read_with<F>(&self, path: &Path, mut read: F) -> Result<String>
    where
        F: FnMut(&Path) -> io::Result<String>,
    {
        let mut attempt = 0;
        loop {
            match read(path) {
                Ok(contents) => return Ok(contents),
                Err(err) if is_transient(&err) && attempt < self.retries => {
                    attempt += 1;
                    debug!(path = %path.display(), attempt, "retrying read: {}", err);
                }
                Err(err) => {
                    return Err(Error::Read {
                        path: path.to_owned(),
                        err,
                    })
                }
            }
        }
    }
}

fn read_to_string(path: &Path) -> io::Result<String> {
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;
    Ok(contents)
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Represents the result of a load operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to load the content tree. Every variant is fatal to
/// the build.
#[derive(Debug)]
pub enum Error {
    /// Returned when the content root can't be found or stat'd.
    RootNotFound { path: PathBuf, err: io::Error },

    /// Returned when the content root exists but isn't a directory.
    NotADirectory(PathBuf),

    /// Returned when some node beneath the root can't be visited.
    Walk(walkdir::Error),

    /// Returned when a post file can't be read, after retries.
    Read { path: PathBuf, err: io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::RootNotFound { path, err } => {
                write!(f, "reading content root `{}`: {}", path.display(), err)
            }
            Error::NotADirectory(path) => {
                write!(f, "content root `{}` is not a directory", path.display())
            }
            Error::Walk(err) => write!(f, "walking content directory: {}", err),
            Error::Read { path, err } => {
                write!(f, "reading post `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::RootNotFound { path: _, err } => Some(err),
            Error::NotADirectory(_) => None,
            Error::Walk(err) => Some(err),
            Error::Read { path: _, err } => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator while walking the content tree.
    fn from(err: walkdir::Error) -> Error {
        Error::Walk(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        vec!["md".to_owned(), "markdown".to_owned()]
    }

    #[test]
    fn test_load_visits_nested_directories() -> Result<()> {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("2024/06")).unwrap();
        fs::write(dir.path().join("top.md"), "a").unwrap();
        fs::write(dir.path().join("2024/middle.markdown"), "b").unwrap();
        fs::write(dir.path().join("2024/06/deep.md"), "c").unwrap();

        let extensions = extensions();
        let records = Loader::new(&extensions, 0).load(dir.path())?.records;
        let relative: Vec<_> = records.iter().map(|r| r.relative_path.clone()).collect();
        assert_eq!(
            vec![
                PathBuf::from("2024/06/deep.md"),
                PathBuf::from("2024/middle.markdown"),
                PathBuf::from("top.md"),
            ],
            relative
        );
        assert_eq!("c", records[0].contents);
        Ok(())
    }

    #[test]
    fn test_load_ignores_non_post_files() -> Result<()> {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("bundle")).unwrap();
        fs::write(dir.path().join("bundle/index.md"), "post").unwrap();
        fs::write(dir.path().join("bundle/photo.jpg"), "jpeg").unwrap();
        fs::write(dir.path().join(".DS_Store"), "junk").unwrap();

        let extensions = extensions();
        let content = Loader::new(&extensions, 0).load(dir.path())?;
        assert_eq!(1, content.records.len());
        assert_eq!(PathBuf::from("bundle/index.md"), content.records[0].relative_path);
        assert_eq!(
            vec![PathBuf::from(".DS_Store"), PathBuf::from("bundle/photo.jpg")],
            content.skipped
        );
        Ok(())
    }

    #[test]
    fn test_load_extension_match_ignores_case() -> Result<()> {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("LOUD.MD"), "post").unwrap();

        let extensions = extensions();
        assert_eq!(1, Loader::new(&extensions, 0).load(dir.path())?.records.len());
        Ok(())
    }

    #[test]
    fn test_load_missing_root() {
        let dir = TempDir::new().unwrap();
        let extensions = extensions();
        match Loader::new(&extensions, 0).load(&dir.path().join("missing")) {
            Err(Error::RootNotFound { path, err: _ }) => {
                assert_eq!(dir.path().join("missing"), path)
            }
            other => panic!("wanted RootNotFound; found {:?}", other),
        }
    }

    #[test]
    fn test_load_root_is_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("post.md");
        fs::write(&file, "post").unwrap();

        let extensions = extensions();
        match Loader::new(&extensions, 0).load(&file) {
            Err(Error::NotADirectory(path)) => assert_eq!(file, path),
            other => panic!("wanted NotADirectory; found {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_load_follows_symlinks() -> Result<()> {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("posts")).unwrap();
        fs::create_dir_all(dir.path().join("elsewhere")).unwrap();
        fs::write(dir.path().join("posts/plain.md"), "plain").unwrap();
        fs::write(dir.path().join("elsewhere/real.md"), "linked").unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("elsewhere/real.md"),
            dir.path().join("posts/linked.md"),
        )
        .unwrap();

        let extensions = extensions();
        let content = Loader::new(&extensions, 0).load(&dir.path().join("posts"))?;
        assert_eq!(
            vec![
                (PathBuf::from("linked.md"), "linked"),
                (PathBuf::from("plain.md"), "plain"),
            ],
            content
                .records
                .iter()
                .map(|r| (r.relative_path.clone(), r.contents.as_str()))
                .collect::<Vec<_>>()
        );
        assert!(content.skipped.is_empty());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_load_link_loop_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/post.md"), "post").unwrap();
        std::os::unix::fs::symlink(dir.path().join("a"), dir.path().join("a/back")).unwrap();

        let extensions = extensions();
        match Loader::new(&extensions, 0).load(dir.path()) {
            Err(Error::Walk(err)) => assert!(err.loop_ancestor().is_some()),
            other => panic!("wanted Walk; found {:?}", other),
        }
    }

    fn flaky(failures: usize, kind: io::ErrorKind) -> impl FnMut(&Path) -> io::Result<String> {
        let mut calls = 0;
        move |_| {
            calls += 1;
            match calls > failures {
                true => Ok("contents".to_owned()),
                false => Err(io::Error::new(kind, "flaky")),
            }
        }
    }

    #[test]
    fn test_read_retries_transient_errors() -> Result<()> {
        let extensions = extensions();
        let loader = Loader::new(&extensions, 3);
        let contents =
            loader.read_with(Path::new("post.md"), flaky(3, io::ErrorKind::Interrupted))?;
        assert_eq!("contents", contents);
        Ok(())
    }

    #[test]
    fn test_read_gives_up_after_retries() {
        let extensions = extensions();
        let loader = Loader::new(&extensions, 2);
        match loader.read_with(Path::new("post.md"), flaky(3, io::ErrorKind::TimedOut)) {
            Err(Error::Read { path, err }) => {
                assert_eq!(PathBuf::from("post.md"), path);
                assert_eq!(io::ErrorKind::TimedOut, err.kind());
            }
            other => panic!("wanted Read; found {:?}", other),
        }
    }

    #[test]
    fn test_read_does_not_retry_permanent_errors() {
        let extensions = extensions();
        let loader = Loader::new(&extensions, 5);
        let mut calls = 0;
        let result = loader.read_with(Path::new("post.md"), |_| {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        });
        assert!(matches!(result, Err(Error::Read { .. })));
        assert_eq!(1, calls);
    }
}
