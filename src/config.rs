//! Loads the site [`Config`] from a `postmill.yaml` project file. The config
//! is read once at the start of a build and handed to each stage explicitly.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "postmill.yaml";

/// The author of the site.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

fn default_page_size() -> usize {
    10
}

fn default_feed_length() -> usize {
    20
}

fn default_content_directory() -> PathBuf {
    PathBuf::from("posts")
}

fn default_content_extensions() -> Vec<String> {
    vec!["md".to_owned(), "markdown".to_owned(), "mdx".to_owned()]
}

fn default_read_retries() -> usize {
    3
}

fn default_file_timeout_secs() -> u64 {
    30
}

/// The contents of a `postmill.yaml` file.
#[derive(Deserialize)]
pub struct Project {
    pub title: String,
    pub site_root: Url,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub author: Option<Author>,

    #[serde(default = "default_page_size")]
    pub index_page_size: usize,

    #[serde(default = "default_feed_length")]
    pub feed_length: usize,

    #[serde(default = "default_content_directory")]
    pub content_directory: PathBuf,

    #[serde(default = "default_content_extensions")]
    pub content_extensions: Vec<String>,

    #[serde(default = "default_read_retries")]
    pub read_retries: usize,

    #[serde(default = "default_file_timeout_secs")]
    pub file_timeout_secs: u64,
}

/// The fully resolved build configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub author: Option<Author>,

    /// The site root; always ends in a `/`.
    pub home_page: Url,

    /// `{home_page}posts/`, the prefix of post permalinks.
    pub posts_url: Url,

    /// `{home_page}pages/`, the prefix of listing and tag pages.
    pub pages_url: Url,

    /// `{home_page}feed.atom`.
    pub feed_url: Url,

    pub content_directory: PathBuf,
    pub content_extensions: Vec<String>,

    pub output_directory: PathBuf,
    pub pages_output_directory: PathBuf,
    pub feed_file: PathBuf,
    pub search_file: PathBuf,
    pub tags_file: PathBuf,

    pub index_page_size: usize,
    pub feed_length: usize,
    pub threads: usize,
    pub read_retries: usize,
    pub file_timeout: Duration,
}

impl Config {
    /// Looks for a `postmill.yaml` in `dir` and each of its ancestors, and
    /// loads the first one found.
    pub fn from_directory(
        dir: &Path,
        output_directory: &Path,
        threads: Option<usize>,
    ) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            match Config::from_project_file(&path, output_directory, threads) {
                Ok(config) => Ok(config),
                Err(e) => Err(anyhow!("Loading configuration: {:#}", e)),
            }
        } else {
            match dir.parent() {
                Some(dir) => Config::from_directory(dir, output_directory, threads),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    /// Loads the config from a project file. Relative paths in the project
    /// are resolved against the file's directory.
    pub fn from_project_file(
        path: &Path,
        output_directory: &Path,
        threads: Option<usize>,
    ) -> Result<Config> {
        use crate::util::open;
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(project_root) => {
                Config::from_project(project, project_root, output_directory, threads)
            }
        }
    }

    /// Resolves a parsed [`Project`] into a [`Config`].
    pub fn from_project(
        project: Project,
        project_root: &Path,
        output_directory: &Path,
        threads: Option<usize>,
    ) -> Result<Config> {
        if project.index_page_size == 0 {
            return Err(anyhow!("`index_page_size` must be greater than zero"));
        }
        if project.content_extensions.is_empty() {
            return Err(anyhow!("`content_extensions` must not be empty"));
        }

        let mut home_page = project.site_root;
        if !home_page.path().ends_with('/') {
            let path = format!("{}/", home_page.path());
            home_page.set_path(&path);
        }

        Ok(Config {
            posts_url: home_page.join("posts/")?,
            pages_url: home_page.join("pages/")?,
            feed_url: home_page.join("feed.atom")?,
            home_page,
            title: project.title,
            description: project.description,
            language: project.language,
            author: project.author,
            content_directory: project_root.join(project.content_directory),
            content_extensions: project
                .content_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_owned())
                .collect(),
            pages_output_directory: output_directory.join("pages"),
            feed_file: output_directory.join("feed.atom"),
            search_file: output_directory.join("search.json"),
            tags_file: output_directory.join("tags.json"),
            output_directory: output_directory.to_owned(),
            index_page_size: project.index_page_size,
            feed_length: project.feed_length,
            threads: match threads {
                None => num_cpus::get(),
                Some(threads) => threads.max(1),
            },
            read_retries: project.read_retries,
            file_timeout: Duration::from_secs(project.file_timeout_secs),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    fn project(yaml: &str) -> Project {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let config = Config::from_project(
            project("title: Blog\nsite_root: https://example.com/blog\n"),
            Path::new("/site"),
            Path::new("/out"),
            Some(2),
        )?;

        assert_eq!("https://example.com/blog/", config.home_page.as_str());
        assert_eq!("https://example.com/blog/posts/", config.posts_url.as_str());
        assert_eq!("https://example.com/blog/pages/", config.pages_url.as_str());
        assert_eq!("https://example.com/blog/feed.atom", config.feed_url.as_str());
        assert_eq!(PathBuf::from("/site/posts"), config.content_directory);
        assert_eq!(PathBuf::from("/out/pages"), config.pages_output_directory);
        assert_eq!(10, config.index_page_size);
        assert_eq!(20, config.feed_length);
        assert_eq!(2, config.threads);
        assert_eq!(Duration::from_secs(30), config.file_timeout);
        Ok(())
    }

    #[test]
    fn test_rejects_zero_page_size() {
        assert!(Config::from_project(
            project("title: Blog\nsite_root: https://example.com/\nindex_page_size: 0\n"),
            Path::new("/site"),
            Path::new("/out"),
            None,
        )
        .is_err());
    }

    #[test]
    fn test_from_directory_searches_parents() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(
            dir.path().join(PROJECT_FILE),
            "title: Blog\nsite_root: https://example.com/\nauthor: {name: Jane, email: jane@example.com}\ncontent_extensions: [.md]\n",
        )?;
        let nested = dir.path().join("posts/2024");
        std::fs::create_dir_all(&nested)?;

        let config = Config::from_directory(&nested, &dir.path().join("out"), Some(1))?;
        assert_eq!("Blog", config.title);
        assert_eq!(dir.path().join("posts"), config.content_directory);
        assert_eq!(vec!["md".to_owned()], config.content_extensions);
        assert_eq!(
            Some(Author {
                name: "Jane".to_owned(),
                email: Some("jane@example.com".to_owned())
            }),
            config.author
        );
        Ok(())
    }
}
