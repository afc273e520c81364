use anyhow::{anyhow, Result};
use std::fs::File;
use std::path::Path;

/// Opens `path`, naming the kind of file in the error message (e.g., "Opening
/// project file `x`: ...").
pub fn open(path: &Path, kind: &str) -> Result<File> {
    match File::open(path) {
        Err(e) => Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e)),
        Ok(file) => Ok(file),
    }
}

/// Removes `dir` and everything in it. A missing directory is not an error.
pub fn rmdir(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}
