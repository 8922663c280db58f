//! Input discovery.
//!
//! The export is laid out as `<root>/<dataset dir>/<data files>`. These
//! helpers list the immediate children of a directory, split into
//! directories and regular files, in sorted order so runs are repeatable.
//!
//! # Examples
//!
//! ```no_run
//! use reddit_split::io::discovery::{list_dirs, list_files};
//!
//! for dir in list_dirs("/data/reddit")? {
//!     let files = list_files(&dir)?;
//!     println!("{}: {} files", dir.display(), files.len());
//! }
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern, glob_with};
use std::path::{Path, PathBuf};

/// Expand `<dir>/*` into a sorted list of paths, keeping those that pass
/// `keep`. Hidden entries (leading `.`) never match.
fn children(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{escaped}/*");
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let paths = glob_with(&pattern, options).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.with_context(|| format!("error listing {}", dir.display()))?;
        if keep(&path) {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Immediate subdirectories of `dir`, sorted.
///
/// # Errors
/// Returns an error if `dir` cannot be listed.
pub fn list_dirs(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    children(dir.as_ref(), Path::is_dir)
}

/// Every non-directory entry directly inside `dir`, sorted. Dangling links
/// are included, so opening them fails like any unreadable file.
///
/// # Errors
/// Returns an error if `dir` cannot be listed.
pub fn list_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    children(dir.as_ref(), |p| !p.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn hidden_entries_are_skipped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a.csv"), "1,u1\n")?;
        fs::write(dir.path().join(".part-0.crc"), "crc")?;
        fs::write(dir.path().join(".DS_Store"), "")?;
        fs::create_dir(dir.path().join(".hidden"))?;
        fs::create_dir(dir.path().join("votes"))?;

        assert_eq!(list_files(dir.path())?, [dir.path().join("a.csv")]);
        assert_eq!(list_dirs(dir.path())?, [dir.path().join("votes")]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn dangling_links_are_listed_as_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("b.csv"), "")?;
        std::os::unix::fs::symlink(dir.path().join("gone.csv"), dir.path().join("a.csv"))?;

        assert_eq!(
            list_files(dir.path())?,
            [dir.path().join("a.csv"), dir.path().join("b.csv")]
        );
        Ok(())
    }
}
