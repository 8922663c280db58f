//! Pre-built exports and sample rows for common testing scenarios.

use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Header rows matching the Reddit schemas, for writing fixture files.
pub const USERS_HEADER: &[&str] = &["registration_dt", "user_id", "registration_country_code", "is_suspended"];
pub const VOTES_HEADER: &[&str] = &[
    "endpoint_ts",
    "user_id",
    "sr_name",
    "target_fullname",
    "target_type",
    "vote_direction",
];
pub const SUBSCRIPTIONS_HEADER: &[&str] = &["endpoint_ts", "user_id", "sr_name", "event_type"];

/// A throwaway export on disk.
///
/// Owns a temporary directory holding `input/` and `output/`; both are
/// removed when the builder is dropped.
///
/// # Example
///
/// ```
/// use reddit_split::testing::ExportBuilder;
///
/// let export = ExportBuilder::new()?
///     .file("votes", "a.csv", "endpoint_ts,user_id,sr_name,target_fullname,target_type,vote_direction\n")?;
/// assert!(export.input().join("votes").join("a.csv").is_file());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct ExportBuilder {
    root: TempDir,
    files: usize,
}

impl ExportBuilder {
    /// Create an empty export with an `input/` directory.
    ///
    /// # Errors
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let root = tempfile::tempdir().context("create temp dir")?;
        fs::create_dir_all(root.path().join("input")).context("create input dir")?;
        Ok(Self { root, files: 0 })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    #[must_use]
    pub fn input(&self) -> PathBuf {
        self.root.path().join("input")
    }

    #[must_use]
    pub fn output(&self) -> PathBuf {
        self.root.path().join("output")
    }

    /// Write `contents` verbatim to `input/<dir>/<name>`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn file(self, dir: &str, name: &str, contents: &str) -> Result<Self> {
        let dir = self.input().join(dir);
        fs::create_dir_all(&dir).with_context(|| format!("mkdir {}", dir.display()))?;
        let path = dir.join(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(self)
    }

    /// Write `rows` (the first being the header, if wanted) as a new
    /// comma-separated file in `input/<dir>`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn dataset(mut self, dir: &str, rows: &[Vec<String>]) -> Result<Self> {
        let name = format!("part-{:05}.csv", self.files);
        self.files += 1;
        let mut w = csv::Writer::from_writer(Vec::new());
        for row in rows {
            w.write_record(row)?;
        }
        let bytes = w
            .into_inner()
            .map_err(|e| anyhow!("encode fixture rows: {}", e.error()))?;
        let text = String::from_utf8(bytes).context("fixture rows are not UTF-8")?;
        self.file(dir, &name, &text)
    }

    /// A config over this export with `shard_count` buckets and a small pool.
    #[must_use]
    pub fn config(&self, shard_count: usize) -> Config {
        Config::new(self.input(), self.output())
            .with_shard_count(shard_count)
            .with_pool_size(4)
    }
}

/// Turn borrowed rows into owned ones.
#[must_use]
pub fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
    raw.iter()
        .map(|r| r.iter().map(|s| (*s).to_string()).collect())
        .collect()
}

/// Prepend `header` to `body`.
#[must_use]
pub fn with_header(header: &[&str], body: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut out = rows(&[header]);
    out.extend(body);
    out
}

/// Three users with a header. `u3` is suspended.
#[must_use]
pub fn sample_users() -> Vec<Vec<String>> {
    with_header(
        USERS_HEADER,
        rows(&[
            &["2016-01-02", "u1", "US", "false"],
            &["2017-05-06", "u2", "DE", "false"],
            &["2018-09-10", "u3", "FR", "true"],
        ]),
    )
}

/// Votes by `u1` and `u2`, out of timestamp order, plus one by an unknown
/// user `ghost`.
#[must_use]
pub fn sample_votes() -> Vec<Vec<String>> {
    with_header(
        VOTES_HEADER,
        rows(&[
            &["1520000300", "u1", "rust", "t3_c", "link", "up"],
            &["1520000100", "u1", "rust", "t3_a", "link", "down"],
            &["1520000200", "u2", "pics", "t1_b", "comment", "up"],
            &["1520000400", "ghost", "pics", "t3_d", "link", "up"],
        ]),
    )
}

/// Subscription events by `u1`, with the event type column filled in.
#[must_use]
pub fn sample_subscriptions() -> Vec<Vec<String>> {
    with_header(
        SUBSCRIPTIONS_HEADER,
        rows(&[
            &["1520000250", "u1", "rust", "subscribe"],
            &["1520000500", "u1", "rust", "unsubscribe"],
        ]),
    )
}

/// `n` synthetic user ids.
#[must_use]
pub fn user_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("t2_{i:08x}")).collect()
}
