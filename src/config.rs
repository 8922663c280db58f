//! Run configuration.
//!
//! The core never parses command lines. It takes a [`Config`] value built by
//! the caller (the `reddit-split` binary, or a test) and validates it once
//! before any job is submitted.
//!
//! # Example
//!
//! ```no_run
//! use reddit_split::{Config, HeaderMode};
//!
//! let config = Config::new("/data/reddit", "/scratch/split")
//!     .with_shard_count(256)
//!     .with_pool_size(16)
//!     .with_header(HeaderMode::Present);
//! config.validate()?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of output buckets.
pub const DEFAULT_SHARD_COUNT: usize = 1024;

/// Default partition / join key column.
pub const DEFAULT_KEY_COLUMN: &str = "user_id";

/// How to treat the first row of each input file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// The first row is always a header.
    Present,
    /// There is never a header row.
    Absent,
    /// The first row is a header iff it spells out the schema's column names.
    #[default]
    Auto,
}

/// Everything the orchestrator needs to know about a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root directory whose subdirectories are dataset directories.
    pub input_dir: PathBuf,
    /// Directory receiving `<bucket>/<dataset>` files and the joined output.
    pub output_dir: PathBuf,
    /// Number of buckets per dataset type.
    pub shard_count: usize,
    /// Worker threads in the scheduler pool.
    pub pool_size: usize,
    /// Column used to assign buckets to action and profile records.
    pub key_column: String,
    /// Header handling for input files.
    pub header: HeaderMode,
    /// Aggregate users and write the joined per-user output.
    pub join_output: bool,
    /// Where to save the JSON run summary, if anywhere.
    pub stats_file: Option<PathBuf>,
}

impl Config {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            shard_count: DEFAULT_SHARD_COUNT,
            pool_size: num_cpus::get().max(1),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            header: HeaderMode::default(),
            join_output: true,
            stats_file: None,
        }
    }

    #[must_use]
    pub fn with_shard_count(mut self, n: usize) -> Self {
        self.shard_count = n;
        self
    }

    #[must_use]
    pub fn with_pool_size(mut self, n: usize) -> Self {
        self.pool_size = n;
        self
    }

    #[must_use]
    pub fn with_key_column(mut self, key: impl Into<String>) -> Self {
        self.key_column = key.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, header: HeaderMode) -> Self {
        self.header = header;
        self
    }

    #[must_use]
    pub fn with_join_output(mut self, enabled: bool) -> Self {
        self.join_output = enabled;
        self
    }

    #[must_use]
    pub fn with_stats_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stats_file = Some(path.into());
        self
    }

    /// Check everything that can be checked without touching the data.
    ///
    /// # Errors
    /// The first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_count == 0 {
            return Err(ConfigError::ZeroShardCount);
        }
        if self.pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        if self.key_column.trim().is_empty() {
            return Err(ConfigError::EmptyKeyColumn);
        }
        if !self.input_dir.exists() {
            return Err(ConfigError::MissingInputDir(self.input_dir.clone()));
        }
        if !self.input_dir.is_dir() {
            return Err(ConfigError::InputNotADirectory(self.input_dir.clone()));
        }
        if self.output_dir.is_file() {
            return Err(ConfigError::OutputIsAFile(self.output_dir.clone()));
        }
        Ok(())
    }
}
