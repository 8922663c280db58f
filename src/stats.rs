//! Run statistics and the end-of-run summary.
//!
//! Jobs running on the scheduler bump shared atomic counters in
//! [`RunStats`]; I/O failures are appended to a mutex-guarded list. After the
//! final drain the orchestrator freezes everything into a [`RunSummary`],
//! which can be printed, rendered as JSON or saved to a file.
//!
//! # Example
//!
//! ```no_run
//! use reddit_split::stats::{RunStats, Stage};
//!
//! let stats = RunStats::new();
//! stats.record_file();
//! stats.record_io_failure("votes/a.csv", Stage::Read, "permission denied");
//!
//! let summary = stats.summary();
//! summary.print();
//! summary.save_to_file("summary.json")?;
//! assert!(summary.has_io_failures());
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::dataset::DatasetType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Which step of the run an I/O failure happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discover,
    Read,
    Flush,
    Join,
}

/// One isolated I/O failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoFailure {
    pub path: PathBuf,
    pub stage: Stage,
    pub message: String,
}

const DATASET_SLOTS: usize = 8;

/// Shared, lock-free counters for a run.
#[derive(Debug)]
pub struct RunStats {
    started: Instant,
    files: AtomicU64,
    rows_read: AtomicU64,
    rows_malformed: AtomicU64,
    ingested: [AtomicU64; DATASET_SLOTS],
    unknown_paths: AtomicU64,
    profiles: AtomicU64,
    duplicate_users: AtomicU64,
    actions: AtomicU64,
    orphaned_actions: AtomicU64,
    shards_written: AtomicU64,
    failures: Mutex<Vec<IoFailure>>,
}

impl RunStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            files: AtomicU64::new(0),
            rows_read: AtomicU64::new(0),
            rows_malformed: AtomicU64::new(0),
            ingested: Default::default(),
            unknown_paths: AtomicU64::new(0),
            profiles: AtomicU64::new(0),
            duplicate_users: AtomicU64::new(0),
            actions: AtomicU64::new(0),
            orphaned_actions: AtomicU64::new(0),
            shards_written: AtomicU64::new(0),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn record_file(&self) {
        self.files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rows(&self, read: u64, malformed: u64) {
        self.rows_read.fetch_add(read, Ordering::Relaxed);
        self.rows_malformed.fetch_add(malformed, Ordering::Relaxed);
    }

    pub fn record_ingested(&self, dataset: DatasetType, n: u64) {
        self.ingested[dataset as usize].fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_unknown_path(&self) {
        self.unknown_paths.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_profile(&self) {
        self.profiles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_user(&self) {
        self.duplicate_users.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action(&self) {
        self.actions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_orphan(&self) {
        self.orphaned_actions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shard_written(&self) {
        self.shards_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_io_failure(&self, path: impl Into<PathBuf>, stage: Stage, message: impl Into<String>) {
        let failure = IoFailure {
            path: path.into(),
            stage,
            message: message.into(),
        };
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }

    #[must_use]
    pub fn orphaned_actions(&self) -> u64 {
        self.orphaned_actions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn duplicate_users(&self) -> u64 {
        self.duplicate_users.load(Ordering::Relaxed)
    }

    /// Freeze the counters into a summary.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let ingested = DatasetType::KNOWN
            .iter()
            .map(|&d| (d.name().to_string(), self.ingested[d as usize].load(Ordering::Relaxed)))
            .filter(|(_, n)| *n > 0)
            .collect();
        let mut io_failures = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        io_failures.sort_by(|a, b| a.path.cmp(&b.path));
        RunSummary {
            elapsed: self.started.elapsed(),
            files_processed: self.files.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_malformed: self.rows_malformed.load(Ordering::Relaxed),
            records_ingested: ingested,
            unknown_paths: self.unknown_paths.load(Ordering::Relaxed),
            profiles_created: self.profiles.load(Ordering::Relaxed),
            duplicate_users: self.duplicate_users.load(Ordering::Relaxed),
            actions_joined: self.actions.load(Ordering::Relaxed),
            orphaned_actions: self.orphaned_actions.load(Ordering::Relaxed),
            shards_written: self.shards_written.load(Ordering::Relaxed),
            io_failures,
        }
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen statistics of a finished run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(with = "millis")]
    pub elapsed: Duration,
    pub files_processed: u64,
    pub rows_read: u64,
    pub rows_malformed: u64,
    /// Records accepted per dataset name.
    pub records_ingested: BTreeMap<String, u64>,
    pub unknown_paths: u64,
    pub profiles_created: u64,
    pub duplicate_users: u64,
    pub actions_joined: u64,
    pub orphaned_actions: u64,
    pub shards_written: u64,
    pub io_failures: Vec<IoFailure>,
}

impl RunSummary {
    /// `true` if any file or shard failed with an I/O error.
    #[must_use]
    pub fn has_io_failures(&self) -> bool {
        !self.io_failures.is_empty()
    }

    #[must_use]
    pub fn total_ingested(&self) -> u64 {
        self.records_ingested.values().sum()
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Print the summary to stdout in a human-readable format.
    pub fn print(&self) {
        println!("\n============ Run Summary =============");
        println!(
            "Execution Time: {:.3}s ({} ms)",
            self.elapsed.as_secs_f64(),
            self.elapsed.as_millis()
        );
        println!("--------------------------------------");
        println!("files_processed: {}", self.files_processed);
        println!("rows_read: {}", self.rows_read);
        println!("rows_malformed: {}", self.rows_malformed);
        for (name, n) in &self.records_ingested {
            println!("ingested.{name}: {n}");
        }
        println!("unknown_paths: {}", self.unknown_paths);
        println!("profiles_created: {}", self.profiles_created);
        println!("duplicate_users: {}", self.duplicate_users);
        println!("actions_joined: {}", self.actions_joined);
        println!("orphaned_actions: {}", self.orphaned_actions);
        println!("shards_written: {}", self.shards_written);
        if self.has_io_failures() {
            println!("--------------------------------------");
            println!("I/O failures ({}):", self.io_failures.len());
            for f in &self.io_failures {
                println!("  [{:?}] {}: {}", f.stage, f.path.display(), f.message);
            }
        }
        println!("======================================\n");
    }

    /// Save the summary as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let formatted = serde_json::to_string_pretty(self)?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
