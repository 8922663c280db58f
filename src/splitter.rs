//! Hash partitioning of one dataset type into per-bucket files.
//!
//! A [`TableSplitter`] owns one in-memory buffer per bucket. Many file jobs
//! call [`TableSplitter::ingest`] concurrently; each buffer has its own mutex
//! so two jobs only contend when they hit the same bucket at the same time.
//! Once every file job for the dataset has drained, [`TableSplitter::flush`]
//! writes each buffer (empty ones included) to
//! `<output>/<bucket:05>/<dataset name>` and releases the memory.
//!
//! # Example
//!
//! ```no_run
//! use reddit_split::{DatasetType, SchemaRegistry, TableSplitter};
//! use reddit_split::partition::Partitioner;
//! use reddit_split::record::{Record, Value};
//! use std::path::Path;
//!
//! let registry = SchemaRegistry::reddit();
//! let schema = registry.schema_for(DatasetType::Subscription)?.clone();
//! let splitter = TableSplitter::new(DatasetType::Subscription, schema, "user_id", Partitioner::new(16)?)?;
//!
//! splitter.ingest(Record::new(vec![
//!     Value::Str("1520000000".into()),
//!     Value::Str("u1".into()),
//!     Value::Str("AskReddit".into()),
//!     Value::Str("subscribe".into()),
//! ]));
//!
//! let report = splitter.flush(Path::new("/scratch/split"))?;
//! assert!(report.is_complete());
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::dataset::DatasetType;
use crate::error::ConfigError;
use crate::io::delimited::RecordWriter;
use crate::partition::{Partitioner, shard_path};
use crate::record::{Record, Value};
use crate::schema::Schema;
use anyhow::{Result, bail};
use log::{debug, error};
use rayon::prelude::*;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One bucket's buffered records.
type Shard = Mutex<Vec<Record>>;

fn lock(shard: &Shard) -> MutexGuard<'_, Vec<Record>> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of [`TableSplitter::flush`].
#[derive(Debug, Default)]
pub struct FlushReport {
    /// `(bucket, rows written)` for every shard that was written completely.
    pub written: Vec<(usize, usize)>,
    /// Shards whose output is missing or partial.
    pub failed: Vec<ShardFailure>,
}

impl FlushReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.written.iter().map(|(_, n)| n).sum()
    }
}

/// A shard that could not be written.
#[derive(Debug)]
pub struct ShardFailure {
    pub bucket: usize,
    pub path: PathBuf,
    pub error: anyhow::Error,
}

/// Partitions one dataset type's records by the hash of a key column.
pub struct TableSplitter {
    dataset: DatasetType,
    schema: Schema,
    key_index: usize,
    partitioner: Partitioner,
    shards: Vec<Shard>,
    flushed: AtomicBool,
}

impl TableSplitter {
    /// # Errors
    /// [`ConfigError::MissingKeyColumn`] if `schema` has no `key_column`.
    pub fn new(
        dataset: DatasetType,
        schema: Schema,
        key_column: &str,
        partitioner: Partitioner,
    ) -> Result<Self, ConfigError> {
        let key_index = schema
            .index_of(key_column)
            .ok_or_else(|| ConfigError::MissingKeyColumn {
                dataset,
                column: key_column.to_string(),
            })?;
        let shards = (0..partitioner.shard_count())
            .map(|_| Mutex::new(Vec::new()))
            .collect();
        Ok(Self {
            dataset,
            schema,
            key_index,
            partitioner,
            shards,
            flushed: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn dataset(&self) -> DatasetType {
        self.dataset
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Key value of `record` as text.
    fn key_of<'r>(&self, record: &'r Record) -> Cow<'r, str> {
        match record.get(self.key_index) {
            Some(Value::Str(s)) => Cow::Borrowed(s),
            Some(other) => Cow::Owned(other.to_string()),
            None => Cow::Borrowed(""),
        }
    }

    /// Bucket `record` would be assigned to.
    #[must_use]
    pub fn bucket_of(&self, record: &Record) -> usize {
        self.partitioner.bucket(&self.key_of(record))
    }

    /// Append `record` to its bucket. Safe to call from many threads.
    ///
    /// # Returns
    /// The bucket index the record went to.
    pub fn ingest(&self, record: Record) -> usize {
        let bucket = self.bucket_of(&record);
        lock(&self.shards[bucket]).push(record);
        bucket
    }

    /// Records currently buffered in `bucket`.
    #[must_use]
    pub fn shard_len(&self, bucket: usize) -> usize {
        self.shards.get(bucket).map_or(0, |s| lock(s).len())
    }

    /// Records currently buffered across all buckets.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.shards.iter().map(|s| lock(s).len()).sum()
    }

    /// Write every bucket to `<output_dir>/<bucket:05>/<dataset name>` and
    /// drop the buffers.
    ///
    /// Must only run after all ingestion for this dataset has drained. Each
    /// shard is written independently: a failing shard is logged and
    /// reported in [`FlushReport::failed`] while the others still flush.
    ///
    /// # Errors
    /// Returns an error only if the splitter was already flushed.
    pub fn flush(&self, output_dir: &Path) -> Result<FlushReport> {
        if self.flushed.swap(true, Ordering::AcqRel) {
            bail!("{} splitter was already flushed", self.dataset);
        }

        let results: Vec<(usize, PathBuf, Result<usize>)> = (0..self.shards.len())
            .into_par_iter()
            .map(|bucket| {
                let rows = std::mem::take(&mut *lock(&self.shards[bucket]));
                let path = shard_path(output_dir, bucket, self.dataset);
                let written = self.write_shard(&path, &rows);
                (bucket, path, written)
            })
            .collect();

        let mut report = FlushReport::default();
        for (bucket, path, written) in results {
            match written {
                Ok(n) => report.written.push((bucket, n)),
                Err(e) => {
                    error!("failed to flush {} shard {bucket}: {e:#}", self.dataset);
                    report.failed.push(ShardFailure {
                        bucket,
                        path,
                        error: e,
                    });
                }
            }
        }
        debug!(
            "flushed {}: {} rows into {} shards ({} failed)",
            self.dataset,
            report.rows_written(),
            report.written.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn write_shard(&self, path: &Path, rows: &[Record]) -> Result<usize> {
        let mut w = RecordWriter::create(path, &self.schema, b',')?;
        for row in rows {
            w.write(row)?;
        }
        w.finish()
    }
}
