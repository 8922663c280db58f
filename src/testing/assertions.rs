//! Assertion functions for checking bucketed output on disk.

use crate::dataset::DatasetType;
use crate::join_writer::JOINED_DIR;
use crate::partition::{assign_bucket, shard_path};
use anyhow::{Context, Result, ensure};
use csv::ReaderBuilder;
use std::path::Path;

fn read_rows(path: &Path, delimiter: u8) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut r = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let header = r.headers()?.iter().map(String::from).collect();
    let mut rows = Vec::new();
    for row in r.records() {
        rows.push(row?.iter().map(String::from).collect());
    }
    Ok((header, rows))
}

/// Header and data rows of `<output>/<bucket:05>/<dataset>`.
///
/// # Errors
/// Returns an error if the shard file is missing or unreadable.
pub fn read_shard(output: &Path, bucket: usize, dataset: DatasetType) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    read_rows(&shard_path(output, bucket, dataset), b',')
}

/// Data rows of every bucket of `dataset`, in bucket order.
///
/// # Errors
/// Returns an error if any shard file is missing or unreadable.
pub fn read_all_shards(output: &Path, shard_count: usize, dataset: DatasetType) -> Result<Vec<Vec<String>>> {
    let mut all = Vec::new();
    for bucket in 0..shard_count {
        all.extend(read_shard(output, bucket, dataset)?.1);
    }
    Ok(all)
}

/// Header and rows of `<output>/joined/<bucket:05>.tsv`.
///
/// # Errors
/// Returns an error if the joined file is missing or unreadable.
pub fn read_joined(output: &Path, bucket: usize) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    read_rows(&output.join(JOINED_DIR).join(format!("{bucket:05}.tsv")), b'\t')
}

/// Check that every bucket file of `dataset` exists and that each row sits
/// in the bucket its `user_id` hashes to.
///
/// # Errors
/// Describes the first misplaced row or missing file.
pub fn assert_partitioned(output: &Path, shard_count: usize, dataset: DatasetType) -> Result<()> {
    for bucket in 0..shard_count {
        let (header, rows) = read_shard(output, bucket, dataset)?;
        let key = header
            .iter()
            .position(|h| h == "user_id")
            .with_context(|| format!("{dataset} shard {bucket} has no user_id column"))?;
        for row in rows {
            let id = row
                .get(key)
                .with_context(|| format!("{dataset} row {row:?} in bucket {bucket} has no user_id field"))?;
            let expected = assign_bucket(id, shard_count);
            ensure!(
                expected == bucket,
                "{dataset} row {row:?} is in bucket {bucket}, expected {expected}"
            );
        }
    }
    Ok(())
}

/// Sort rows for order-independent comparison.
#[must_use]
pub fn sorted(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    rows.sort();
    rows
}
