//! Fatal startup errors.
//!
//! Everything in here is raised before the first job is submitted. Errors
//! that happen inside jobs are plain `anyhow::Error`s that get logged and
//! recorded in the run summary instead.

use crate::dataset::DatasetType;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("shard count must be greater than zero")]
    ZeroShardCount,

    #[error("worker pool size must be greater than zero")]
    ZeroPoolSize,

    #[error("partition key column must not be empty")]
    EmptyKeyColumn,

    #[error("input directory does not exist: {0}")]
    MissingInputDir(PathBuf),

    #[error("not a directory: {0}")]
    InputNotADirectory(PathBuf),

    #[error("output path exists and is a file: {0}")]
    OutputIsAFile(PathBuf),

    #[error("no schema registered for dataset type `{0}`")]
    UnregisteredDataset(DatasetType),

    #[error("schema for `{dataset}` has no column named `{column}`")]
    MissingKeyColumn {
        dataset: DatasetType,
        column: String,
    },

    #[error("failed to build worker pool: {0}")]
    Pool(String),
}
