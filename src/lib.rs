//! # reddit-split
//!
//! A **partition and join engine** for Reddit user-action exports.
//! An export is a directory of dataset directories (`users`, `votes`,
//! `comments`, `submissions`, `removals`, `reports`, `subscriptions`), each
//! holding delimited text files. reddit-split hash-partitions every dataset by
//! user id into a fixed number of buckets and, optionally, joins each user's
//! profile with all of that user's actions in timestamp order.
//!
//! ## Key Features
//!
//! - **Deterministic buckets** - FNV-1a over the user id, stable across runs and threads
//! - **Per-bucket locking** - concurrent file jobs only contend on the same bucket
//! - **Concurrent user join** - first profile wins, orphaned actions are counted and dropped
//! - **Drainable worker pool** - jobs can fan out into more jobs; `drain` waits for all of them
//! - **Failure isolation** - a bad file, row or shard never stops the run
//!
//! ## Quick Start
//!
//! ```no_run
//! use reddit_split::{Config, Orchestrator};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let config = Config::new("/data/reddit", "/scratch/split")
//!     .with_shard_count(1024)
//!     .with_pool_size(8);
//!
//! let summary = Orchestrator::new(config).run()?;
//! summary.print();
//! # Ok(())
//! # }
//! ```
//!
//! ## Output Layout
//!
//! ```text
//! <output>/00000/users
//! <output>/00000/votes
//! ...
//! <output>/01023/subscriptions
//! <output>/joined/00000.tsv
//! ...
//! ```
//!
//! Each `<bucket>/<dataset>` file is a comma-separated file with a header row
//! holding exactly the records of that dataset whose key hashes to the
//! bucket. See [`join_writer`] for the joined format.
//!
//! ## Module Overview
//!
//! - [`dataset`] - Dataset types and directory classification
//! - [`schema`] - Column layouts for each dataset
//! - [`record`] - Typed rows
//! - [`io`] - Delimited file reading and writing, directory listing
//! - [`partition`] - Bucket assignment
//! - [`splitter`] - Per-dataset bucket buffers and flushing
//! - [`join`] - Per-user aggregation
//! - [`join_writer`] - Joined per-user output
//! - [`scheduler`] - Worker pool with a drain barrier
//! - [`orchestrator`] - The four-phase run
//! - [`stats`] - Run counters and the JSON summary
//! - [`testing`] - Export fixtures and output assertions

pub mod config;
pub mod dataset;
pub mod error;
pub mod io;
pub mod join;
pub mod join_writer;
pub mod orchestrator;
pub mod partition;
pub mod record;
pub mod scheduler;
pub mod schema;
pub mod splitter;
pub mod stats;
pub mod testing;

pub use config::{Config, DEFAULT_KEY_COLUMN, DEFAULT_SHARD_COUNT, HeaderMode};
pub use dataset::{DatasetType, classify, classify_name};
pub use error::ConfigError;
pub use join::{AggregatedUser, UserAction, UserJoin, UserProfile};
pub use join_writer::JoinWriter;
pub use orchestrator::Orchestrator;
pub use partition::{Partitioner, assign_bucket};
pub use record::{Record, Value};
pub use scheduler::Scheduler;
pub use schema::{Schema, SchemaRegistry};
pub use splitter::TableSplitter;
pub use stats::{RunStats, RunSummary};
