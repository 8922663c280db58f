//! Testing utilities for reddit-split runs.
//!
//! This module lets tests (and downstream users) build small exports on disk,
//! run them, and check the bucketed output without hand-writing paths:
//!
//! - **Fixtures**: [`ExportBuilder`] lays out `<tmp>/input/<dataset>/<file>`
//!   trees in a temporary directory, plus sample rows for every dataset
//! - **Assertions**: read shard and joined files back, and verify that
//!   every row sits in the bucket its key hashes to
//!
//! # Quick Start
//!
//! ```no_run
//! use reddit_split::Orchestrator;
//! use reddit_split::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let export = ExportBuilder::new()?
//!     .dataset("users", &sample_users())?
//!     .dataset("votes", &sample_votes())?;
//!
//! let summary = Orchestrator::new(export.config(4)).run()?;
//! assert_eq!(summary.io_failures.len(), 0);
//! assert_partitioned(&export.output(), 4, reddit_split::DatasetType::Vote)?;
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
