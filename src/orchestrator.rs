//! Wires discovery, splitting and the user join into one run.
//!
//! A run has four phases separated by [`Scheduler::drain`] barriers:
//!
//! 1. **Profiles**: every `users` directory is split, and each profile is
//!    upserted into the [`UserJoin`].
//! 2. **Actions**: every other typed directory is split, and each action is
//!    appended to its user. Profiles must be complete first, or actions would
//!    be dropped as orphans.
//! 3. **Flush**: one job per dataset writes its `shard_count` bucket files.
//!    All ingestion has drained, so no splitter is flushed while being fed.
//! 4. **Join output** (optional): one job per bucket writes the joined users.
//!
//! Directory jobs list their files and submit one job per file. Failures in
//! a job are recorded and logged; they never stop the run.
//!
//! # Example
//!
//! ```no_run
//! use reddit_split::{Config, Orchestrator};
//!
//! let config = Config::new("/data/reddit", "/scratch/split").with_shard_count(64);
//! let summary = Orchestrator::new(config).run()?;
//! summary.print();
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::config::Config;
use crate::dataset::{DatasetType, classify};
use crate::error::ConfigError;
use crate::io::delimited::RecordReader;
use crate::io::discovery::{list_dirs, list_files};
use crate::join::{ActionLayout, Append, TIMESTAMP, Upsert, UserJoin, UserProfile};
use crate::join_writer::JoinWriter;
use crate::partition::{Partitioner, shard_dir};
use crate::scheduler::Scheduler;
use crate::schema::SchemaRegistry;
use crate::splitter::TableSplitter;
use crate::stats::{RunStats, RunSummary, Stage};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How records of one dataset feed the join.
enum JoinRole {
    Profile,
    Action(ActionLayout),
    None,
}

/// Per-dataset state shared by that dataset's jobs.
struct DatasetJob {
    dataset: DatasetType,
    dirs: Vec<PathBuf>,
    splitter: TableSplitter,
    role: JoinRole,
}

/// State shared by every job in a run.
struct RunContext {
    config: Config,
    join: UserJoin,
    stats: RunStats,
}

pub struct Orchestrator {
    config: Config,
    registry: SchemaRegistry,
}

impl Orchestrator {
    /// Orchestrator using the Reddit schemas.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, SchemaRegistry::reddit())
    }

    #[must_use]
    pub fn with_registry(config: Config, registry: SchemaRegistry) -> Self {
        Self { config, registry }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute the whole run.
    ///
    /// # Returns
    /// The run summary. I/O failures inside jobs do not make this fail; check
    /// [`RunSummary::has_io_failures`].
    ///
    /// # Errors
    /// Only fatal startup problems: invalid configuration, a missing schema,
    /// an unlistable input root or an unusable output directory.
    pub fn run(self) -> Result<RunSummary> {
        let Self { config, registry } = self;
        config.validate()?;
        let partitioner = Partitioner::new(config.shard_count)?;

        info!("Input: {}", config.input_dir.display());
        info!("Output: {}", config.output_dir.display());
        info!(
            "Shards: {}, pool size: {}, key: {}",
            config.shard_count, config.pool_size, config.key_column
        );

        let stats = RunStats::new();
        let groups = discover(&config.input_dir, &stats)?;
        let jobs = plan(&config, &registry, partitioner, groups)?;
        prepare_output(&config.output_dir, partitioner)?;
        let scheduler = Scheduler::new(config.pool_size)?;

        let ctx = Arc::new(RunContext {
            config,
            join: UserJoin::new(),
            stats,
        });
        let (profiles, actions): (Vec<_>, Vec<_>) = jobs
            .into_iter()
            .map(Arc::new)
            .partition(|j| j.dataset == DatasetType::User);

        if profiles.is_empty() && ctx.config.join_output {
            error!(
                "no user data found in {}; every action will be orphaned",
                ctx.config.input_dir.display()
            );
        }

        info!("Phase 1: splitting user profiles");
        for job in &profiles {
            submit_dataset(&scheduler, &ctx, job);
        }
        scheduler.drain();
        info!("Profiles joined: {}", ctx.join.len());

        info!("Phase 2: splitting user actions");
        for job in &actions {
            submit_dataset(&scheduler, &ctx, job);
        }
        scheduler.drain();
        if ctx.join.orphans() > 0 {
            info!("Dropped {} orphaned actions", ctx.join.orphans());
        }

        info!("Phase 3: flushing shards");
        for job in profiles.iter().chain(actions.iter()) {
            let ctx = Arc::clone(&ctx);
            let job = Arc::clone(job);
            scheduler.submit(format!("flush {}", job.dataset), move || flush_dataset(&ctx, &job));
        }
        scheduler.drain();
        drop(profiles);
        drop(actions);

        if ctx.config.join_output {
            info!("Phase 4: writing joined users");
            let width = join_width(&registry, &ctx.config.key_column);
            let writer = Arc::new(JoinWriter::new(&ctx.config.output_dir, width));
            for (bucket, users) in ctx.join.take_buckets(partitioner).into_iter().enumerate() {
                let ctx = Arc::clone(&ctx);
                let writer = Arc::clone(&writer);
                scheduler.submit(format!("join bucket {bucket}"), move || {
                    let path = writer.path_for(bucket);
                    writer.write_bucket(bucket, &users).map(drop).inspect_err(|e| {
                        ctx.stats.record_io_failure(path, Stage::Join, format!("{e:#}"));
                    })
                });
            }
            scheduler.drain();
        }

        if scheduler.failed() > 0 {
            warn!("{} jobs failed", scheduler.failed());
        }

        let summary = ctx.stats.summary();
        if let Some(path) = &ctx.config.stats_file
            && let Err(e) = summary.save_to_file(path)
        {
            error!("could not save run summary: {e:#}");
        }
        info!(
            "Done: {} files, {} records, {} I/O failures",
            summary.files_processed,
            summary.total_ingested(),
            summary.io_failures.len()
        );
        Ok(summary)
    }
}

/// Classify the input root's subdirectories, grouping them by dataset type.
fn discover(input_dir: &Path, stats: &RunStats) -> Result<BTreeMap<DatasetType, Vec<PathBuf>>> {
    let mut groups: BTreeMap<DatasetType, Vec<PathBuf>> = BTreeMap::new();
    for dir in list_dirs(input_dir)? {
        match classify(&dir) {
            DatasetType::Unknown => {
                stats.record_unknown_path();
                warn!("Unknown data set type: {}", dir.display());
            }
            dataset => {
                debug!("{} -> {dataset}", dir.display());
                groups.entry(dataset).or_default().push(dir);
            }
        }
    }
    Ok(groups)
}

/// Resolve schemas and build one splitter per discovered dataset type.
/// Everything that can be fatal happens here, before any job runs.
fn plan(
    config: &Config,
    registry: &SchemaRegistry,
    partitioner: Partitioner,
    groups: BTreeMap<DatasetType, Vec<PathBuf>>,
) -> Result<Vec<DatasetJob>> {
    let key = config.key_column.as_str();
    registry.validate_key(key, groups.keys().copied())?;
    let mut jobs = Vec::with_capacity(groups.len());
    for (dataset, dirs) in groups {
        let schema = registry.schema_for(dataset)?;
        let role = match dataset {
            _ if !config.join_output => JoinRole::None,
            DatasetType::User => JoinRole::Profile,
            _ => {
                let layout = ActionLayout::new(dataset, schema, key)
                    .ok_or_else(|| missing(dataset, TIMESTAMP))?;
                JoinRole::Action(layout)
            }
        };
        let splitter = TableSplitter::new(dataset, schema.clone(), key, partitioner)?;
        jobs.push(DatasetJob {
            dataset,
            dirs,
            splitter,
            role,
        });
    }
    Ok(jobs)
}

fn missing(dataset: DatasetType, column: &str) -> ConfigError {
    ConfigError::MissingKeyColumn {
        dataset,
        column: column.to_string(),
    }
}

/// Joined-row param columns: enough for the widest registered action type.
fn join_width(registry: &SchemaRegistry, key: &str) -> usize {
    DatasetType::KNOWN
        .into_iter()
        .filter(|d| d.is_action())
        .filter_map(|d| ActionLayout::new(d, registry.schema_for(d).ok()?, key))
        .map(|layout| layout.param_width())
        .max()
        .unwrap_or(0)
}

/// Create every bucket directory up front so empty buckets still exist.
fn prepare_output(output_dir: &Path, partitioner: Partitioner) -> Result<()> {
    create_dir_all(output_dir).with_context(|| format!("mkdir -p {}", output_dir.display()))?;
    for bucket in 0..partitioner.shard_count() {
        let dir = shard_dir(output_dir, bucket);
        if dir.is_file() {
            return Err(ConfigError::OutputIsAFile(dir).into());
        }
        create_dir_all(&dir).with_context(|| format!("mkdir -p {}", dir.display()))?;
    }
    Ok(())
}

/// Submit one directory job per input directory of `job`'s dataset.
fn submit_dataset(scheduler: &Scheduler, ctx: &Arc<RunContext>, job: &Arc<DatasetJob>) {
    for dir in &job.dirs {
        info!("Processing data set: {}", dir.display());
        let (s, ctx, job, dir) = (scheduler.clone(), Arc::clone(ctx), Arc::clone(job), dir.clone());
        scheduler.submit(format!("list {}", dir.display()), move || {
            let files = list_files(&dir).inspect_err(|e| {
                ctx.stats.record_io_failure(&dir, Stage::Discover, format!("{e:#}"));
            })?;
            debug!("{}: {} files", dir.display(), files.len());
            for file in files {
                let (ctx, job) = (Arc::clone(&ctx), Arc::clone(&job));
                s.submit(format!("split {}", file.display()), move || {
                    process_file(&ctx, &job, &file).inspect_err(|e| {
                        ctx.stats.record_io_failure(&file, Stage::Read, format!("{e:#}"));
                    })
                });
            }
            Ok(())
        });
    }
}

/// Stream one file into its dataset's splitter and, if joining, into the
/// user map.
fn process_file(ctx: &RunContext, job: &DatasetJob, path: &Path) -> Result<()> {
    debug!("Processing: {}", path.display());
    let schema = job.splitter.schema();
    let key = ctx.config.key_column.as_str();
    let mut reader = RecordReader::open(path, schema, ctx.config.header)?;
    let mut ingested = 0u64;
    let mut outcome = Ok(());

    for record in reader.by_ref() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                outcome = Err(e);
                break;
            }
        };
        match &job.role {
            JoinRole::Profile => match UserProfile::from_record(schema, &record, key) {
                Some(profile) => match ctx.join.upsert_profile(profile) {
                    Upsert::Created => ctx.stats.record_profile(),
                    Upsert::Duplicate => ctx.stats.record_duplicate_user(),
                },
                None => warn!("{}: profile row without required columns", path.display()),
            },
            JoinRole::Action(layout) => {
                if let Some((user, action)) = layout.action(&record) {
                    match ctx.join.append_action(&user, action) {
                        Append::Appended => ctx.stats.record_action(),
                        Append::Orphaned => ctx.stats.record_orphan(),
                    }
                }
            }
            JoinRole::None => {}
        }
        job.splitter.ingest(record);
        ingested += 1;
    }

    ctx.stats.record_file();
    ctx.stats.record_rows(ingested + reader.malformed(), reader.malformed());
    ctx.stats.record_ingested(job.dataset, ingested);
    debug!(
        "Processed: {} ({ingested} records, {} malformed)",
        path.display(),
        reader.malformed()
    );
    outcome
}

/// Flush one dataset's splitter, recording every failed shard.
fn flush_dataset(ctx: &RunContext, job: &DatasetJob) -> Result<()> {
    let report = job.splitter.flush(&ctx.config.output_dir)?;
    for _ in &report.written {
        ctx.stats.record_shard_written();
    }
    for failure in &report.failed {
        ctx.stats
            .record_io_failure(&failure.path, Stage::Flush, format!("{:#}", failure.error));
    }
    info!(
        "Flushed {}: {} records in {} shards ({} failed)",
        job.dataset,
        report.rows_written(),
        report.written.len(),
        report.failed.len()
    );
    Ok(())
}
