use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{LevelFilter, error};
use reddit_split::{Config, ConfigError, DEFAULT_KEY_COLUMN, DEFAULT_SHARD_COUNT, HeaderMode, Orchestrator};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "reddit-split")]
#[command(about = "Partition Reddit user-action exports by user id and join each user's history")]
#[command(version)]
struct Cli {
    /// Directory holding one subdirectory per dataset
    input: PathBuf,

    /// Directory receiving the bucketed output
    output: PathBuf,

    /// Number of buckets per dataset
    #[arg(short = 'n', long, default_value_t = DEFAULT_SHARD_COUNT)]
    num_splits: usize,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short = 'p', long)]
    pool_size: Option<usize>,

    /// Column to partition on
    #[arg(long = "on", default_value = DEFAULT_KEY_COLUMN)]
    key_column: String,

    /// How to treat the first row of each input file
    #[arg(long, value_enum, default_value_t = HeaderArg::Auto)]
    header: HeaderArg,

    /// Only split; skip the per-user join
    #[arg(long)]
    no_join: bool,

    /// Save the run summary as JSON
    #[arg(long, value_name = "FILE")]
    stats: Option<PathBuf>,

    /// Log progress
    #[arg(short, long)]
    verbose: bool,

    /// Log everything, including per-file and orphan details
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum HeaderArg {
    Auto,
    Present,
    Absent,
}

impl From<HeaderArg> for HeaderMode {
    fn from(arg: HeaderArg) -> Self {
        match arg {
            HeaderArg::Auto => HeaderMode::Auto,
            HeaderArg::Present => HeaderMode::Present,
            HeaderArg::Absent => HeaderMode::Absent,
        }
    }
}

impl Cli {
    fn level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else if self.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }

    fn into_config(self) -> Config {
        let mut config = Config::new(self.input, self.output)
            .with_shard_count(self.num_splits)
            .with_key_column(self.key_column)
            .with_header(self.header.into())
            .with_join_output(!self.no_join);
        if let Some(n) = self.pool_size {
            config = config.with_pool_size(n);
        }
        if let Some(path) = self.stats {
            config = config.with_stats_file(path);
        }
        config
    }
}

fn init_logging(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn run(cli: Cli) -> Result<bool> {
    let summary = Orchestrator::new(cli.into_config()).run()?;
    summary.print();
    Ok(!summary.has_io_failures())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.level());

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("finished with I/O failures; see the summary above");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e:#}");
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
