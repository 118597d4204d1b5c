use crate::config::ReplicatorConfig;
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ts-replicator")]
#[command(about = "Replicate time series from one project into another", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Source project snapshot (JSON)
    pub source: PathBuf,

    /// Destination project snapshot (JSON), updated in place
    pub destination: PathBuf,

    /// TOML config file; flags below override its values
    #[arg(short, long, env = "TS_REPLICATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Largest number of records per create/update call
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Number of chunks replicated concurrently
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Delete replicas whose source record no longer exists
    #[arg(long)]
    pub delete_stale: bool,

    /// Delete destination records that were not replicated (destructive)
    #[arg(long)]
    pub delete_unreplicated: bool,

    /// Attempts per create/update call before giving up
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Write the run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Defaults, then the config file, then flags.
    pub fn resolve_config(&self) -> Result<ReplicatorConfig> {
        let mut config = match &self.config {
            Some(path) => ReplicatorConfig::load(path)?,
            None => ReplicatorConfig::default(),
        };

        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config.num_workers = workers;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        config.delete_replicated_if_not_in_src |= self.delete_stale;
        config.delete_not_replicated_in_dst |= self.delete_unreplicated;

        config.validate()?;
        Ok(config)
    }

    /// Default log directive when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}
