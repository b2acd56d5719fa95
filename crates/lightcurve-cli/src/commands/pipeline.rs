use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use lightcurve_core::pipeline::{discover_batches, run_batches};
use tracing::info;

use super::SourceArgs;
use crate::progress::BatchProgress;
use crate::summary::{print_batch_reports, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Batch directories, or directories containing batch subdirectories
    #[arg(required = true)]
    pub dirs: Vec<PathBuf>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Telescope name written into each record
    #[arg(long)]
    pub telescope: Option<String>,

    /// Also save each batch's reference stack as FITS
    #[arg(long)]
    pub save_reference: bool,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config = args.source.load_config()?;
    if let Some(ref telescope) = args.telescope {
        config.archive.telescope = telescope.clone();
    }
    if args.save_reference {
        config.archive.save_reference = true;
    }

    let mut batches = Vec::new();
    for dir in &args.dirs {
        let found = discover_batches(dir, config.source.format)
            .with_context(|| format!("Failed to scan {}", dir.display()))?;
        info!(root = %dir.display(), batches = found.len(), "Discovered batches");
        batches.extend(found);
    }
    if batches.is_empty() {
        bail!("No {} frames found under the given directories", config.source.format);
    }

    print_run_summary(&config, &batches, &args.output);

    let progress = BatchProgress::new()?;
    let reports = run_batches(&batches, &config, &args.output, &progress);
    progress.finish();

    print_batch_reports(&reports);

    if reports.iter().all(|r| r.outcome.is_err()) {
        bail!("Every batch failed");
    }
    Ok(())
}
