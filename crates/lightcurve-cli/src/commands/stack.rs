use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use lightcurve_core::calibration::load_calibration;
use lightcurve_core::io::image_io::save_image;
use lightcurve_core::io::source::{FileFrameSource, FrameSource};
use lightcurve_core::pipeline::config::StackMethod;
use lightcurve_core::stack::reference::stack_reference;

use super::SourceArgs;

#[derive(Clone, Copy, ValueEnum)]
pub enum StackMethodArg {
    Mean,
    Median,
}

impl From<StackMethodArg> for StackMethod {
    fn from(arg: StackMethodArg) -> Self {
        match arg {
            StackMethodArg::Mean => StackMethod::Mean,
            StackMethodArg::Median => StackMethod::Median,
        }
    }
}

#[derive(Args)]
pub struct StackArgs {
    /// Batch directory
    pub dir: PathBuf,

    #[command(flatten)]
    pub source: SourceArgs,

    /// First frame of the stack window
    #[arg(long)]
    pub start: Option<usize>,

    /// Number of frames stacked
    #[arg(long)]
    pub count: Option<usize>,

    /// Stacking method
    #[arg(long, value_enum)]
    pub method: Option<StackMethodArg>,

    /// Output file (.fits, .tiff or .png)
    #[arg(short, long, default_value = "stacked.fits")]
    pub output: PathBuf,
}

pub fn run(args: &StackArgs) -> Result<()> {
    let mut config = args.source.load_config()?;
    if let Some(start) = args.start {
        config.stacking.start = start;
    }
    if let Some(count) = args.count {
        config.stacking.count = count;
    }
    if let Some(method) = args.method {
        config.stacking.method = method.into();
    }

    let source = FileFrameSource::from_directory(&args.dir, &config.source)
        .with_context(|| format!("Failed to list frames in {}", args.dir.display()))?;
    println!("Frames:      {}", source.len());

    let calibration = load_calibration(&args.dir, &config).context("Calibration failed")?;
    let Some(stacked) = stack_reference(&source, &calibration, &config.stacking)? else {
        bail!(
            "Batch has {} frames, too few for a {}-frame stack starting at {}",
            source.len(),
            config.stacking.count,
            config.stacking.start
        );
    };
    println!(
        "Stacked:     frames {}..{} ({})",
        config.stacking.start,
        config.stacking.start + config.stacking.count,
        config.stacking.method
    );

    save_image(&stacked, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("Saved to {}", args.output.display());
    Ok(())
}
