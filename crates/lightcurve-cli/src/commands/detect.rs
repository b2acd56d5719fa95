use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use lightcurve_core::calibration::load_calibration;
use lightcurve_core::detection::locate_stars;
use lightcurve_core::io::source::{FileFrameSource, FrameSource};
use lightcurve_core::stack::reference::stack_reference;

use super::SourceArgs;

#[derive(Args)]
pub struct DetectArgs {
    /// Batch directory
    pub dir: PathBuf,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Only list the brightest N stars
    #[arg(long)]
    pub limit: Option<usize>,
}

pub fn run(args: &DetectArgs) -> Result<()> {
    let config = args.source.load_config()?;
    let source = FileFrameSource::from_directory(&args.dir, &config.source)
        .with_context(|| format!("Failed to list frames in {}", args.dir.display()))?;
    let calibration = load_calibration(&args.dir, &config).context("Calibration failed")?;
    let reference = stack_reference(&source, &calibration, &config.stacking)?;

    let search = locate_stars(
        reference.as_ref(),
        &source,
        &calibration,
        &config.detection,
        config.photometry.aperture_radius,
        &args.dir,
    )?;

    println!(
        "{} stars in {} after {} attempt(s) ({} frames in batch)",
        search.stars.len(),
        search.origin,
        search.attempts,
        source.len()
    );
    println!();
    println!(
        "{:>5}  {:>9}  {:>9}  {:>6}  {:>5}  {:>12}",
        "#", "x", "y", "radius", "npix", "flux"
    );
    let shown = args.limit.unwrap_or(search.stars.len());
    for (i, star) in search.stars.iter().take(shown).enumerate() {
        println!(
            "{:>5}  {:>9.2}  {:>9.2}  {:>6.2}  {:>5}  {:>12.1}",
            i, star.x, star.y, star.radius, star.npix, star.flux
        );
    }
    Ok(())
}
