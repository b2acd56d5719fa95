pub mod config;
pub mod detect;
pub mod info;
pub mod pipeline;
pub mod stack;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use lightcurve_core::frame::GainChannel;
use lightcurve_core::io::source::FrameFormat;
use lightcurve_core::pipeline::config::PipelineConfig;

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Rcd,
    Fits,
}

impl From<FormatArg> for FrameFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Rcd => FrameFormat::Rcd,
            FormatArg::Fits => FrameFormat::Fits,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GainArg {
    Low,
    High,
}

impl From<GainArg> for GainChannel {
    fn from(arg: GainArg) -> Self {
        match arg {
            GainArg::Low => GainChannel::Low,
            GainArg::High => GainChannel::High,
        }
    }
}

/// Options shared by every command that reads a batch.
#[derive(Args)]
pub struct SourceArgs {
    /// Pipeline config file (TOML); flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Frame file format
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Gain channel of packed frames
    #[arg(long, value_enum)]
    pub gain: Option<GainArg>,

    /// Detection threshold in sigma above background
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Aperture radius in pixels
    #[arg(long)]
    pub aperture: Option<f64>,

    /// Also read Dark/ and Flat/ calibration frames
    #[arg(long)]
    pub dark_flat: bool,
}

impl SourceArgs {
    /// Load the config file (or defaults) and apply command-line overrides.
    pub fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)
                .with_context(|| format!("Invalid pipeline config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(format) = self.format {
            config.source.format = format.into();
        }
        if let Some(gain) = self.gain {
            config.source.gain = gain.into();
        }
        if let Some(threshold) = self.threshold {
            config.detection.threshold_sigma = threshold;
        }
        if let Some(aperture) = self.aperture {
            config.photometry.aperture_radius = aperture;
        }
        if self.dark_flat {
            config.calibration.use_dark_flat = true;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
