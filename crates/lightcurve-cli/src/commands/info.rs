use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use lightcurve_core::frame::Frame;
use lightcurve_core::io::fits::FitsReader;
use lightcurve_core::io::rcd::{RcdGeometry, RcdReader};
use lightcurve_core::io::source::FrameFormat;
use lightcurve_core::io::timestamp::DirectoryClock;

use super::GainArg;

#[derive(Args)]
pub struct InfoArgs {
    /// Input frame file (.rcd or .fits)
    pub file: PathBuf,

    /// Gain channel to decode from packed frames
    #[arg(long, value_enum, default_value = "high")]
    pub gain: GainArg,

    /// Hours added to the directory clock when repairing a bad header hour
    #[arg(long, default_value = "4")]
    pub utc_offset: i64,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let format = FrameFormat::from_path(&args.file)
        .with_context(|| format!("Unknown frame format: {}", args.file.display()))?;

    println!("File:        {}", args.file.display());
    println!("Format:      {}", format);

    let frame = match format {
        FrameFormat::Rcd => {
            let reader = RcdReader::open(&args.file, RcdGeometry::default())?;
            let clock = args.file.parent().and_then(DirectoryClock::from_dir);
            println!("Serial:      {}", reader.header.serial_number);
            println!("Raw time:    {}", reader.header.timestamp_raw);
            println!("Payload:     {} bytes", reader.payload().len());
            reader.read_frame(args.gain.into(), clock.as_ref(), args.utc_offset)?
        }
        FrameFormat::Fits => {
            let reader = FitsReader::open(&args.file)?;
            if let Some(bitpix) = reader.key_i64("BITPIX") {
                println!("BITPIX:      {}", bitpix);
            }
            reader.read_frame()?
        }
    };

    print_frame(&frame)
}

fn print_frame(frame: &Frame) -> Result<()> {
    if frame.data.is_empty() {
        bail!("Frame has no pixels");
    }
    println!("Dimensions:  {}x{}", frame.width(), frame.height());
    println!("Bit depth:   {}", frame.original_bit_depth);
    if let Some(gain) = frame.metadata.gain {
        println!("Gain:        {}", gain);
    }
    match &frame.metadata.timestamp {
        Some(ts) if ts.is_heuristic() => {
            println!("Timestamp:   {} (repaired: {:?})", ts.time, ts.correction)
        }
        Some(ts) => println!("Timestamp:   {}", ts.time),
        None => println!("Timestamp:   none"),
    }

    let (min, max) = frame
        .data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let mean = frame.data.iter().map(|&v| v as f64).sum::<f64>() / frame.data.len() as f64;
    println!("Range:       {:.0} .. {:.0} ADU (mean {:.1})", min, max, mean);
    Ok(())
}
