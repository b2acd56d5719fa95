//! Plain-text light-curve records.
//!
//! One file per star: a commented header block followed by one row per frame
//! (`filename elapsed_seconds flux x_drift y_drift`).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{LightcurveError, Result};
use crate::frame::GainChannel;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::types::BatchResult;
use crate::quality::{LightCurveStats, QualityVerdict};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveHeader {
    pub first_image: String,
    /// Detected position of the star.
    pub star_x: f64,
    pub star_y: f64,
    /// UTC time of the first frame, if known.
    pub date_obs: Option<String>,
    pub telescope: String,
    pub field: String,
    pub verdict: Option<QualityVerdict>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveRow {
    pub filename: String,
    /// Seconds since the first frame; NaN when the frame had no timestamp.
    pub elapsed: f64,
    pub flux: f64,
    pub x_drift: f64,
    pub y_drift: f64,
}

/// A record as stored on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct ArchivedLightCurve {
    pub header: ArchiveHeader,
    pub rows: Vec<ArchiveRow>,
}

impl ArchivedLightCurve {
    pub fn flux(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.flux).collect()
    }

    /// Statistics recomputed from the stored flux column.
    pub fn stats(&self) -> LightCurveStats {
        LightCurveStats::from_flux(&self.flux())
    }
}

/// `<gain>_<threshold>sig_lightcurves`
pub fn light_curve_dir_name(gain: GainChannel, threshold_sigma: f32) -> String {
    format!("{gain}_{threshold_sigma}sig_lightcurves")
}

/// `star<index>_<batch>_<telescope>_<x>-<y>.txt` with truncated coordinates.
pub fn light_curve_file_name(star: usize, batch: &str, telescope: &str, x: f64, y: f64) -> String {
    format!("star{star}_{batch}_{telescope}_{}-{}.txt", x as i64, y as i64)
}

pub fn write_light_curve<W: Write>(writer: &mut W, record: &ArchivedLightCurve) -> Result<()> {
    let h = &record.header;
    writeln!(writer, "#\n#\n#\n#")?;
    writeln!(writer, "#    First Image File: {}", h.first_image)?;
    writeln!(writer, "#    Star Coords: {:.6} {:.6}", h.star_x, h.star_y)?;
    writeln!(
        writer,
        "#    DATE-OBS (UTC): {}",
        h.date_obs.as_deref().unwrap_or("unknown")
    )?;
    writeln!(writer, "#    Telescope: {}", h.telescope)?;
    writeln!(writer, "#    Field: {}", h.field)?;
    match h.verdict {
        Some(v) => writeln!(writer, "#    Quality: {v}")?,
        None => writeln!(writer, "#    Quality: unknown")?,
    }
    writeln!(writer, "#\n#\n#")?;
    writeln!(writer, "#filename     time      flux      x_drift     y_drift")?;
    for row in &record.rows {
        writeln!(
            writer,
            "{} {:.6}  {:.6}  {:.6}  {:.6}",
            row.filename, row.elapsed, row.flux, row.x_drift, row.y_drift
        )?;
    }
    Ok(())
}

/// Parse a record written by [`write_light_curve`].
pub fn parse_light_curve<R: BufRead>(reader: R) -> Result<ArchivedLightCurve> {
    let mut header = ArchiveHeader {
        first_image: String::new(),
        star_x: f64::NAN,
        star_y: f64::NAN,
        date_obs: None,
        telescope: String::new(),
        field: String::new(),
        verdict: None,
    };
    let mut rows = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix('#') {
            let Some((key, value)) = comment.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "First Image File" => header.first_image = value.to_string(),
                "Star Coords" => {
                    let mut parts = value.split_whitespace().map(str::parse::<f64>);
                    match (parts.next(), parts.next()) {
                        (Some(Ok(x)), Some(Ok(y))) => {
                            header.star_x = x;
                            header.star_y = y;
                        }
                        _ => return Err(bad_line(lineno, "star coordinates")),
                    }
                }
                "DATE-OBS (UTC)" => {
                    header.date_obs = (value != "unknown").then(|| value.to_string());
                }
                "Telescope" => header.telescope = value.to_string(),
                "Field" => header.field = value.to_string(),
                "Quality" => header.verdict = QualityVerdict::from_label(value),
                _ => {}
            }
            continue;
        }
        rows.push(parse_row(trimmed).ok_or_else(|| bad_line(lineno, "data row"))?);
    }

    Ok(ArchivedLightCurve { header, rows })
}

fn parse_row(line: &str) -> Option<ArchiveRow> {
    // Numbers are the last four fields; the file name takes the rest.
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return None;
    }
    let (name, numbers) = fields.split_at(fields.len() - 4);
    let parse = |i: usize| numbers[i].parse::<f64>().ok();
    Some(ArchiveRow {
        filename: name.join(" "),
        elapsed: parse(0)?,
        flux: parse(1)?,
        x_drift: parse(2)?,
        y_drift: parse(3)?,
    })
}

fn bad_line(lineno: usize, what: &str) -> LightcurveError {
    LightcurveError::Format(format!("Malformed {what} on line {}", lineno + 1))
}

pub fn read_light_curve(path: &Path) -> Result<ArchivedLightCurve> {
    let file = File::open(path)?;
    parse_light_curve(BufReader::new(file))
}

/// Build the on-disk record for every star of a batch, in star order.
pub fn batch_records(result: &BatchResult, telescope: &str) -> Vec<ArchivedLightCurve> {
    let origin = result.timestamps.iter().flatten().next().copied();
    let date_obs = result
        .timestamps
        .first()
        .copied()
        .flatten()
        .map(|t| t.time.format(TIMESTAMP_FORMAT).to_string());
    let first_image = result.frame_names.first().cloned().unwrap_or_default();
    let field = first_image
        .split('_')
        .next()
        .unwrap_or_default()
        .to_string();

    let elapsed: Vec<f64> = result
        .timestamps
        .iter()
        .map(|t| match (t, &origin) {
            (Some(t), Some(o)) => t.seconds_since(o),
            _ => f64::NAN,
        })
        .collect();

    result
        .light_curves
        .iter()
        .map(|lc| {
            let rows = lc
                .samples
                .iter()
                .enumerate()
                .map(|(i, sample)| {
                    let drift = result.drift.get(i).copied().unwrap_or_default();
                    ArchiveRow {
                        filename: result.frame_names.get(i).cloned().unwrap_or_default(),
                        elapsed: elapsed.get(i).copied().unwrap_or(f64::NAN),
                        flux: sample.flux,
                        x_drift: drift.dx,
                        y_drift: drift.dy,
                    }
                })
                .collect();
            ArchivedLightCurve {
                header: ArchiveHeader {
                    first_image: first_image.clone(),
                    star_x: lc.star.initial.x,
                    star_y: lc.star.initial.y,
                    date_obs: date_obs.clone(),
                    telescope: telescope.to_string(),
                    field: field.clone(),
                    verdict: Some(lc.verdict),
                },
                rows,
            }
        })
        .collect()
}

/// Write every star of `result` into
/// `<output>/<gain>_<threshold>sig_lightcurves/` and return that directory.
pub fn write_batch(output: &Path, result: &BatchResult, config: &PipelineConfig) -> Result<PathBuf> {
    let dir = output.join(light_curve_dir_name(
        result.gain,
        config.detection.threshold_sigma,
    ));
    std::fs::create_dir_all(&dir)?;

    let telescope = &config.archive.telescope;
    for (lc, record) in result
        .light_curves
        .iter()
        .zip(batch_records(result, telescope))
    {
        let name = light_curve_file_name(
            lc.star.index,
            &result.name,
            telescope,
            record.header.star_x,
            record.header.star_y,
        );
        let mut writer = BufWriter::new(File::create(dir.join(name))?);
        write_light_curve(&mut writer, &record)?;
        writer.flush()?;
    }

    info!(
        stars = result.star_count(),
        dir = %dir.display(),
        "Light curves written"
    );
    Ok(dir)
}
