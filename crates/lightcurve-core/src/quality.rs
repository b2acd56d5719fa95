//! Light-curve statistics and the accept/reject gate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pipeline::config::QualityConfig;

/// Outcome of [`classify`]. Every series is archived regardless.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityVerdict {
    /// No samples at all.
    Empty,
    /// Median flux of zero, usually a star that left the frame early.
    TooShort,
    /// The flux level at the end differs from the start by more than the
    /// early scatter.
    TrackingFailure,
    LowSnr,
    Good,
}

impl QualityVerdict {
    pub fn is_good(self) -> bool {
        self == Self::Good
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::TooShort => "TOO_SHORT",
            Self::TrackingFailure => "TRACKING_FAILURE",
            Self::LowSnr => "LOW_SNR",
            Self::Good => "GOOD",
        }
    }

    /// Inverse of [`label`](Self::label).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "EMPTY" => Some(Self::Empty),
            "TOO_SHORT" => Some(Self::TooShort),
            "TRACKING_FAILURE" => Some(Self::TrackingFailure),
            "LOW_SNR" => Some(Self::LowSnr),
            "GOOD" => Some(Self::Good),
            _ => None,
        }
    }
}

impl fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary statistics of a flux series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LightCurveStats {
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub snr: f64,
}

impl LightCurveStats {
    pub fn from_flux(flux: &[f64]) -> Self {
        if flux.is_empty() {
            return Self::default();
        }
        let median = median(flux);
        let (_, std_dev) = mean_std(flux);
        Self {
            median,
            std_dev,
            snr: snr(median, std_dev),
        }
    }
}

fn snr(median: f64, std_dev: f64) -> f64 {
    if std_dev > 0.0 {
        median / std_dev
    } else if median > 0.0 {
        f64::INFINITY
    } else if median < 0.0 {
        f64::NEG_INFINITY
    } else {
        0.0
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Classify a flux series. The first failing check wins.
pub fn classify(flux: &[f64], config: &QualityConfig) -> QualityVerdict {
    if flux.is_empty() {
        return QualityVerdict::Empty;
    }

    let stats = LightCurveStats::from_flux(flux);
    if stats.median == 0.0 {
        return QualityVerdict::TooShort;
    }

    let n = config.frames_per_minute.clamp(1, flux.len());
    let (head_mean, head_std) = mean_std(&flux[..n]);
    let (tail_mean, _) = mean_std(&flux[flux.len() - n..]);
    if (head_mean - tail_mean).abs() > head_std {
        return QualityVerdict::TrackingFailure;
    }

    if stats.snr < config.min_snr {
        return QualityVerdict::LowSnr;
    }

    QualityVerdict::Good
}
