use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LightcurveError, Result};
use crate::frame::{Frame, GainChannel};
use crate::io::fits::FitsReader;
use crate::io::rcd::{RcdGeometry, RcdReader};
use crate::io::timestamp::DirectoryClock;
use crate::pipeline::config::SourceConfig;

/// On-disk frame format of a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Packed 12-bit two-gain camera format.
    #[default]
    Rcd,
    /// Uncompressed FITS images.
    Fits,
}

impl FrameFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Rcd => "rcd",
            Self::Fits => "fits",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "rcd" => Some(Self::Rcd),
            "fits" | "fit" | "fts" => Some(Self::Fits),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rcd => write!(f, "RCD"),
            Self::Fits => write!(f, "FITS"),
        }
    }
}

/// List frame files of `format` in `dir`, sorted by name.
///
/// Hidden files (including `._*` resource forks) are skipped.
pub fn discover_frames(dir: &Path, format: FrameFormat) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_none_or(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        if FrameFormat::from_path(&path) == Some(format) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Random-access sequence of decoded frames.
///
/// Implementations must be cheap to read from several threads; frames are
/// decoded on demand and never cached.
pub trait FrameSource: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode frame `index` (uncalibrated).
    fn read_frame(&self, index: usize) -> Result<Frame>;

    /// Display name of frame `index`, used in archived records.
    fn frame_name(&self, index: usize) -> String;
}

/// Frames backed by a list of files in one batch directory.
pub struct FileFrameSource {
    paths: Vec<PathBuf>,
    format: FrameFormat,
    gain: GainChannel,
    geometry: RcdGeometry,
    clock: Option<DirectoryClock>,
    utc_offset_hours: i64,
}

impl FileFrameSource {
    pub fn new(paths: Vec<PathBuf>, config: &SourceConfig, clock: Option<DirectoryClock>) -> Self {
        Self {
            paths,
            format: config.format,
            gain: config.gain,
            geometry: config.geometry(),
            clock,
            utc_offset_hours: config.utc_offset_hours,
        }
    }

    /// All frames of `config.format` in `dir`, with the directory-name clock hint.
    pub fn from_directory(dir: &Path, config: &SourceConfig) -> Result<Self> {
        let paths = discover_frames(dir, config.format)?;
        Ok(Self::new(paths, config, DirectoryClock::from_dir(dir)))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn gain(&self) -> GainChannel {
        self.gain
    }
}

impl FrameSource for FileFrameSource {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn read_frame(&self, index: usize) -> Result<Frame> {
        let path = self
            .paths
            .get(index)
            .ok_or(LightcurveError::FrameIndexOutOfRange {
                index,
                total: self.paths.len(),
            })?;

        let mut frame = match self.format {
            FrameFormat::Rcd => RcdReader::open(path, self.geometry)?.read_frame(
                self.gain,
                self.clock.as_ref(),
                self.utc_offset_hours,
            )?,
            FrameFormat::Fits => FitsReader::open(path)?.read_frame()?,
        };
        frame.metadata.frame_index = index;
        frame.metadata.source_name = Some(self.frame_name(index));
        Ok(frame)
    }

    fn frame_name(&self, index: usize) -> String {
        self.paths
            .get(index)
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
