//! JSON configuration and reports, and frame directory listing.

use pianotrack_align::{
    CornerFit, CornerOrdering, CornerSearchMode, MatcherParams, RefinerParams, StabilizerParams,
    UnavailableReason,
};
use pianotrack_core::Homography;
use pianotrack_template::KeyboardSpec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File extensions `FrameSource` picks up, compared case-insensitively.
pub const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: invalid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[cfg(feature = "image")]
    #[error("{path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Template(#[from] pianotrack_template::TemplateError),
    #[error(transparent)]
    Buffer(#[from] pianotrack_core::ImageError),
}

impl IoError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("frame stride must be at least 1")]
    ZeroStride,
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, IoError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| IoError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize to pretty JSON and write it, replacing any existing file.
pub fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), IoError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|e| IoError::io(path, e))
}

/// Where the keyboard template comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    Synthesize(KeyboardSpec),
    File(PathBuf),
}

impl Default for TemplateSource {
    fn default() -> Self {
        Self::Synthesize(KeyboardSpec::default())
    }
}

/// Everything `calibrate` and `track` can be tuned with.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub template: TemplateSource,
    pub matcher: MatcherParams,
    pub stabilizer: StabilizerParams,
    pub refiner: RefinerParams,
    pub corner_search: CornerSearchMode,
    /// Process every n-th frame.
    pub every: usize,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            template: TemplateSource::default(),
            matcher: MatcherParams::default(),
            stabilizer: StabilizerParams::default(),
            refiner: RefinerParams::default(),
            corner_search: CornerSearchMode::default(),
            every: 1,
        }
    }
}

impl TrackConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let cfg: Self = read_json(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        write_json(self, path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.every == 0 {
            return Err(ConfigError::ZeroStride);
        }
        Ok(())
    }
}

/// Output of the `calibrate` command, also the input of `track --homography`.
///
/// This file format belongs to the CLI; the library APIs only exchange
/// `Homography` values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Frame-to-template transform, row-major.
    pub homography: [[f64; 3]; 3],
    pub ordering: CornerOrdering,
    pub distance: f64,
    pub mode: CornerSearchMode,
    pub template_size: [usize; 2],
}

impl CalibrationReport {
    pub fn new(fit: &CornerFit, mode: CornerSearchMode, template_size: [usize; 2]) -> Self {
        Self {
            homography: fit.homography.to_array(),
            ordering: fit.ordering,
            distance: fit.distance,
            mode,
            template_size,
        }
    }

    pub fn homography(&self) -> Homography {
        Homography::from_array(self.homography)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    Aligned,
    Unavailable,
}

/// One processed frame of a `track` run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub frame: usize,
    pub path: String,
    pub status: FrameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homography: Option<[[f64; 3]; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
    /// Feature matches used for the motion estimate.
    pub matches: usize,
    pub inliers: usize,
    /// Photometric cost after refinement, when the refiner ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default)]
    pub anchor_reset: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackReport {
    pub frames: Vec<FrameEntry>,
}

impl TrackReport {
    pub fn aligned(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.status == FrameStatus::Aligned)
            .count()
    }
}

/// The image files of a directory in name order, standing in for a video.
#[derive(Clone, Debug)]
pub struct FrameSource {
    paths: Vec<PathBuf>,
}

impl FrameSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, IoError> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| IoError::io(dir, e))? {
            let path = entry.map_err(|e| IoError::io(dir, e))?.path();
            if path.is_file() && is_frame_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        log::debug!("{}: {} frames", dir.display(), paths.len());
        Ok(Self { paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// `(frame index, path)` for every `every`-th frame, starting at 0.
    pub fn every(&self, every: usize) -> impl Iterator<Item = (usize, &Path)> + '_ {
        self.paths
            .iter()
            .enumerate()
            .step_by(every.max(1))
            .map(|(i, p)| (i, p.as_path()))
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| FRAME_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}
