use std::io;
use std::path::PathBuf;

use gdal::errors::GdalError;
use ndarray::ShapeError;
use rayon::ThreadPoolBuildError;
use thiserror::Error;

use crate::grid::MAX_CELLS;

/// `ENOSPC` on linux and macOS
const NO_SPACE_LEFT: i32 = 28;

pub type Result<T> = std::result::Result<T, RasterizeError>;

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("input file {0:?} not found")]
    SourceNotFound(PathBuf),

    #[error("cannot read {path:?} as a vector data source: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("no features with a polygon geometry in {0:?}")]
    EmptyDataset(PathBuf),

    #[error("cannot build a grid for group {group}: no geometries")]
    DegenerateBoundingBox { group: String },

    #[error("resolution must be a positive number of degrees, got {0}")]
    InvalidResolution(f64),

    #[error("a grid of {width}x{height} cells exceeds the limit of {} cells, use a coarser resolution", MAX_CELLS)]
    GridTooLarge { width: f64, height: f64 },

    #[error("cannot start the worker pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),

    #[error("permission denied writing {0:?}")]
    WritePermission(PathBuf),

    #[error("no space left on device writing {0:?}")]
    DiskFull(PathBuf),

    #[error("failed to write {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error(transparent)]
    Gdal(#[from] GdalError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl RasterizeError {
    /// Fatal errors abort the whole run, everything else is isolated to one
    /// group or one output file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RasterizeError::SourceNotFound(_)
                | RasterizeError::UnsupportedFormat { .. }
                | RasterizeError::EmptyDataset(_)
                | RasterizeError::InvalidResolution(_)
                | RasterizeError::ThreadPool(_)
        )
    }

    pub(crate) fn from_io(path: PathBuf, e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::PermissionDenied {
            RasterizeError::WritePermission(path)
        } else if e.raw_os_error() == Some(NO_SPACE_LEFT) {
            RasterizeError::DiskFull(path)
        } else {
            RasterizeError::Write {
                path,
                reason: e.to_string(),
            }
        }
    }

    /// GDAL only reports the failing errno through its message text
    pub(crate) fn from_gdal(path: PathBuf, e: GdalError) -> Self {
        let reason = e.to_string();
        let lower = reason.to_lowercase();
        if lower.contains("permission denied") {
            RasterizeError::WritePermission(path)
        } else if lower.contains("no space left") || lower.contains("disk full") {
            RasterizeError::DiskFull(path)
        } else {
            RasterizeError::Write { path, reason }
        }
    }
}
