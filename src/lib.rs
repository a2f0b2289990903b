//! # gpkg_rasterize
//!
//! `gpkg_rasterize` is a crate that turns polygon statistics stored in a GeoPackage,
//! such as disaster counts per regency and year, into GeoTIFF rasters.
//! Every numeric column becomes one raster, and by default every year gets its own
//! directory so polygons of different years never overwrite each other.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use gpkg_rasterize::{run, RasterizeConfig};
//!
//! let mut config = RasterizeConfig::new(
//!     Path::new("disaster_per_regency.gpkg"),
//!     Path::new("output/rasters_by_year"),
//! );
//! config.resolution = 0.01;
//! config.exclude = vec!["KDPKAB".to_string()];
//!
//! let summary = run(&config).unwrap();
//! println!("{}", summary);
//! ```
//!
//! ## Usage
//! ### rust api
//! The crate follows the steps of one run:
//!
//! - `load_features`: reads the features and picks the numeric columns.
//! - `partition_by_year`: groups the features by their year attribute.
//! - `GridSpec::for_features`: computes the grid covering one group.
//! - `burn_column`: burns the values of one column into that grid with GDAL's rasterizer.
//! - `write_layer`: writes the result as an LZW compressed GeoTIFF.
//!
//! `run` chains them and reports how many rasters were written, skipped and failed.
//!
//! ### Command line
//! the clap framework is used to provide a command line interface for the crate.
//!```zsh
//! cargo run --release -- disaster_per_regency.gpkg -o rasters -r 0.01
//!```
//! writes `rasters/Year_<year>/<column>.tif`, `--no-year-split` writes
//! `rasters/<column>.tif` instead and `--year-groups 3` merges the years into
//! three `rasters/Period_<first>_<last>/` directories. Run with `-h` for all options.
//!
//! ## Installation
//! gdal must be installed and the path environment variable must be set to the gdal binaries.
//! build using
//!```zsh
//! cargo build --release
//! cargo install --path .
//! ```
pub mod error;
pub mod grid;
pub mod loader;
pub mod partition;
pub mod pipeline;
pub mod rasterizer;
pub mod writer;

pub use error::{RasterizeError, Result};
pub use grid::{GridSpec, MAX_CELLS};
pub use loader::{load_features, AttributeValue, ColumnSelection, Feature, FeatureCollection};
pub use partition::{group_years, partition_by_year, YearGroup, YearKey};
pub use pipeline::{
    default_output_dir, rasterize_collection, run, RasterizeConfig, RunSummary, DEFAULT_RESOLUTION,
    DEFAULT_YEAR_COLUMN,
};
pub use rasterizer::{burn_column, burn_geometries, CoverageRule, RasterLayer, NO_DATA};
pub use writer::{read_layer, write_layer, WrittenRaster};
