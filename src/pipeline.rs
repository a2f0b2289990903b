use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use itertools::Itertools;
use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::error::{RasterizeError, Result};
use crate::grid::{check_resolution, GridSpec};
use crate::loader::{load_features, ColumnSelection, FeatureCollection};
use crate::partition::{group_years, partition_by_year, YearGroup};
use crate::rasterizer::{burn_column, CoverageRule};
use crate::writer::{output_path, write_layer};

pub const DEFAULT_RESOLUTION: f64 = 0.01;
pub const DEFAULT_YEAR_COLUMN: &str = "Year";

/// Everything one run needs, independent of how it was parsed
#[derive(Debug, Clone)]
pub struct RasterizeConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub layer: Option<String>,
    pub resolution: f64,
    pub year_column: String,
    pub exclude: Vec<String>,
    pub column_prefix: Option<String>,
    pub split_by_year: bool,
    /// merge the years into this many periods of consecutive years
    pub year_groups: Option<usize>,
    pub coverage: CoverageRule,
    pub jobs: usize,
}

impl RasterizeConfig {
    pub fn new(input: &Path, output_dir: &Path) -> Self {
        RasterizeConfig {
            input: input.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            layer: None,
            resolution: DEFAULT_RESOLUTION,
            year_column: DEFAULT_YEAR_COLUMN.to_string(),
            exclude: vec![],
            column_prefix: None,
            split_by_year: true,
            year_groups: None,
            coverage: CoverageRule::PixelCenter,
            jobs: 1,
        }
    }

    pub fn column_selection(&self) -> ColumnSelection {
        ColumnSelection {
            year_column: self.year_column.clone(),
            exclude: self.exclude.clone(),
            prefix: self.column_prefix.clone(),
        }
    }
}

/// `rasters_by_year` (or `rasters` without the year split) next to the input
pub fn default_output_dir(input: &Path, split_by_year: bool) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    parent.join(if split_by_year { "rasters_by_year" } else { "rasters" })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn merge(self, other: RunSummary) -> RunSummary {
        RunSummary {
            written: self.written + other.written,
            skipped: self.skipped + other.skipped,
            failed: self.failed + other.failed,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rasters written, {} skipped, {} failed",
            self.written, self.skipped, self.failed
        )
    }
}

/// One (group, column) unit of work
struct RasterJob<'a> {
    group: &'a YearGroup,
    grid: &'a GridSpec,
    column: &'a str,
    path: PathBuf,
}

fn run_job(collection: &FeatureCollection, config: &RasterizeConfig, job: &RasterJob) -> RunSummary {
    debug!("Converting {} for {}", job.column, job.group.key);

    let written = burn_column(
        &collection.features,
        &job.group.members,
        job.grid,
        job.column,
        config.coverage,
    )
    .and_then(|layer| write_layer(&layer, job.grid, &job.path));

    match written {
        Ok(()) => {
            info!("Created raster: {:?}", job.path);
            RunSummary { written: 1, ..Default::default() }
        }
        Err(e) => {
            error!(
                "Error creating raster for {} ({}) at {:?}: {}",
                job.column, job.group.key, job.path, e
            );
            RunSummary { failed: 1, ..Default::default() }
        }
    }
}

/// Rasterizes an already loaded collection, one file per (group, column)
pub fn rasterize_collection(collection: &FeatureCollection, config: &RasterizeConfig) -> Result<RunSummary> {
    check_resolution(config.resolution)?;

    let mut groups = partition_by_year(collection, &config.year_column, config.split_by_year);
    if let (true, Some(count)) = (config.split_by_year, config.year_groups) {
        groups = group_years(groups, count);
    }
    let mut summary = RunSummary::default();

    let mut grids = Vec::with_capacity(groups.len());
    for group in groups.iter() {
        let label = group.key.to_string();
        let members = group.members.iter().map(|&i| &collection.features[i]);
        match GridSpec::for_features(members, config.resolution, &collection.crs, &label) {
            Ok(grid) => {
                info!(
                    "{}: {} features, {}x{} pixels",
                    label,
                    group.members.len(),
                    grid.width,
                    grid.height
                );
                grids.push((group, grid));
            }
            Err(e @ RasterizeError::DegenerateBoundingBox { .. }) => {
                warn!("Skipping {}: {}", label, e);
                summary.skipped += collection.numeric_columns.len();
            }
            Err(e @ RasterizeError::GridTooLarge { .. }) => {
                error!("Cannot rasterize {}: {}", label, e);
                summary.failed += collection.numeric_columns.len();
            }
            Err(e) => return Err(e),
        }
    }

    let jobs = grids
        .iter()
        .cartesian_product(collection.numeric_columns.iter())
        .map(|(&(group, ref grid), column)| {
            let year_dir = group.key.dir_name();
            RasterJob {
                group,
                grid,
                column: column.as_str(),
                path: output_path(&config.output_dir, year_dir.as_deref(), column),
            }
        })
        .collect_vec();

    info!("Converting {} rasters", jobs.len());

    let done = if config.jobs > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.jobs)
            .build()?;
        pool.install(|| {
            jobs.par_iter()
                .map(|job| run_job(collection, config, job))
                .reduce(RunSummary::default, RunSummary::merge)
        })
    } else {
        jobs.iter()
            .map(|job| run_job(collection, config, job))
            .fold(RunSummary::default(), RunSummary::merge)
    };

    Ok(summary.merge(done))
}

/// Loads the input once and writes every raster
pub fn run(config: &RasterizeConfig) -> Result<RunSummary> {
    let now = Instant::now();
    check_resolution(config.resolution)?;

    let collection = load_features(&config.input, config.layer.as_deref(), &config.column_selection())?;
    if !collection.crs.is_empty() {
        debug!("CRS: {}", collection.crs);
    }

    let summary = rasterize_collection(&collection, config)?;

    info!(
        "Conversion complete in {:.1}s, rasters saved to {:?}: {}",
        now.elapsed().as_secs_f64(),
        config.output_dir,
        summary
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{AttributeValue, Feature};
    use geo::{polygon, MultiPolygon};
    use tempfile::TempDir;

    fn square(size: f64, year: i64) -> Feature {
        Feature::new(MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: size, y: 0.0),
            (x: size, y: size),
            (x: 0.0, y: size),
        ]]))
        .with_attribute("Year", AttributeValue::Integer(year))
        .with_attribute("Num_Flood", AttributeValue::Integer(2))
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection {
            source: PathBuf::from("test.gpkg"),
            layer_name: "test".to_string(),
            crs: String::new(),
            numeric_columns: vec!["Num_Flood".to_string()],
            features,
        }
    }

    #[test]
    fn default_output_follows_mode() {
        let input = Path::new("/data/disaster_per_regency.gpkg");
        assert_eq!(
            default_output_dir(input, true),
            PathBuf::from("/data/rasters_by_year")
        );
        assert_eq!(default_output_dir(input, false), PathBuf::from("/data/rasters"));
        assert_eq!(
            default_output_dir(Path::new("regency.gpkg"), true),
            PathBuf::from("rasters_by_year")
        );
    }

    #[test]
    fn summaries_add_up() {
        let a = RunSummary { written: 2, skipped: 1, failed: 0 };
        let b = RunSummary { written: 1, skipped: 0, failed: 3 };
        assert_eq!(a.merge(b), RunSummary { written: 3, skipped: 1, failed: 3 });
        assert_eq!(a.to_string(), "2 rasters written, 1 skipped, 0 failed");
    }

    #[test]
    fn oversized_group_fails_alone() {
        let tmp = TempDir::new().unwrap();
        let c = collection(vec![square(1.0, 2001), square(1e5, 2002)]);

        let summary = rasterize_collection(&c, &RasterizeConfig::new(&c.source, tmp.path())).unwrap();
        assert_eq!(summary, RunSummary { written: 1, skipped: 0, failed: 1 });
        assert!(tmp.path().join("Year_2001").join("Num_Flood.tif").exists());
        assert!(!tmp.path().join("Year_2002").exists());
    }

    #[test]
    fn year_periods_share_a_directory() {
        let tmp = TempDir::new().unwrap();
        let c = collection(vec![square(1.0, 2001), square(0.5, 2002), square(0.5, 2003)]);
        let mut config = RasterizeConfig::new(&c.source, tmp.path());
        config.year_groups = Some(2);

        let summary = rasterize_collection(&c, &config).unwrap();
        assert_eq!(summary.written, 2);
        assert!(tmp.path().join("Period_2001_2002").join("Num_Flood.tif").exists());
        assert!(tmp.path().join("Period_2003_2003").join("Num_Flood.tif").exists());
    }
}
