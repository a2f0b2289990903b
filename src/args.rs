use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use gpkg_rasterize::{default_output_dir, CoverageRule, RasterizeConfig, DEFAULT_YEAR_COLUMN};

#[derive(Debug, clap::Parser)]
#[clap(author, version, about)]
pub struct RasterizeCliArgs {
    /// the GeoPackage (or any OGR readable vector file) with the regency polygons
    #[clap(default_value = "disaster_per_regency.gpkg")]
    pub input: PathBuf,

    /// output directory, defaults to rasters_by_year/ (or rasters/ with --no-year-split)
    /// next to the input
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// pixel size in degrees
    #[clap(short, long, default_value_t = 0.01)]
    pub resolution: f64,

    /// columns that are never rasterized even if numeric
    #[clap(short, long, num_args = 0.., default_values_t = ["geometry".to_string(), "Year".to_string(), "KDPKAB".to_string()])]
    pub exclude: Vec<String>,

    /// write one raster per column covering all years, overlapping polygons
    /// of different years overwrite each other
    #[clap(long)]
    pub no_year_split: bool,

    /// merge the years into N periods of consecutive years, written to Period_<first>_<last>/
    #[clap(long, value_name = "N", conflicts_with = "no_year_split")]
    pub year_groups: Option<NonZeroUsize>,

    /// layer to read, defaults to the first layer
    #[clap(long)]
    pub layer: Option<String>,

    /// attribute holding the year of a feature
    #[clap(long, default_value = DEFAULT_YEAR_COLUMN)]
    pub year_column: String,

    /// only rasterize numeric columns starting with this prefix, e.g. Num_
    #[clap(long)]
    pub column_prefix: Option<String>,

    /// burn every pixel a polygon touches instead of the pixels whose centre it covers
    #[clap(long)]
    pub all_touched: bool,

    /// number of rasters written in parallel
    #[clap(short, long, default_value_t = 1)]
    pub jobs: usize,

    #[clap(long, default_value = "Info")]
    pub log_level: LevelFilter,
}

impl RasterizeCliArgs {
    pub fn to_config(&self) -> RasterizeConfig {
        let split_by_year = !self.no_year_split;
        let output_dir = self
            .output
            .clone()
            .unwrap_or_else(|| default_output_dir(&self.input, split_by_year));

        let mut config = RasterizeConfig::new(&self.input, &output_dir);
        config.layer = self.layer.clone();
        config.resolution = self.resolution;
        config.year_column = self.year_column.clone();
        config.exclude = self.exclude.clone();
        config.column_prefix = self.column_prefix.clone();
        config.split_by_year = split_by_year;
        config.year_groups = self.year_groups.map(NonZeroUsize::get);
        config.coverage = if self.all_touched {
            CoverageRule::AllTouched
        } else {
            CoverageRule::PixelCenter
        };
        config.jobs = self.jobs.max(1);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = RasterizeCliArgs::parse_from(["gpkg_rasterize"]);
        let config = args.to_config();
        assert_eq!(config.input, PathBuf::from("disaster_per_regency.gpkg"));
        assert_eq!(config.output_dir, PathBuf::from("rasters_by_year"));
        assert_eq!(config.resolution, 0.01);
        assert_eq!(config.exclude, vec!["geometry", "Year", "KDPKAB"]);
        assert!(config.split_by_year);
        assert_eq!(config.coverage, CoverageRule::PixelCenter);
        assert_eq!(config.year_groups, None);
        assert_eq!(args.log_level, LevelFilter::Info);
    }

    #[test]
    fn year_groups() {
        let args = RasterizeCliArgs::parse_from(["gpkg_rasterize", "--year-groups", "3"]);
        assert_eq!(args.to_config().year_groups, Some(3));

        assert!(RasterizeCliArgs::try_parse_from(["gpkg_rasterize", "--year-groups", "0"]).is_err());
        assert!(RasterizeCliArgs::try_parse_from([
            "gpkg_rasterize",
            "--year-groups",
            "3",
            "--no-year-split"
        ])
        .is_err());
    }

    #[test]
    fn flags() {
        let args = RasterizeCliArgs::parse_from([
            "gpkg_rasterize",
            "data/regency.gpkg",
            "--no-year-split",
            "-r",
            "0.05",
            "--exclude",
            "Num_Flood",
            "KDPKAB",
            "--all-touched",
            "-j",
            "4",
        ]);
        let config = args.to_config();
        assert_eq!(config.output_dir, PathBuf::from("data/rasters"));
        assert_eq!(config.resolution, 0.05);
        assert_eq!(config.exclude, vec!["Num_Flood", "KDPKAB"]);
        assert!(!config.split_by_year);
        assert_eq!(config.coverage, CoverageRule::AllTouched);
        assert_eq!(config.jobs, 4);
    }
}
