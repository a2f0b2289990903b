//! Burns attribute values of polygons into a grid.
//!
//! The geometries are handed to GDAL's rasterizer together with an in-memory
//! dataset that carries the grid's geo transform, so both coverage rules are
//! GDAL's own. [`CoverageRule::PixelCenter`] burns a cell when its centre
//! falls inside the polygon, holes excluded. [`CoverageRule::AllTouched`]
//! (`ALL_TOUCHED=TRUE`) burns every cell the polygon's interior or outline
//! passes through.
use gdal::raster::{rasterize, RasterizeOptions};
use gdal::vector::{Geometry, ToGdal};
use gdal::DriverManager;
use log::debug;
use ndarray::Array2;

use crate::error::Result;
use crate::grid::GridSpec;
use crate::loader::Feature;

const MEM_DRIVER: &str = "MEM";

/// Value of cells no geometry covers
pub const NO_DATA: f64 = 0.0;

pub type RasterLayer = Array2<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoverageRule {
    #[default]
    PixelCenter,
    AllTouched,
}

pub fn empty_layer(grid: &GridSpec) -> RasterLayer {
    Array2::from_elem((grid.height, grid.width), NO_DATA)
}

/// Burns `geometries[i]` with `values[i]`, in order, so the last geometry
/// covering a cell decides its value
pub fn burn_geometries(
    grid: &GridSpec,
    geometries: &[Geometry],
    values: &[f64],
    rule: CoverageRule,
) -> Result<RasterLayer> {
    if geometries.is_empty() {
        return Ok(empty_layer(grid));
    }

    let (cols, rows) = (grid.width, grid.height);
    let driver = DriverManager::get_driver_by_name(MEM_DRIVER)?;
    // MEM bands start zeroed, which is NO_DATA
    let mut ds = driver.create_with_band_type::<f64, _>("", cols as isize, rows as isize, 1)?;
    ds.set_geo_transform(&grid.geo_transform())?;

    let options = RasterizeOptions {
        all_touched: rule == CoverageRule::AllTouched,
        ..Default::default()
    };
    rasterize(&mut ds, &[1], geometries, values, Some(options))?;

    let band = ds.rasterband(1)?;
    let buffer = band.read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)?;
    Ok(Array2::from_shape_vec((rows, cols), buffer.data)?)
}

/// Rasterizes one numeric column of the `members` of a group.
///
/// Features are burned in the order of `members`, a later feature overwrites
/// the cells it shares with earlier ones. Features with a null value for the
/// column are left out.
pub fn burn_column(
    features: &[Feature],
    members: &[usize],
    grid: &GridSpec,
    column: &str,
    rule: CoverageRule,
) -> Result<RasterLayer> {
    let mut geometries = Vec::with_capacity(members.len());
    let mut values = Vec::with_capacity(members.len());

    for &idx in members {
        let feature = &features[idx];
        let Some(value) = feature.attribute(column).as_f64() else {
            continue;
        };
        geometries.push(feature.geometry.to_gdal()?);
        values.push(value);
    }

    debug!("Burning {} of {} features for {}", values.len(), members.len(), column);
    burn_geometries(grid, &geometries, &values, rule)
}
