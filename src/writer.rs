use std::fs;
use std::path::{Path, PathBuf};

use gdal::raster::{Buffer, RasterCreationOption};
use gdal::{Dataset, DriverManager};
use log::{debug, warn};
use ndarray::Array2;

use crate::error::{RasterizeError, Result};
use crate::grid::GridSpec;
use crate::rasterizer::{RasterLayer, NO_DATA};

const GTIFF_DRIVER: &str = "GTiff";

const CREATION_OPTIONS: [RasterCreationOption<'static>; 1] = [RasterCreationOption {
    key: "COMPRESS",
    value: "LZW",
}];

/// `Num Flood/2020` becomes `Num_Flood_2020.tif`
pub fn raster_file_name(column: &str) -> String {
    let stem: String = column
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.tif", stem)
}

/// A raster read back from disk
#[derive(Debug, Clone)]
pub struct WrittenRaster {
    pub layer: RasterLayer,
    pub geo_transform: [f64; 6],
    pub projection: String,
    pub no_data: Option<f64>,
}

fn fill_dataset(mut ds: Dataset, layer: &RasterLayer, grid: &GridSpec) -> gdal::errors::Result<()> {
    ds.set_geo_transform(&grid.geo_transform())?;
    if !grid.crs.is_empty() {
        ds.set_projection(&grid.crs)?;
    }

    let mut band = ds.rasterband(1)?;
    band.set_no_data_value(Some(NO_DATA))?;

    // standard layout is row major, which is what GDAL expects
    let data: Vec<f64> = layer.iter().copied().collect();
    let buffer = Buffer::new((grid.width, grid.height), data);
    band.write((0, 0), (grid.width, grid.height), &buffer)?;

    Ok(())
}

/// Writes `layer` as a single band LZW compressed GeoTIFF.
///
/// A file that could be created but not completely written is removed again.
pub fn write_layer(layer: &RasterLayer, grid: &GridSpec, output_path: &Path) -> Result<()> {
    let fail_io = |e| RasterizeError::from_io(output_path.to_path_buf(), e);
    let fail_gdal = |e| RasterizeError::from_gdal(output_path.to_path_buf(), e);

    let (rows, cols) = layer.dim();
    if (rows, cols) != (grid.height, grid.width) {
        return Err(RasterizeError::Write {
            path: output_path.to_path_buf(),
            reason: format!(
                "layer is {}x{} but the grid is {}x{}",
                cols, rows, grid.width, grid.height
            ),
        });
    }

    if let Some(parent) = output_path.parent() {
        // create_dir_all is fine with the directory appearing concurrently
        fs::create_dir_all(parent).map_err(fail_io)?;
    }

    let driver = DriverManager::get_driver_by_name(GTIFF_DRIVER)?;
    let ds = driver
        .create_with_band_type_with_options::<f64, _>(
            output_path,
            cols as isize,
            rows as isize,
            1,
            &CREATION_OPTIONS,
        )
        .map_err(fail_gdal)?;

    // the dataset is closed when fill_dataset returns
    if let Err(e) = fill_dataset(ds, layer, grid) {
        if let Err(rm) = fs::remove_file(output_path) {
            warn!("Could not remove incomplete {:?}: {}", output_path, rm);
        }
        return Err(fail_gdal(e));
    }

    debug!("Wrote {:?} ({}x{})", output_path, cols, rows);

    Ok(())
}

pub fn read_layer(path: &Path) -> Result<WrittenRaster> {
    let fail_gdal = |e| RasterizeError::from_gdal(path.to_path_buf(), e);

    let ds = Dataset::open(path).map_err(fail_gdal)?;
    let (cols, rows) = ds.raster_size();
    let band = ds.rasterband(1)?;
    let buffer = band.read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)?;

    let layer = Array2::from_shape_vec((rows, cols), buffer.data)?;

    Ok(WrittenRaster {
        layer,
        geo_transform: ds.geo_transform()?,
        projection: ds.projection(),
        no_data: band.no_data_value(),
    })
}

/// `<output>/<Year_xxxx>/<column>.tif`, flat when there is no year directory
pub fn output_path(output_dir: &Path, year_dir: Option<&str>, column: &str) -> PathBuf {
    let mut path = output_dir.to_path_buf();
    if let Some(dir) = year_dir {
        path.push(dir);
    }
    path.push(raster_file_name(column));
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn grid(width: usize, height: usize, crs: &str) -> GridSpec {
        GridSpec {
            origin_x: 100.0,
            origin_y: -2.0,
            pixel_size: 0.25,
            width,
            height,
            crs: crs.to_string(),
        }
    }

    #[test]
    fn mismatched_layer_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Num_Flood.tif");
        let layer = Array2::from_elem((2, 3), 1.0);

        let err = write_layer(&layer, &grid(2, 3, ""), &path).unwrap_err();
        assert!(matches!(err, RasterizeError::Write { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn incomplete_file_is_removed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Num_Flood.tif");
        let layer = Array2::from_elem((2, 3), 1.0);

        // the file is created, then setting the projection fails
        let err = write_layer(&layer, &grid(3, 2, "not a projection"), &path).unwrap_err();
        assert!(!err.is_fatal());
        assert!(!path.exists());

        write_layer(&layer, &grid(3, 2, ""), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_names_are_normalized() {
        assert_eq!(raster_file_name("Num_Flood"), "Num_Flood.tif");
        assert_eq!(raster_file_name("Num Flood/2020"), "Num_Flood_2020.tif");
        assert_eq!(raster_file_name("Banjir (jumlah)"), "Banjir__jumlah_.tif");
        assert_eq!(raster_file_name("Tanah-Longsor"), "Tanah-Longsor.tif");
    }

    #[test]
    fn paths_follow_year_layout() {
        let out = Path::new("/tmp/rasters");
        assert_eq!(
            output_path(out, Some("Year_2001"), "Num_Flood"),
            PathBuf::from("/tmp/rasters/Year_2001/Num_Flood.tif")
        );
        assert_eq!(
            output_path(out, None, "Num_Flood"),
            PathBuf::from("/tmp/rasters/Num_Flood.tif")
        );
    }
}
