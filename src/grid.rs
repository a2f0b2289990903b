use geo::{BoundingRect, Rect};

use crate::error::{RasterizeError, Result};
use crate::loader::Feature;

/// Output grid shared by every layer of one group.
///
/// Pixel (0, 0) is the top left cell, its corner sits at
/// (`origin_x`, `origin_y`) = (min x, max y) of the group's features.
/// Rows grow downward, so the GDAL geo transform has a negative
/// pixel height.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
    pub width: usize,
    pub height: usize,
    /// WKT projection string
    pub crs: String,
}

pub fn check_resolution(resolution: f64) -> Result<()> {
    if resolution.is_finite() && resolution > 0.0 {
        Ok(())
    } else {
        Err(RasterizeError::InvalidResolution(resolution))
    }
}

/// union of the bounding boxes, `None` when there are no coordinates at all
pub fn union_bounds<'a, I>(features: I) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = &'a Feature>,
{
    features
        .into_iter()
        .filter_map(|f| f.geometry.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            )
        })
}

/// Most cells a single grid may hold, one f64 layer of it is 8 GiB
pub const MAX_CELLS: usize = 1 << 30;

fn cells(extent: f64, resolution: f64) -> f64 {
    (extent / resolution).ceil().max(1.0)
}

impl GridSpec {
    pub fn from_bounds(bounds: Rect<f64>, resolution: f64, crs: &str) -> Result<Self> {
        check_resolution(resolution)?;

        let width = cells(bounds.width(), resolution);
        let height = cells(bounds.height(), resolution);
        // also rejects NaN extents
        if !(width * height <= MAX_CELLS as f64) {
            return Err(RasterizeError::GridTooLarge { width, height });
        }

        Ok(GridSpec {
            origin_x: bounds.min().x,
            origin_y: bounds.max().y,
            pixel_size: resolution,
            width: width as usize,
            height: height as usize,
            crs: crs.to_string(),
        })
    }

    pub fn for_features<'a, I>(features: I, resolution: f64, crs: &str, group: &str) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Feature>,
    {
        let bounds = union_bounds(features).ok_or_else(|| RasterizeError::DegenerateBoundingBox {
            group: group.to_string(),
        })?;
        GridSpec::from_bounds(bounds, resolution, crs)
    }

    pub fn geo_transform(&self) -> [f64; 6] {
        [self.origin_x, self.pixel_size, 0.0, self.origin_y, 0.0, -self.pixel_size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square(x0: f64, y0: f64, size: f64) -> Feature {
        Feature::new(MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]]))
    }

    #[test]
    fn origin_is_top_left_and_sizes_round_up() {
        let features = vec![square(100.0, -5.0, 1.0), square(101.0, -4.5, 0.75)];
        let grid = GridSpec::for_features(&features, 0.5, "", "test").unwrap();

        assert_eq!(grid.origin_x, 100.0);
        assert_eq!(grid.origin_y, -3.75);
        // 1.75 / 0.5 = 3.5 -> 4, 1.25 / 0.5 = 2.5 -> 3
        assert_eq!(grid.width, 4);
        assert_eq!(grid.height, 3);
        assert_eq!(grid.geo_transform(), [100.0, 0.5, 0.0, -3.75, 0.0, -0.5]);
    }

    #[test]
    fn exact_multiple_is_not_padded() {
        let grid = GridSpec::for_features(&[square(0.0, 0.0, 2.0)], 0.5, "", "test").unwrap();
        assert_eq!((grid.width, grid.height), (4, 4));
    }

    #[test]
    fn flat_extent_is_one_cell() {
        let flat = Feature::new(MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 0.0),
        ]]));
        let grid = GridSpec::for_features(&[flat], 0.25, "", "test").unwrap();
        assert_eq!((grid.width, grid.height), (1, 1));
    }

    #[test]
    fn empty_group_is_degenerate() {
        let empty: Vec<Feature> = vec![];
        let err = GridSpec::for_features(&empty, 0.5, "", "Year_2001").unwrap_err();
        assert!(matches!(err, RasterizeError::DegenerateBoundingBox { .. }));
    }

    #[test]
    fn resolution_must_be_positive() {
        assert!(check_resolution(0.01).is_ok());
        assert!(check_resolution(0.0).is_err());
        assert!(check_resolution(-1.0).is_err());
        assert!(check_resolution(f64::NAN).is_err());
    }

    #[test]
    fn oversized_grid_is_rejected() {
        // Indonesia's extent
        let bounds = Rect::new((95.0, -11.0), (141.0, 6.0));
        let err = GridSpec::from_bounds(bounds, 1e-9, "").unwrap_err();
        assert!(matches!(err, RasterizeError::GridTooLarge { .. }));
        assert!(!err.is_fatal());

        let grid = GridSpec::from_bounds(bounds, 0.5, "").unwrap();
        assert_eq!((grid.width, grid.height), (92, 34));
    }
}
