use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gdal::vector::{FieldValue, LayerAccess, OGRFieldType};
use gdal::Dataset;
use geo::{Geometry, MultiPolygon, Polygon};
use log::{debug, info, warn};

use crate::error::{RasterizeError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

impl AttributeValue {
    /// Numeric view of the value, `None` for text, null and non finite reals
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::Real(r) if r.is_finite() => Some(*r),
            _ => None,
        }
    }

    fn from_field(value: Option<FieldValue>) -> Self {
        match value {
            Some(FieldValue::IntegerValue(i)) => AttributeValue::Integer(i as i64),
            Some(FieldValue::Integer64Value(i)) => AttributeValue::Integer(i),
            Some(FieldValue::RealValue(r)) => AttributeValue::Real(r),
            Some(FieldValue::StringValue(s)) => AttributeValue::Text(s),
            // dates and lists carry nothing we can burn or group on
            Some(_) | None => AttributeValue::Null,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: MultiPolygon<f64>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Feature {
    pub fn new(geometry: MultiPolygon<f64>) -> Self {
        Feature {
            geometry,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: AttributeValue) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> &AttributeValue {
        self.attributes.get(name).unwrap_or(&AttributeValue::Null)
    }
}

/// Features read once from the source, held read-only for the run
#[derive(Debug, Clone)]
pub struct FeatureCollection {
    pub source: PathBuf,
    pub layer_name: String,
    /// WKT, empty if the layer carries no spatial reference
    pub crs: String,
    pub numeric_columns: Vec<String>,
    pub features: Vec<Feature>,
}

/// Which columns of the source become rasters
#[derive(Debug, Clone, Default)]
pub struct ColumnSelection {
    pub year_column: String,
    pub exclude: Vec<String>,
    pub prefix: Option<String>,
}

impl ColumnSelection {
    pub fn accepts(&self, name: &str) -> bool {
        if name == self.year_column || self.exclude.iter().any(|e| e == name) {
            return false;
        }
        match &self.prefix {
            Some(prefix) => name.starts_with(prefix.as_str()),
            None => true,
        }
    }
}

fn is_numeric_field(field_type: OGRFieldType::Type) -> bool {
    field_type == OGRFieldType::OFTInteger
        || field_type == OGRFieldType::OFTInteger64
        || field_type == OGRFieldType::OFTReal
}

/// Keeps the areal parts of a geometry, `None` if there are none
pub fn to_multi_polygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let polygons: Vec<Polygon<f64>> = match geometry {
        Geometry::Polygon(p) => vec![p],
        Geometry::MultiPolygon(mp) => mp.0,
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => gc
            .0
            .into_iter()
            .filter_map(to_multi_polygon)
            .flat_map(|mp| mp.0)
            .collect(),
        _ => vec![],
    };
    if polygons.is_empty() {
        None
    } else {
        Some(MultiPolygon(polygons))
    }
}

/// Areal part of a feature's geometry, `None` (with a warning) when there is
/// nothing to burn or the geometry type has no `geo` counterpart, e.g. curves
fn convert_geometry(idx: usize, geometry: Option<&gdal::vector::Geometry>) -> Option<MultiPolygon<f64>> {
    let Some(geometry) = geometry else {
        warn!("Feature {} has no geometry, dropping it", idx);
        return None;
    };
    let geometry = match geometry.to_geo() {
        Ok(g) => g,
        Err(e) => {
            warn!("Feature {} has an unsupported geometry, dropping it: {}", idx, e);
            return None;
        }
    };
    let polygons = to_multi_polygon(geometry);
    if polygons.is_none() {
        warn!("Feature {} is not a polygon, dropping it", idx);
    }
    polygons
}

/// reads the polygon features and the attribute table of one layer
pub fn load_features(
    path: &Path,
    layer_name: Option<&str>,
    selection: &ColumnSelection,
) -> Result<FeatureCollection> {
    if !path.exists() {
        return Err(RasterizeError::SourceNotFound(path.to_path_buf()));
    }

    let unsupported = |reason: String| RasterizeError::UnsupportedFormat {
        path: path.to_path_buf(),
        reason,
    };

    let dataset = Dataset::open(path).map_err(|e| unsupported(e.to_string()))?;
    if dataset.layer_count() == 0 {
        return Err(unsupported("no vector layers".to_string()));
    }

    let mut layer = match layer_name {
        Some(name) => dataset
            .layer_by_name(name)
            .map_err(|e| unsupported(format!("layer {name}: {e}")))?,
        None => dataset.layer(0).map_err(|e| unsupported(e.to_string()))?,
    };

    let crs = match layer.spatial_ref() {
        Some(srs) => srs.to_wkt()?,
        None => {
            warn!("Layer {} has no spatial reference", layer.name());
            String::new()
        }
    };

    let field_names: Vec<String> = layer.defn().fields().map(|f| f.name()).collect();
    let numeric_columns: Vec<String> = layer
        .defn()
        .fields()
        .filter(|f| is_numeric_field(f.field_type()))
        .map(|f| f.name())
        .filter(|name| selection.accepts(name))
        .collect();

    info!("Reading layer {} from {:?}", layer.name(), path);
    debug!("Columns: {:?}", field_names);

    let mut features = Vec::new();
    for (idx, gdal_feature) in layer.features().enumerate() {
        let Some(geometry) = convert_geometry(idx, gdal_feature.geometry()) else {
            continue;
        };

        let mut feature = Feature::new(geometry);
        for name in field_names.iter() {
            let value = AttributeValue::from_field(gdal_feature.field(name)?);
            feature.attributes.insert(name.clone(), value);
        }
        features.push(feature);
    }

    if features.is_empty() {
        return Err(RasterizeError::EmptyDataset(path.to_path_buf()));
    }

    info!("Found {} features", features.len());
    info!("Found {} numeric columns to convert:", numeric_columns.len());
    for column in numeric_columns.iter() {
        info!("  - {}", column);
    }

    Ok(FeatureCollection {
        source: path.to_path_buf(),
        layer_name: layer.name(),
        crs,
        numeric_columns,
        features,
    })
}
