use chrono::{DateTime, Datelike, Utc};
use geo::{Coord, LineString, Polygon};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sample type for every band once it leaves the store (raw DNs are widened)
pub type Sample = f64;

/// 2D band data (rows x cols). Masked or no-data pixels are NaN.
pub type BandData = Array2<Sample>;

/// Geospatial bounding box in the scene CRS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Affine pixel-to-world transformation, GDAL ordering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform with square pixels
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// World coordinate of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        (
            self.top_left_x + c * self.pixel_width + r * self.rotation_x,
            self.top_left_y + c * self.rotation_y + r * self.pixel_height,
        )
    }

    /// Transform shifted to start at pixel (row, col)
    pub fn offset(&self, row: usize, col: usize) -> Self {
        let (x, y) = (
            self.top_left_x + col as f64 * self.pixel_width + row as f64 * self.rotation_x,
            self.top_left_y + col as f64 * self.rotation_y + row as f64 * self.pixel_height,
        );
        Self {
            top_left_x: x,
            top_left_y: y,
            ..*self
        }
    }

    /// Nominal ground sample distance (absolute pixel width)
    pub fn resolution(&self) -> f64 {
        self.pixel_width.abs()
    }
}

/// A single georeferenced band
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub data: BandData,
    pub geo_transform: GeoTransform,
}

impl Raster {
    pub fn new(data: BandData, geo_transform: GeoTransform) -> Self {
        Self { data, geo_transform }
    }

    /// (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Apply `f` to every sample, keeping the georeference
    pub fn map(&self, f: impl Fn(Sample) -> Sample) -> Raster {
        Raster {
            data: self.data.mapv(f),
            geo_transform: self.geo_transform,
        }
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

/// Fixed polygon every reduction, clip and footprint test is evaluated against
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    polygon: Polygon<f64>,
}

impl AreaOfInterest {
    /// Build from an exterior ring. The ring is closed automatically and must
    /// have at least three distinct vertices and no self-intersections.
    pub fn from_ring(ring: &[[f64; 2]]) -> LstResult<Self> {
        let coords: Vec<Coord<f64>> = ring.iter().map(|p| Coord { x: p[0], y: p[1] }).collect();
        let polygon = Polygon::new(LineString::from(coords), vec![]);
        Self::from_polygon(polygon)
    }

    pub fn from_polygon(polygon: Polygon<f64>) -> LstResult<Self> {
        crate::core::geometry::validate_ring(polygon.exterior())?;
        Ok(Self { polygon })
    }

    /// Axis-aligned rectangle
    pub fn from_bounds(bbox: &BoundingBox) -> LstResult<Self> {
        Self::from_ring(&[
            [bbox.min_x, bbox.min_y],
            [bbox.max_x, bbox.min_y],
            [bbox.max_x, bbox.max_y],
            [bbox.min_x, bbox.max_y],
        ])
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn bounds(&self) -> BoundingBox {
        crate::core::geometry::ring_bounds(self.polygon.exterior())
    }

    /// Exterior ring as plain coordinate pairs (closed)
    pub fn ring(&self) -> Vec<[f64; 2]> {
        self.polygon.exterior().coords().map(|c| [c.x, c.y]).collect()
    }
}

/// Scene metadata as delivered by the raster store
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMetadata {
    pub id: String,
    pub acquired: DateTime<Utc>,
    pub footprint: Polygon<f64>,
    /// Scene-wide cloud cover in percent as reported by the provider
    pub scene_cloud_cover: Option<f64>,
    pub spacecraft: String,
}

impl SceneMetadata {
    pub fn month(&self) -> u32 {
        self.acquired.month()
    }

    pub fn year(&self) -> i32 {
        self.acquired.year()
    }
}

/// Scene with its bands loaded. Immutable once retrieved.
#[derive(Debug, Clone)]
pub struct Scene {
    pub metadata: SceneMetadata,
    pub bands: HashMap<String, Raster>,
    /// AOI cloud fraction in [0,1] computed by the cloud mask evaluator
    pub cloud_fraction: Option<f64>,
}

impl Scene {
    pub fn band(&self, name: &str) -> LstResult<&Raster> {
        self.bands.get(name).ok_or_else(|| {
            LstError::Metadata(format!("Scene {} has no band {}", self.metadata.id, name))
        })
    }
}

/// Scene whose optical and thermal bands are in physical units
#[derive(Debug, Clone)]
pub struct CalibratedScene {
    pub metadata: SceneMetadata,
    pub bands: HashMap<String, Raster>,
    pub cloud_fraction: Option<f64>,
}

impl CalibratedScene {
    pub fn band(&self, name: &str) -> LstResult<&Raster> {
        self.bands.get(name).ok_or_else(|| {
            LstError::Metadata(format!("Scene {} has no band {}", self.metadata.id, name))
        })
    }

    /// AOI cloud cover in percent
    pub fn cloud_pct(&self) -> Option<f64> {
        self.cloud_fraction.map(|f| f * 100.0)
    }
}

/// Collection-wide display range of a derived band, in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalRange {
    /// Floor-clamped minimum
    pub min: f64,
    pub max: f64,
    /// Minimum before the floor was applied
    pub computed_min: f64,
    /// True when the default bounds were substituted
    pub fallback: bool,
}

/// One export job, built once per retained scene and consumed once by the submitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDescriptor {
    pub name: String,
    pub scene_id: String,
    pub description: String,
    pub file_name_prefix: String,
    pub output_band: String,
    pub folder: String,
    pub region: BoundingBox,
    pub scale: f64,
    pub crs: String,
    pub max_pixels: f64,
    pub file_format: String,
}

/// Error types for LST processing
#[derive(Debug, thiserror::Error)]
pub enum LstError {
    #[error("No scenes left after filtering: {0}")]
    EmptyResult(String),

    #[error("Region reduction produced no value: {0}")]
    ReductionUnavailable(String),

    #[error("External service unavailable: {0}")]
    TransientService(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for LST operations
pub type LstResult<T> = Result<T, LstError>;
