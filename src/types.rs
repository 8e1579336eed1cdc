use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Raw key/value metadata as reported by the introspection tool
pub type Attributes = BTreeMap<String, String>;

/// Typed key/value metadata for one scope (file, subdataset or band)
pub type TypedScope = BTreeMap<String, MetadataValue>;

/// Spatial reference assigned to every georeferenced output
pub const OUTPUT_CRS: &str = "EPSG:4326";

/// A named raster layer embedded in a container file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdatasetInfo {
    /// Full path usable to introspect the subdataset on its own
    pub path: String,
    pub attributes: Attributes,
}

/// Parsed introspection output for one raster (file or subdataset)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterInfo {
    pub attributes: Attributes,
    pub subdatasets: BTreeMap<String, SubdatasetInfo>,
    /// 1-based band index -> band attributes (BLOCK_X, BLOCK_Y, DATA_TYPE, NODATA_VALUE)
    pub bands: BTreeMap<u32, Attributes>,
    /// (width, height) in pixels, (0, 0) when not reported
    pub size: (usize, usize),
}

impl RasterInfo {
    /// True when nothing at all was recognised in the text
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
            && self.subdatasets.is_empty()
            && self.bands.is_empty()
            && self.size == (0, 0)
    }
}

/// A coerced metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl MetadataValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            MetadataValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Text(v) => write!(f, "{}", v),
            MetadataValue::Integer(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::Timestamp(v) => write!(f, "{}", v.format("%Y%m%d%H%M")),
        }
    }
}

/// Typed subdataset scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedSubdataset {
    pub path: String,
    pub attributes: TypedScope,
}

/// RasterInfo after type coercion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypedMetadata {
    pub attributes: TypedScope,
    pub subdatasets: BTreeMap<String, TypedSubdataset>,
    pub bands: BTreeMap<u32, TypedScope>,
    pub size: (usize, usize),
}

impl TypedMetadata {
    /// First integer value of `field`: file scope, then subdatasets by name, then bands
    pub fn find_integer(&self, field: &str) -> Option<i64> {
        self.scopes().find_map(|scope| scope.get(field).and_then(MetadataValue::as_integer))
    }

    pub fn require_integer(&self, field: &str, operation: &str) -> GioResult<i64> {
        self.find_integer(field)
            .ok_or_else(|| GioError::missing(field, operation))
    }

    pub fn require_float(&self, field: &str, operation: &str) -> GioResult<f64> {
        self.attributes
            .get(field)
            .and_then(MetadataValue::as_float)
            .ok_or_else(|| GioError::missing(field, operation))
    }

    pub fn require_text(&self, field: &str, operation: &str) -> GioResult<&str> {
        self.attributes
            .get(field)
            .and_then(MetadataValue::as_text)
            .ok_or_else(|| GioError::missing(field, operation))
    }

    pub fn require_timestamp(&self, field: &str, operation: &str) -> GioResult<DateTime<Utc>> {
        self.attributes
            .get(field)
            .and_then(MetadataValue::as_timestamp)
            .ok_or_else(|| GioError::missing(field, operation))
    }

    /// All scopes in search order: file, subdatasets by name, bands by index
    fn scopes(&self) -> impl Iterator<Item = &TypedScope> {
        std::iter::once(&self.attributes)
            .chain(self.subdatasets.values().map(|sd| &sd.attributes))
            .chain(self.bands.values())
    }
}

/// Affine geotransform in GDAL order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

/// Georeferencing envelope of a raster, pixel edges, degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub upper_left_lon: f64,
    pub upper_left_lat: f64,
    pub lower_right_lon: f64,
    pub lower_right_lat: f64,
}

/// Metadata shared by every member of a tile group and used to name the mosaic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeMetadata {
    pub product: String,
    pub timestamp: DateTime<Utc>,
    pub missing_value: i64,
    pub scaling_factor: Option<i64>,
}

/// Per-tile outputs sharing one subdataset identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGroup {
    pub key: String,
    /// Member paths in input order
    pub members: Vec<PathBuf>,
    /// Taken from the first member
    pub metadata: MergeMetadata,
}

/// Error types for tile georeferencing and mosaicking
#[derive(Debug, thiserror::Error)]
pub enum GioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Cannot coerce field {field} value {value:?}: {reason}")]
    MetadataType {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Cannot derive a tile group from {path}")]
    TileNaming { path: PathBuf },

    #[error("Field {field} is required by {operation} but was not found")]
    RequiredFieldMissing { field: String, operation: String },

    #[error("Group {key}: {member} does not match the first member ({detail})")]
    InconsistentGroup {
        key: String,
        member: PathBuf,
        detail: String,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    Tool {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GioError {
    pub fn missing(field: &str, operation: &str) -> Self {
        GioError::RequiredFieldMissing {
            field: field.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn metadata_type(field: &str, value: &str, reason: impl Into<String>) -> Self {
        GioError::MetadataType {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for tile processing operations
pub type GioResult<T> = Result<T, GioError>;
