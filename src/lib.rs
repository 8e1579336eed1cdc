//! gio-mosaic: georeferencing and global mosaicking of GIO product tiles
//!
//! Tiles are HDF5 containers holding one subdataset per biophysical
//! variable. Each subdataset is georeferenced from the tile metadata, and
//! the per-tile outputs of every subdataset are merged into a global mosaic.

pub mod types;
pub mod io;
pub mod core;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    GeoBounds, GeoTransform, GioError, GioResult, MergeMetadata, MetadataValue, RasterInfo,
    TileGroup, TypedMetadata, OUTPUT_CRS,
};

pub use crate::core::{compute_bounds, MetadataTypeCoercer, TileGrouper};
pub use io::{GdalToolkit, RasterInfoParser, RasterToolkit};
pub use pipeline::{PipelineConfig, TimeslotProcessor};
