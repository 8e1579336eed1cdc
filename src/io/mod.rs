//! I/O modules for introspecting rasters and driving the GDAL tools

pub mod gdalinfo;
pub mod tools;

pub use gdalinfo::RasterInfoParser;
pub use tools::{GdalToolkit, MergeRequest, RasterToolkit, ToolPaths, TranslateRequest};
