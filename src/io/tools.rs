use crate::types::{GeoBounds, GioError, GioResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Command, Output};

/// Georeferencing request for one subdataset
#[derive(Debug, Clone, PartialEq)]
pub struct TranslateRequest {
    pub source: String,
    pub output: PathBuf,
    pub bounds: GeoBounds,
    pub crs: String,
    pub nodata: i64,
}

/// Mosaic request for one tile group
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRequest {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub nodata: i64,
}

/// External raster tools used by the processing pipeline
pub trait RasterToolkit: Sync {
    /// Raw introspection text for a file or subdataset path
    fn info(&self, path: &str) -> GioResult<String>;

    /// Write a georeferenced copy of a subdataset
    fn translate(&self, request: &TranslateRequest) -> GioResult<()>;

    /// Merge georeferenced tiles into one mosaic
    fn merge(&self, request: &MergeRequest) -> GioResult<()>;
}

/// Executable names for the GDAL command line utilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub gdalinfo: String,
    pub gdal_translate: String,
    pub gdal_merge: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            gdalinfo: "gdalinfo".to_string(),
            gdal_translate: "gdal_translate".to_string(),
            gdal_merge: "gdal_merge.py".to_string(),
        }
    }
}

/// Toolkit backed by the GDAL command line utilities
#[derive(Debug, Clone, Default)]
pub struct GdalToolkit {
    paths: ToolPaths,
}

impl GdalToolkit {
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }

    /// Arguments passed to gdal_translate for a request
    pub fn translate_args(request: &TranslateRequest) -> Vec<String> {
        let b = &request.bounds;
        vec![
            "-q".to_string(),
            "-of".to_string(),
            "GTiff".to_string(),
            "-a_srs".to_string(),
            request.crs.clone(),
            "-a_ullr".to_string(),
            b.upper_left_lon.to_string(),
            b.upper_left_lat.to_string(),
            b.lower_right_lon.to_string(),
            b.lower_right_lat.to_string(),
            "-a_nodata".to_string(),
            request.nodata.to_string(),
            request.source.clone(),
            request.output.display().to_string(),
        ]
    }

    /// Arguments passed to gdal_merge for a request
    pub fn merge_args(request: &MergeRequest) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            request.output.display().to_string(),
            "-a_nodata".to_string(),
            request.nodata.to_string(),
        ];
        args.extend(request.inputs.iter().map(|p| p.display().to_string()));
        args
    }

    fn run(tool: &str, args: &[String]) -> GioResult<Output> {
        log::debug!("Running {} {}", tool, args.join(" "));
        let output = Command::new(tool).args(args).output()?;
        if !output.status.success() {
            return Err(GioError::Tool {
                tool: tool.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl RasterToolkit for GdalToolkit {
    fn info(&self, path: &str) -> GioResult<String> {
        let output = Self::run(&self.paths.gdalinfo, &[path.to_string()])?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn translate(&self, request: &TranslateRequest) -> GioResult<()> {
        Self::run(&self.paths.gdal_translate, &Self::translate_args(request))?;
        Ok(())
    }

    fn merge(&self, request: &MergeRequest) -> GioResult<()> {
        log::info!(
            "Merging {} tiles into {}",
            request.inputs.len(),
            request.output.display()
        );
        Self::run(&self.paths.gdal_merge, &Self::merge_args(request))?;
        Ok(())
    }
}
