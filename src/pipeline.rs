//! Timeslot processing: discover tiles, georeference their subdatasets and
//! merge them into global mosaics.

use crate::core::bounds::bounds_for_subdataset;
use crate::core::coerce::{MetadataTypeCoercer, PIXEL_SIZE};
use crate::core::grouping::TileGrouper;
use crate::io::gdalinfo::RasterInfoParser;
use crate::io::tools::{MergeRequest, RasterToolkit, ToolPaths, TranslateRequest};
use crate::types::{GioError, GioResult, TileGroup, OUTPUT_CRS};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Settings for processing one product timeslot
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the HDF5 tiles; outputs are written next to them
    pub working_dir: PathBuf,
    /// Product code, e.g. `LST`
    pub product: String,
    /// Acquisition timeslot as `YYYYMMDDHHMM`
    pub timeslot: String,
    #[serde(default = "default_crs")]
    pub output_crs: String,
    #[serde(default)]
    pub tools: ToolPaths,
    /// Georeference tiles concurrently
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Check that every member of a tile group carries the same metadata
    #[serde(default)]
    pub strict_groups: bool,
}

fn default_crs() -> String {
    OUTPUT_CRS.to_string()
}

fn default_parallel() -> bool {
    true
}

impl PipelineConfig {
    pub fn new(working_dir: impl Into<PathBuf>, product: &str, timeslot: &str) -> Self {
        Self {
            working_dir: working_dir.into(),
            product: product.to_string(),
            timeslot: timeslot.to_string(),
            output_crs: default_crs(),
            tools: ToolPaths::default(),
            parallel: default_parallel(),
            strict_groups: false,
        }
    }

    /// Load settings from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> GioResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_yaml::from_str(&content).map_err(|e| {
            GioError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GioResult<()> {
        if self.product.is_empty() || !self.product.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(GioError::Config(format!("invalid product code {:?}", self.product)));
        }
        if self.timeslot.len() != 12 || !self.timeslot.chars().all(|c| c.is_ascii_digit()) {
            return Err(GioError::Config(format!(
                "timeslot must be YYYYMMDDHHMM, got {:?}",
                self.timeslot
            )));
        }
        if !self.working_dir.is_dir() {
            return Err(GioError::Config(format!(
                "working directory {} does not exist",
                self.working_dir.display()
            )));
        }
        Ok(())
    }

    /// File name pattern of the tiles belonging to this product and timeslot
    pub fn tile_pattern(&self) -> String {
        format!(
            r"^g2_BIOPAR_{}_{}_[A-Z]+_GEO_v1$",
            regex::escape(&self.product),
            regex::escape(&self.timeslot)
        )
    }
}

/// Orchestrates georeferencing and mosaicking for one timeslot
pub struct TimeslotProcessor<'a> {
    config: &'a PipelineConfig,
    toolkit: &'a dyn RasterToolkit,
    parser: RasterInfoParser,
    coercer: MetadataTypeCoercer,
    grouper: TileGrouper,
}

impl<'a> TimeslotProcessor<'a> {
    pub fn new(config: &'a PipelineConfig, toolkit: &'a dyn RasterToolkit) -> GioResult<Self> {
        Ok(Self {
            config,
            toolkit,
            parser: RasterInfoParser::new()?,
            coercer: MetadataTypeCoercer::new()?,
            grouper: TileGrouper::new()?.strict(config.strict_groups),
        })
    }

    /// Run the whole timeslot and return the paths of the global mosaics
    pub fn run(&self) -> GioResult<Vec<PathBuf>> {
        log::info!(
            "Processing {} timeslot {} in {}",
            self.config.product,
            self.config.timeslot,
            self.config.working_dir.display()
        );
        let tiles = self.find_tiles()?;
        if tiles.is_empty() {
            log::warn!("No tiles found matching {}", self.config.tile_pattern());
            return Ok(Vec::new());
        }
        log::info!("Found {} tiles", tiles.len());

        let georeferenced = self.georeference_tiles(&tiles)?;
        let groups = self.group_outputs(&georeferenced)?;
        self.merge_groups(&groups)
    }

    /// Tiles in the working directory matching the product/timeslot pattern, sorted
    pub fn find_tiles(&self) -> GioResult<Vec<PathBuf>> {
        let pattern = Regex::new(&self.config.tile_pattern())?;
        let mut tiles = Vec::new();
        for entry in std::fs::read_dir(&self.config.working_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_str().map_or(false, |name| pattern.is_match(name)) {
                tiles.push(entry.path());
            }
        }
        tiles.sort();
        Ok(tiles)
    }

    /// Georeference every subdataset of every tile
    pub fn georeference_tiles(&self, tiles: &[PathBuf]) -> GioResult<Vec<PathBuf>> {
        let per_tile = if self.config.parallel {
            self.georeference_parallel(tiles)?
        } else {
            tiles
                .iter()
                .map(|tile| self.georeference_tile(tile))
                .collect::<GioResult<Vec<_>>>()?
        };
        Ok(per_tile.into_iter().flatten().collect())
    }

    #[cfg(feature = "parallel")]
    fn georeference_parallel(&self, tiles: &[PathBuf]) -> GioResult<Vec<Vec<PathBuf>>> {
        tiles
            .par_iter()
            .map(|tile| self.georeference_tile(tile))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn georeference_parallel(&self, tiles: &[PathBuf]) -> GioResult<Vec<Vec<PathBuf>>> {
        log::debug!("Built without the parallel feature, georeferencing sequentially");
        tiles.iter().map(|tile| self.georeference_tile(tile)).collect()
    }

    /// Georeference the subdatasets of one tile, one GeoTIFF each
    pub fn georeference_tile(&self, tile: &Path) -> GioResult<Vec<PathBuf>> {
        let tile_str = tile.display().to_string();
        let info = self.parser.parse(&self.toolkit.info(&tile_str)?);
        let tile_md = self.coercer.coerce(&info)?;
        if info.subdatasets.is_empty() {
            log::warn!("{} has no subdatasets", tile.display());
        }

        let mut outputs = Vec::with_capacity(info.subdatasets.len());
        for (name, subdataset) in &info.subdatasets {
            let sd_info = self
                .parser
                .parse_subdataset(&self.toolkit.info(&subdataset.path)?, name, &subdataset.path);
            let sd_md = self.coercer.coerce(&sd_info)?;

            let bounds = bounds_for_subdataset(&tile_md, &sd_md)?;
            let nodata = sd_md.require_integer("MISSING_VALUE", "georeferencing")?;
            let output = georeferenced_path(tile, name);
            let pixel_size = tile_md.require_float(PIXEL_SIZE, "georeferencing")?;
            log::debug!(
                "{} -> {} ({:?})",
                subdataset.path,
                output.display(),
                bounds.geo_transform(pixel_size)
            );

            self.toolkit.translate(&TranslateRequest {
                source: subdataset.path.clone(),
                output: output.clone(),
                bounds,
                crs: self.config.output_crs.clone(),
                nodata,
            })?;
            outputs.push(output);
        }
        Ok(outputs)
    }

    pub fn group_outputs(&self, outputs: &[PathBuf]) -> GioResult<BTreeMap<String, TileGroup>> {
        self.grouper.group(outputs, self.toolkit)
    }

    /// Merge each group into a global mosaic
    pub fn merge_groups(&self, groups: &BTreeMap<String, TileGroup>) -> GioResult<Vec<PathBuf>> {
        let mut mosaics = Vec::with_capacity(groups.len());
        for group in groups.values() {
            let output = group.merged_path();
            self.toolkit.merge(&MergeRequest {
                inputs: group.members.clone(),
                output: output.clone(),
                nodata: group.metadata.missing_value,
            })?;
            mosaics.push(output);
        }
        Ok(mosaics)
    }
}

/// `<tile_stem>_<subdataset>.tif`, next to the tile
pub fn georeferenced_path(tile: &Path, subdataset: &str) -> PathBuf {
    let stem = tile
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    tile.with_file_name(format!("{}_{}.tif", stem, subdataset))
}
