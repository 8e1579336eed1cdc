use crate::core::coerce::{parse_integer, MetadataTypeCoercer, ACQUISITION_TIME};
use crate::io::gdalinfo::RasterInfoParser;
use crate::io::tools::RasterToolkit;
use crate::types::{GioError, GioResult, MergeMetadata, TileGroup, TypedMetadata};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const OPERATION: &str = "tile merge";

/// Groups georeferenced per-tile outputs by subdataset identifier
///
/// Every member of a group is assumed to share the metadata of the first
/// member. With `strict` enabled every member is introspected and checked
/// against the first one.
pub struct TileGrouper {
    key_re: Regex,
    strict: bool,
    parser: RasterInfoParser,
    coercer: MetadataTypeCoercer,
}

impl TileGrouper {
    pub fn new() -> GioResult<Self> {
        Ok(Self {
            key_re: Regex::new(r"v1_(\w+)\.tif$")?,
            strict: false,
            parser: RasterInfoParser::new()?,
            coercer: MetadataTypeCoercer::new()?,
        })
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Subdataset identifier encoded in an output file name
    pub fn group_key(&self, path: &Path) -> GioResult<String> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.key_re.captures(name))
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| GioError::TileNaming {
                path: path.to_path_buf(),
            })
    }

    /// Split paths by group key, preserving input order within each group
    pub fn partition<P: AsRef<Path>>(&self, paths: &[P]) -> GioResult<BTreeMap<String, Vec<PathBuf>>> {
        let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for path in paths {
            let path = path.as_ref();
            let key = self.group_key(path)?;
            groups.entry(key).or_default().push(path.to_path_buf());
        }
        Ok(groups)
    }

    /// Group paths and attach the merge metadata of each group's first member
    pub fn group<P: AsRef<Path>>(
        &self,
        paths: &[P],
        toolkit: &dyn RasterToolkit,
    ) -> GioResult<BTreeMap<String, TileGroup>> {
        let describe = |path: &Path| -> GioResult<MergeMetadata> {
            let text = toolkit.info(&path.display().to_string())?;
            let typed = self.coercer.coerce(&self.parser.parse(&text))?;
            merge_metadata(&typed)
        };

        let mut groups = BTreeMap::new();
        for (key, members) in self.partition(paths)? {
            let Some(first) = members.first() else {
                continue;
            };
            let metadata = describe(first)?;

            if self.strict {
                for member in &members[1..] {
                    let other = describe(member)?;
                    if let Some(detail) = mismatch(&metadata, &other) {
                        return Err(GioError::InconsistentGroup {
                            key,
                            member: member.clone(),
                            detail,
                        });
                    }
                }
            }

            groups.insert(key.clone(), TileGroup { key, members, metadata });
        }
        Ok(groups)
    }
}

/// Merge metadata from the introspection of a georeferenced tile
pub fn merge_metadata(typed: &TypedMetadata) -> GioResult<MergeMetadata> {
    let product = typed.require_text("PRODUCT", OPERATION)?.trim().to_string();
    let timestamp = typed.require_timestamp(ACQUISITION_TIME, OPERATION)?;
    let missing_value = match typed.find_integer("MISSING_VALUE") {
        Some(value) => value,
        None => {
            let raw = typed
                .bands
                .values()
                .find_map(|band| band.get("NODATA_VALUE"))
                .map(|value| value.to_string())
                .ok_or_else(|| GioError::missing("MISSING_VALUE", OPERATION))?;
            parse_integer("NODATA_VALUE", &raw)?
        }
    };

    Ok(MergeMetadata {
        product,
        timestamp,
        missing_value,
        scaling_factor: typed.find_integer("SCALING_FACTOR"),
    })
}

fn mismatch(first: &MergeMetadata, other: &MergeMetadata) -> Option<String> {
    if first.product != other.product {
        Some(format!("product {} != {}", other.product, first.product))
    } else if first.timestamp != other.timestamp {
        Some(format!("timestamp {} != {}", other.timestamp, first.timestamp))
    } else if first.missing_value != other.missing_value {
        Some(format!(
            "missing value {} != {}",
            other.missing_value, first.missing_value
        ))
    } else {
        None
    }
}

impl TileGroup {
    /// Member whose metadata names the mosaic, `None` for an empty group
    pub fn representative(&self) -> Option<&Path> {
        self.members.first().map(PathBuf::as_path)
    }

    /// `global_<product>_<timestamp>_<subdataset>.tif`
    pub fn merged_file_name(&self) -> String {
        format!(
            "global_{}_{}_{}.tif",
            self.metadata.product,
            self.metadata.timestamp.format("%Y%m%d%H%M"),
            self.key
        )
    }

    /// Mosaic path, next to the first member
    pub fn merged_path(&self) -> PathBuf {
        let dir = self
            .representative()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        dir.join(self.merged_file_name())
    }
}
