use crate::types::{Attributes, GioResult, RasterInfo, SubdatasetInfo};
use regex::Regex;

/// Label opening a metadata block
const METADATA_LABEL: &str = "Metadata:";

/// Line classifier states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OutsideMetadata,
    InsideMetadata,
}

/// Parser for `gdalinfo` text output
///
/// Lines are classified one at a time by a two-state machine. Metadata
/// entries are collected in order and assigned to the file or to a
/// subdataset scope only once every subdataset has been discovered, so the
/// position of the `Subdatasets:` block relative to `Metadata:` does not
/// matter.
pub struct RasterInfoParser {
    entry_re: Regex,
    subdataset_re: Regex,
    subdataset_name_re: Regex,
    band_re: Regex,
    nodata_re: Regex,
    size_re: Regex,
}

impl RasterInfoParser {
    pub fn new() -> GioResult<Self> {
        Ok(Self {
            entry_re: Regex::new(r"^\s+(\w+)=(.*)$")?,
            subdataset_re: Regex::new(r"^\s+SUBDATASET_\d+_NAME=(.*)$")?,
            subdataset_name_re: Regex::new(r"//(\w+)")?,
            band_re: Regex::new(r"^Band (\d+) Block=(\d+)x(\d+) Type=(\w+),")?,
            nodata_re: Regex::new(r"^\s+NoData Value=(.*)$")?,
            size_re: Regex::new(r"^Size is (\d+), (\d+)")?,
        })
    }

    /// Parse the introspection output of a file
    pub fn parse(&self, text: &str) -> RasterInfo {
        self.parse_with_scopes(text, Vec::new())
    }

    /// Parse the introspection output of a single subdataset
    ///
    /// The subdataset is registered before parsing so that attributes
    /// reported as `<name>_<KEY>` land in its own scope.
    pub fn parse_subdataset(&self, text: &str, name: &str, path: &str) -> RasterInfo {
        self.parse_with_scopes(text, vec![(name.to_string(), path.to_string())])
    }

    fn parse_with_scopes(&self, text: &str, seeded: Vec<(String, String)>) -> RasterInfo {
        let mut info = RasterInfo::default();
        let mut entries: Vec<(String, String)> = Vec::new();
        // Discovery order, used to break ties between overlapping prefixes
        let mut discovered: Vec<String> = Vec::new();
        let mut last_band: Option<u32> = None;
        let mut state = State::OutsideMetadata;

        for (name, path) in seeded {
            Self::register_subdataset(&mut info, &mut discovered, name, path);
        }

        for line in text.lines() {
            if state == State::InsideMetadata {
                if let Some(caps) = self.entry_re.captures(line) {
                    entries.push((caps[1].to_string(), caps[2].to_string()));
                    self.discover_subdataset(line, &mut info, &mut discovered);
                    continue;
                }
                state = State::OutsideMetadata;
            }

            if line.trim() == METADATA_LABEL {
                state = State::InsideMetadata;
                continue;
            }
            if self.discover_subdataset(line, &mut info, &mut discovered) {
                continue;
            }

            if let Some(caps) = self.band_re.captures(line) {
                let Ok(index) = caps[1].parse::<u32>() else {
                    continue;
                };
                let mut band = Attributes::new();
                band.insert("BLOCK_X".to_string(), caps[2].to_string());
                band.insert("BLOCK_Y".to_string(), caps[3].to_string());
                band.insert("DATA_TYPE".to_string(), caps[4].to_string());
                info.bands.insert(index, band);
                last_band = Some(index);
            } else if let Some(caps) = self.nodata_re.captures(line) {
                if let Some(band) = last_band.and_then(|index| info.bands.get_mut(&index)) {
                    band.insert("NODATA_VALUE".to_string(), caps[1].to_string());
                }
            } else if let Some(caps) = self.size_re.captures(line) {
                if let (Ok(width), Ok(height)) = (caps[1].parse::<usize>(), caps[2].parse::<usize>()) {
                    info.size = (width, height);
                }
            }
        }

        for (key, value) in entries {
            let owner = discovered.iter().find_map(|name| {
                key.strip_prefix(name.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (name.clone(), rest.to_string()))
            });
            match owner {
                Some((name, field)) => {
                    if let Some(subdataset) = info.subdatasets.get_mut(&name) {
                        subdataset.attributes.insert(field, value);
                    }
                }
                None => {
                    info.attributes.insert(key, value);
                }
            }
        }

        info
    }

    /// Register the subdataset named on `line`, if any
    fn discover_subdataset(
        &self,
        line: &str,
        info: &mut RasterInfo,
        discovered: &mut Vec<String>,
    ) -> bool {
        let Some(caps) = self.subdataset_re.captures(line) else {
            return false;
        };
        let path = caps[1].to_string();
        match self.subdataset_name_re.captures(&path) {
            Some(name) => {
                let name = name[1].to_string();
                Self::register_subdataset(info, discovered, name, path);
                true
            }
            None => false,
        }
    }

    fn register_subdataset(
        info: &mut RasterInfo,
        discovered: &mut Vec<String>,
        name: String,
        path: String,
    ) {
        if !discovered.contains(&name) {
            discovered.push(name.clone());
        }
        info.subdatasets
            .entry(name)
            .and_modify(|sd| sd.path = path.clone())
            .or_insert_with(|| SubdatasetInfo {
                path,
                attributes: Attributes::new(),
            });
    }
}
