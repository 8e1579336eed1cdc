use crate::types::{
    Attributes, GioError, GioResult, MetadataValue, RasterInfo, TypedMetadata, TypedScope,
    TypedSubdataset,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// Fields coerced to integers, wherever they are first found
pub const INTEGER_FIELDS: [&str; 6] = [
    "N_LINES",
    "N_COLS",
    "MISSING_VALUE",
    "SCALING_FACTOR",
    "FIRST_LAT",
    "FIRST_LON",
];

pub const PIXEL_SIZE: &str = "PIXEL_SIZE";
pub const ACQUISITION_TIME: &str = "IMAGE_ACQUISITION_TIME";
pub const SIZE_X: &str = "size_x";
pub const SIZE_Y: &str = "size_y";

/// Converts raw introspection attributes into typed metadata
pub struct MetadataTypeCoercer {
    leading_number_re: Regex,
}

impl MetadataTypeCoercer {
    pub fn new() -> GioResult<Self> {
        Ok(Self {
            leading_number_re: Regex::new(r"^\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)")?,
        })
    }

    /// Coerce every registry field of `info`
    ///
    /// Integer fields are searched at file scope, then in each subdataset
    /// (by name), then in each band (by index). Only the first occurrence of
    /// a field is converted; later occurrences stay textual.
    pub fn coerce(&self, info: &RasterInfo) -> GioResult<TypedMetadata> {
        let mut typed = TypedMetadata {
            attributes: text_scope(&info.attributes),
            subdatasets: info
                .subdatasets
                .iter()
                .map(|(name, sd)| {
                    let typed_sd = TypedSubdataset {
                        path: sd.path.clone(),
                        attributes: text_scope(&sd.attributes),
                    };
                    (name.clone(), typed_sd)
                })
                .collect(),
            bands: info
                .bands
                .iter()
                .map(|(index, band)| (*index, text_scope(band)))
                .collect(),
            size: info.size,
        };

        for field in INTEGER_FIELDS {
            if let Some(slot) = first_text_slot(&mut typed, field) {
                let raw = slot.to_string();
                *slot = MetadataValue::Integer(parse_integer(field, &raw)?);
            }
        }

        if let Some(MetadataValue::Text(raw)) = typed.attributes.get(PIXEL_SIZE) {
            let value = self.parse_pixel_size(raw)?;
            typed.attributes.insert(PIXEL_SIZE.to_string(), MetadataValue::Float(value));
        }

        if let Some(MetadataValue::Text(raw)) = typed.attributes.get(ACQUISITION_TIME) {
            let value = parse_timestamp(ACQUISITION_TIME, raw)?;
            typed.attributes.insert(ACQUISITION_TIME.to_string(), MetadataValue::Timestamp(value));
        }

        let (width, height) = info.size;
        if (width, height) != (0, 0) {
            typed.attributes.insert(SIZE_X.to_string(), MetadataValue::Integer(width as i64));
            typed.attributes.insert(SIZE_Y.to_string(), MetadataValue::Integer(height as i64));
        }

        Ok(typed)
    }

    /// Leading numeric token of a value such as `0.05 Degrees`
    pub fn parse_pixel_size(&self, raw: &str) -> GioResult<f64> {
        let token = self
            .leading_number_re
            .captures(raw)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| GioError::metadata_type(PIXEL_SIZE, raw, "no leading number"))?;
        token
            .parse::<f64>()
            .map_err(|e| GioError::metadata_type(PIXEL_SIZE, raw, e.to_string()))
    }
}

fn text_scope(attributes: &Attributes) -> TypedScope {
    attributes
        .iter()
        .map(|(k, v)| (k.clone(), MetadataValue::Text(v.clone())))
        .collect()
}

/// First still-textual value of `field` in search order
fn first_text_slot<'a>(typed: &'a mut TypedMetadata, field: &str) -> Option<&'a mut MetadataValue> {
    std::iter::once(&mut typed.attributes)
        .chain(typed.subdatasets.values_mut().map(|sd| &mut sd.attributes))
        .chain(typed.bands.values_mut())
        .find_map(|scope| {
            scope
                .get_mut(field)
                .filter(|value| matches!(value, MetadataValue::Text(_)))
        })
}

pub fn parse_integer(field: &str, raw: &str) -> GioResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| GioError::metadata_type(field, raw, e.to_string()))
}

/// Parse a fixed-width `YYYYMMDDHHMM` value as UTC
pub fn parse_timestamp(field: &str, raw: &str) -> GioResult<DateTime<Utc>> {
    let digits = raw.trim();
    if digits.len() != 12 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GioError::metadata_type(field, raw, "expected YYYYMMDDHHMM"));
    }
    let naive = NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M")
        .map_err(|e| GioError::metadata_type(field, raw, e.to_string()))?;
    Ok(Utc.from_utc_datetime(&naive))
}
