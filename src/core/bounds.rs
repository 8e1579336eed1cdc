use crate::core::coerce::PIXEL_SIZE;
use crate::types::{GeoBounds, GeoTransform, GioError, GioResult, TypedMetadata};

/// Operation name reported when a required field is missing
const OPERATION: &str = "bounds computation";

/// Compute the pixel-edge envelope of a raster
///
/// `first_lon`/`first_lat` locate the centre of the upper-left pixel, so the
/// envelope starts half a pixel further west and north.
pub fn compute_bounds(
    first_lon: f64,
    first_lat: f64,
    n_cols: i64,
    n_lines: i64,
    pixel_size: f64,
) -> GioResult<GeoBounds> {
    if !(pixel_size > 0.0 && pixel_size.is_finite()) {
        return Err(GioError::InvalidGeometry(format!(
            "pixel size must be positive, got {}",
            pixel_size
        )));
    }
    if n_cols <= 0 || n_lines <= 0 {
        return Err(GioError::InvalidGeometry(format!(
            "raster must have at least one pixel, got {} x {}",
            n_cols, n_lines
        )));
    }

    let upper_left_lon = first_lon - pixel_size / 2.0;
    let upper_left_lat = first_lat + pixel_size / 2.0;
    Ok(GeoBounds {
        upper_left_lon,
        upper_left_lat,
        lower_right_lon: upper_left_lon + n_cols as f64 * pixel_size,
        lower_right_lat: upper_left_lat - n_lines as f64 * pixel_size,
    })
}

/// Bounds of one subdataset of a tile
///
/// The origin and pixel size come from the tile's metadata, the raster
/// dimensions from the subdataset's own metadata.
pub fn bounds_for_subdataset(tile: &TypedMetadata, subdataset: &TypedMetadata) -> GioResult<GeoBounds> {
    let first_lon = tile.require_integer("FIRST_LON", OPERATION)?;
    let first_lat = tile.require_integer("FIRST_LAT", OPERATION)?;
    let pixel_size = tile.require_float(PIXEL_SIZE, OPERATION)?;
    let n_cols = subdataset.require_integer("N_COLS", OPERATION)?;
    let n_lines = subdataset.require_integer("N_LINES", OPERATION)?;

    compute_bounds(first_lon as f64, first_lat as f64, n_cols, n_lines, pixel_size)
}

impl GeoBounds {
    /// North-up geotransform anchored on the upper-left pixel edge
    pub fn geo_transform(&self, pixel_size: f64) -> GeoTransform {
        GeoTransform {
            top_left_x: self.upper_left_lon,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y: self.upper_left_lat,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_global_grid() {
        let b = compute_bounds(-170.0, 80.0, 7200, 2800, 0.05).unwrap();
        assert_abs_diff_eq!(b.upper_left_lon, -170.025, epsilon = 1e-9);
        assert_abs_diff_eq!(b.upper_left_lat, 80.025, epsilon = 1e-9);
        assert_abs_diff_eq!(b.lower_right_lon, 189.975, epsilon = 1e-9);
        assert_abs_diff_eq!(b.lower_right_lat, -59.975, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(matches!(
            compute_bounds(-170.0, 80.0, 7200, 2800, 0.0),
            Err(GioError::InvalidGeometry(_))
        ));
        assert!(matches!(
            compute_bounds(-170.0, 80.0, 0, 2800, 0.05),
            Err(GioError::InvalidGeometry(_))
        ));
        assert!(matches!(
            compute_bounds(-170.0, 80.0, 7200, -1, 0.05),
            Err(GioError::InvalidGeometry(_))
        ));
        assert!(compute_bounds(-170.0, 80.0, 7200, 2800, f64::NAN).is_err());
    }

    #[test]
    fn test_geo_transform() {
        let b = compute_bounds(-170.0, 80.0, 7200, 2800, 0.05).unwrap();
        let gt = b.geo_transform(0.05);
        assert_abs_diff_eq!(gt.top_left_x, -170.025, epsilon = 1e-9);
        assert_abs_diff_eq!(gt.top_left_y, 80.025, epsilon = 1e-9);
        assert_eq!(gt.pixel_height, -0.05);

        let pixel_size = 1.0 / 112.0;
        let b = compute_bounds(-180.0, 75.0, 40320, 14000, pixel_size).unwrap();
        let gt = b.geo_transform(pixel_size);
        assert_abs_diff_eq!(gt.top_left_x + 40320.0 * gt.pixel_width, b.lower_right_lon, epsilon = 1e-9);
        assert_abs_diff_eq!(gt.top_left_y + 14000.0 * gt.pixel_height, b.lower_right_lat, epsilon = 1e-9);
    }
}
