use gio_mosaic::io::{MergeRequest, RasterToolkit, TranslateRequest};
use gio_mosaic::{GioError, GioResult, PipelineConfig, TimeslotProcessor};
use approx::assert_abs_diff_eq;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

const PRODUCT: &str = "LST";
const TIMESLOT: &str = "201501151200";

/// In-memory stand-in for the GDAL tools
///
/// Introspection text is generated from the requested path: HDF5
/// subdataset paths, GeoTIFF outputs and tiles each get their own layout.
#[derive(Default)]
struct FakeToolkit {
    /// No-data value reported for georeferenced outputs of this tile
    odd_nodata_tile: Option<&'static str>,
    info_calls: Mutex<Vec<String>>,
    translations: Mutex<Vec<TranslateRequest>>,
    merges: Mutex<Vec<MergeRequest>>,
}

impl FakeToolkit {
    fn tile_origin(path: &str) -> (i32, i32) {
        if path.contains("_EURO_") {
            (-10, 70)
        } else {
            (-30, 40)
        }
    }

    fn tile_info(path: &str) -> String {
        let (lon, lat) = Self::tile_origin(path);
        format!(
            "Driver: HDF5/Hierarchical Data Format Release 5\nSize is 512, 512\nMetadata:\n  FIRST_LAT={lat}\n  FIRST_LON={lon}\n  IMAGE_ACQUISITION_TIME={TIMESLOT}\n  PIXEL_SIZE=0.05 Degrees\n  PRODUCT={PRODUCT}\nSubdatasets:\n  SUBDATASET_1_NAME=HDF5:\"{path}\"://LST\n  SUBDATASET_1_DESC=[1400x1600] //LST (16-bit integer)\n  SUBDATASET_2_NAME=HDF5:\"{path}\"://Q_FLAGS\n  SUBDATASET_2_DESC=[1400x1600] //Q_FLAGS (8-bit unsigned integer)\nCorner Coordinates:\n"
        )
    }

    fn subdataset_info(path: &str) -> String {
        let name = path.rsplit("//").next().unwrap_or_default();
        let nodata = if name == "LST" { "-8000" } else { "0" };
        format!(
            "Driver: HDF5Image/HDF5 Dataset\nSize is 1600, 1400\nMetadata:\n  FIRST_LAT=40\n  {name}_MISSING_VALUE={nodata}\n  {name}_N_COLS=1600\n  {name}_N_LINES=1400\n  {name}_SCALING_FACTOR=100\n  PRODUCT={PRODUCT}\nBand 1 Block=1600x1 Type=Int16, ColorInterp=Undefined\n"
        )
    }

    fn geotiff_info(&self, path: &str) -> String {
        let mut nodata = if path.ends_with("_LST.tif") { "-8000" } else { "0" };
        if let Some(tile) = self.odd_nodata_tile {
            if path.contains(tile) {
                nodata = "-1";
            }
        }
        format!(
            "Driver: GTiff/GeoTIFF\nSize is 1600, 1400\nMetadata:\n  IMAGE_ACQUISITION_TIME={TIMESLOT}\n  PRODUCT={PRODUCT}\nBand 1 Block=1600x1 Type=Int16, ColorInterp=Gray\n  NoData Value={nodata}\n"
        )
    }

    fn geotiff_info_calls(&self) -> usize {
        self.info_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.ends_with(".tif"))
            .count()
    }
}

impl RasterToolkit for FakeToolkit {
    fn info(&self, path: &str) -> GioResult<String> {
        self.info_calls.lock().unwrap().push(path.to_string());
        if path.starts_with("HDF5:") {
            Ok(Self::subdataset_info(path))
        } else if path.ends_with(".tif") {
            Ok(self.geotiff_info(path))
        } else {
            Ok(Self::tile_info(path))
        }
    }

    fn translate(&self, request: &TranslateRequest) -> GioResult<()> {
        self.translations.lock().unwrap().push(request.clone());
        Ok(())
    }

    fn merge(&self, request: &MergeRequest) -> GioResult<()> {
        self.merges.lock().unwrap().push(request.clone());
        Ok(())
    }
}

fn tile_name(region: &str) -> String {
    format!("g2_BIOPAR_{}_{}_{}_GEO_v1", PRODUCT, TIMESLOT, region)
}

fn working_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    for name in [tile_name("EURO"), tile_name("AFRI")] {
        std::fs::write(dir.path().join(name), b"").expect("tile");
    }
    // Neither another timeslot nor a previous output may be picked up
    std::fs::write(
        dir.path().join(format!("g2_BIOPAR_{}_201501151300_AFRI_GEO_v1", PRODUCT)),
        b"",
    )
    .expect("other timeslot");
    std::fs::write(dir.path().join(format!("{}_LST.tif", tile_name("AFRI"))), b"").expect("output");
    dir
}

fn config(dir: &Path, parallel: bool) -> PipelineConfig {
    let mut config = PipelineConfig::new(dir, PRODUCT, TIMESLOT);
    config.parallel = parallel;
    config
}

#[test]
fn test_find_tiles() {
    let dir = working_dir();
    let config = config(dir.path(), false);
    let toolkit = FakeToolkit::default();
    let processor = TimeslotProcessor::new(&config, &toolkit).unwrap();

    let tiles = processor.find_tiles().unwrap();
    assert_eq!(
        tiles,
        vec![dir.path().join(tile_name("AFRI")), dir.path().join(tile_name("EURO"))]
    );
}

#[test]
fn test_full_timeslot() {
    for parallel in [false, true] {
        let dir = working_dir();
        let config = config(dir.path(), parallel);
        let toolkit = FakeToolkit::default();
        let processor = TimeslotProcessor::new(&config, &toolkit).unwrap();

        let mosaics = processor.run().unwrap();
        assert_eq!(
            mosaics,
            vec![
                dir.path().join("global_LST_201501151200_LST.tif"),
                dir.path().join("global_LST_201501151200_Q_FLAGS.tif"),
            ]
        );

        let translations = toolkit.translations.lock().unwrap().clone();
        assert_eq!(translations.len(), 4);
        let afri_lst = translations
            .iter()
            .find(|t| t.output == dir.path().join(format!("{}_LST.tif", tile_name("AFRI"))))
            .expect("AFRI LST translation");
        assert!(afri_lst.source.ends_with("://LST"));
        assert_eq!(afri_lst.crs, "EPSG:4326");
        assert_eq!(afri_lst.nodata, -8000);
        assert_abs_diff_eq!(afri_lst.bounds.upper_left_lon, -30.025, epsilon = 1e-9);
        assert_abs_diff_eq!(afri_lst.bounds.upper_left_lat, 40.025, epsilon = 1e-9);
        assert_abs_diff_eq!(afri_lst.bounds.lower_right_lon, 49.975, epsilon = 1e-9);
        assert_abs_diff_eq!(afri_lst.bounds.lower_right_lat, -29.975, epsilon = 1e-9);

        let merges = toolkit.merges.lock().unwrap().clone();
        assert_eq!(merges.len(), 2);
        assert_eq!(merges[1].nodata, 0);
        assert_eq!(
            merges[1].inputs,
            vec![
                dir.path().join(format!("{}_Q_FLAGS.tif", tile_name("AFRI"))),
                dir.path().join(format!("{}_Q_FLAGS.tif", tile_name("EURO"))),
            ]
        );

        // Only the first member of each group is introspected
        assert_eq!(toolkit.geotiff_info_calls(), 2);
    }
}

#[test]
fn test_strict_groups_detect_mismatch() {
    let dir = working_dir();
    let mut config = config(dir.path(), false);
    let toolkit = FakeToolkit {
        odd_nodata_tile: Some("_EURO_"),
        ..FakeToolkit::default()
    };

    // The mismatch goes unnoticed by default
    {
        let processor = TimeslotProcessor::new(&config, &toolkit).unwrap();
        assert!(processor.run().is_ok());
    }

    config.strict_groups = true;
    let processor = TimeslotProcessor::new(&config, &toolkit).unwrap();
    match processor.run() {
        Err(GioError::InconsistentGroup { key, member, .. }) => {
            assert_eq!(key, "LST");
            assert_eq!(member, dir.path().join(format!("{}_LST.tif", tile_name("EURO"))));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_empty_timeslot() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), true);
    let toolkit = FakeToolkit::default();
    let processor = TimeslotProcessor::new(&config, &toolkit).unwrap();

    assert!(processor.run().unwrap().is_empty());
    assert!(toolkit.info_calls.lock().unwrap().is_empty());
}

#[test]
fn test_bad_output_name_fails_grouping() {
    let config = config(Path::new("/data"), false);
    let toolkit = FakeToolkit::default();
    let processor = TimeslotProcessor::new(&config, &toolkit).unwrap();

    let outputs = vec![
        PathBuf::from("/data/g2_BIOPAR_LST_201501151200_AFRI_GEO_v1_LST.tif"),
        PathBuf::from("/data/g2_BIOPAR_LST_201501151200_AFRI_GEO_v1.tif"),
    ];
    assert!(matches!(
        processor.group_outputs(&outputs),
        Err(GioError::TileNaming { .. })
    ));
}
