use lstmap::core::canopy::{CanopyHeightProcessor, CanopyParams};
use lstmap::core::classify::TemperatureClasses;
use lstmap::io::submit::{JobSubmitter, ManifestSubmitter};
use lstmap::{AreaOfInterest, GeoTransform, PipelineConfig, Raster};
use ndarray::Array2;
use tempfile::TempDir;

fn tile(x0: f64, y0: f64, value: f64) -> Raster {
    Raster::new(Array2::from_elem((4, 4), value), GeoTransform::north_up(x0, y0, 0.5))
}

#[test]
fn test_canopy_tiles_to_manifest() {
    let _ = env_logger::builder().is_test(true).try_init();

    let processor = CanopyHeightProcessor::with_params(CanopyParams {
        min_height: 2.0,
        ..CanopyParams::default()
    });

    // two tiles side by side, the left one below the height cut
    let tiles = vec![tile(0.0, 2.0, 1.5), tile(2.0, 2.0, 14.0)];
    let aoi = AreaOfInterest::from_ring(&[[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]]).unwrap();
    let artifact = processor.process(&tiles, &aoi).unwrap();

    assert_eq!(artifact.raster.dim(), (4, 8));
    assert_eq!(artifact.raster.valid_count(), 16);
    assert_eq!(artifact.descriptor.crs, "EPSG:4326");
    assert_eq!(artifact.descriptor.name, "Canopy Height >= 2 [meters]");

    let dir = TempDir::new().unwrap();
    let manifest = ManifestSubmitter::new(dir.path().join("manifest.jsonl")).unwrap();
    let job = manifest.submit(&artifact.descriptor, &artifact.raster).unwrap();
    assert!(job.starts_with("CanopyHeight_Export-"));

    let records = manifest.read_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].descriptor, artifact.descriptor);
}

#[test]
fn test_configured_classes_histogram() {
    let config = PipelineConfig::from_json_str(r#"{"class_bounds": [0, 20, 30, 40]}"#).unwrap();
    let classes = config.classes().unwrap();
    assert_eq!(classes.labels(), vec!["<20", "20-30", ">30"]);

    let data = Array2::from_shape_vec((2, 3), vec![-3.0, 19.9, 20.0, 29.0, 45.0, f64::NAN]).unwrap();
    let raster = Raster::new(data, GeoTransform::north_up(0.0, 60.0, 30.0));
    assert_eq!(classes.histogram(&raster), vec![2, 2, 1]);

    assert_eq!(TemperatureClasses::default().class_count(), 5);
}
