use crate::types::{ExportDescriptor, GeoTransform, LstError, LstResult, Raster};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Export job submission. Fire-and-forget: the returned job id is recorded,
/// job status is never polled.
pub trait JobSubmitter: Send + Sync {
    fn submit(&self, descriptor: &ExportDescriptor, raster: &Raster) -> LstResult<String>;
}

/// Grid summary sent along with a descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridInfo {
    pub rows: usize,
    pub cols: usize,
    pub geo_transform: GeoTransform,
    pub valid_pixels: usize,
}

impl GridInfo {
    pub fn of(raster: &Raster) -> Self {
        let (rows, cols) = raster.dim();
        Self {
            rows,
            cols,
            geo_transform: raster.geo_transform,
            valid_pixels: raster.valid_count(),
        }
    }
}

/// One manifest line / request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub submitted_at: String,
    pub descriptor: ExportDescriptor,
    pub grid: GridInfo,
}

/// Appends one JSON line per submitted descriptor to a manifest file
pub struct ManifestSubmitter {
    path: PathBuf,
    lock: Mutex<usize>,
}

impl ManifestSubmitter {
    pub fn new<P: AsRef<Path>>(path: P) -> LstResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // continue numbering after records left by earlier runs
        let existing = match fs::read_to_string(&path) {
            Ok(content) => content.lines().filter(|l| !l.trim().is_empty()).count(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        log::info!("Export manifest: {} ({} existing records)", path.display(), existing);
        Ok(Self {
            path,
            lock: Mutex::new(existing),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record written so far
    pub fn read_records(&self) -> LstResult<Vec<JobRecord>> {
        let content = fs::read_to_string(&self.path)?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(LstError::from))
            .collect()
    }
}

impl JobSubmitter for ManifestSubmitter {
    fn submit(&self, descriptor: &ExportDescriptor, raster: &Raster) -> LstResult<String> {
        let mut counter = self
            .lock
            .lock()
            .map_err(|_| LstError::Processing("Manifest lock poisoned".to_string()))?;
        *counter += 1;

        let record = JobRecord {
            job_id: format!("{}-{:04}", descriptor.description, *counter),
            submitted_at: Utc::now().to_rfc3339(),
            descriptor: descriptor.clone(),
            grid: GridInfo::of(raster),
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&record)?)?;

        log::info!("Export task created for: {} (scale: {} m)", descriptor.name, descriptor.scale);
        Ok(record.job_id)
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// POSTs descriptors to an export service endpoint
pub struct HttpJobSubmitter {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpJobSubmitter {
    pub fn new(endpoint: &str) -> LstResult<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(30))
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> LstResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LstError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl JobSubmitter for HttpJobSubmitter {
    fn submit(&self, descriptor: &ExportDescriptor, raster: &Raster) -> LstResult<String> {
        let record = JobRecord {
            job_id: String::new(),
            submitted_at: Utc::now().to_rfc3339(),
            descriptor: descriptor.clone(),
            grid: GridInfo::of(raster),
        };

        log::debug!("Submitting {} to {}", descriptor.description, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&record)
            .send()
            .map_err(|e| LstError::TransientService(format!("{}: {}", self.endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LstError::TransientService(format!(
                "{} returned HTTP {}",
                self.endpoint, status
            )));
        }

        let body: SubmitResponse = response
            .json()
            .map_err(|e| LstError::InvalidFormat(format!("Unexpected submit response: {}", e)))?;

        log::info!("Export job {} queued for {}", body.job_id, descriptor.name);
        Ok(body.job_id)
    }
}

/// Writes each export as `<folder>/<file_name_prefix>.tif`
#[cfg(feature = "gdal")]
pub struct GeoTiffExporter {
    root: PathBuf,
    projection_wkt: Option<String>,
}

#[cfg(feature = "gdal")]
impl GeoTiffExporter {
    pub fn new<P: AsRef<Path>>(root: P, projection_wkt: Option<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            projection_wkt,
        }
    }
}

#[cfg(feature = "gdal")]
impl JobSubmitter for GeoTiffExporter {
    fn submit(&self, descriptor: &ExportDescriptor, raster: &Raster) -> LstResult<String> {
        let dir = self.root.join(&descriptor.folder);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.tif", descriptor.file_name_prefix));
        crate::io::geotiff::write_raster(&path, raster, self.projection_wkt.as_deref())?;
        log::info!("Wrote {}", path.display());
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use ndarray::Array2;
    use tempfile::TempDir;

    fn descriptor() -> ExportDescriptor {
        ExportDescriptor {
            name: "12 August 2023 - heat map (AOI cloud: 7.3%)".to_string(),
            scene_id: "LC08_TEST".to_string(),
            description: "Export_L8_STB10C_12August2023heatmapAOIcloud73".to_string(),
            file_name_prefix: "L8_STB10C_12August2023heatmapAOIcloud73".to_string(),
            output_band: "ST_B10_Celsius".to_string(),
            folder: "EarthEngineExports".to_string(),
            region: BoundingBox { min_x: 0.0, max_x: 60.0, min_y: 0.0, max_y: 60.0 },
            scale: 30.0,
            crs: "EPSG:3857".to_string(),
            max_pixels: 1e13,
            file_format: "GeoTIFF".to_string(),
        }
    }

    fn raster() -> Raster {
        Raster::new(Array2::from_elem((2, 2), 21.5), GeoTransform::north_up(0.0, 60.0, 30.0))
    }

    #[test]
    fn test_manifest_appends_records() {
        let dir = TempDir::new().unwrap();
        let submitter = ManifestSubmitter::new(dir.path().join("exports/manifest.jsonl")).unwrap();

        let first = submitter.submit(&descriptor(), &raster()).unwrap();
        let second = submitter.submit(&descriptor(), &raster()).unwrap();
        assert_ne!(first, second);

        let records = submitter.read_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].descriptor, descriptor());
        assert_eq!(records[0].grid.valid_pixels, 4);
        assert_eq!(records[1].job_id, second);
    }

    #[test]
    fn test_manifest_ids_continue_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.jsonl");

        let first = ManifestSubmitter::new(&path).unwrap().submit(&descriptor(), &raster()).unwrap();
        let reopened = ManifestSubmitter::new(&path).unwrap();
        let second = reopened.submit(&descriptor(), &raster()).unwrap();

        assert!(first.ends_with("-0001"));
        assert!(second.ends_with("-0002"));
        assert_eq!(reopened.read_records().unwrap().len(), 2);
    }

    #[test]
    fn test_http_unreachable_is_transient() {
        let submitter =
            HttpJobSubmitter::with_timeout("http://127.0.0.1:9/exports", Duration::from_millis(500))
                .unwrap();
        let result = submitter.submit(&descriptor(), &raster());
        assert!(matches!(result, Err(LstError::TransientService(_))));
    }
}
