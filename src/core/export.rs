use crate::core::calibrate::kelvin_to_celsius;
use crate::core::reduce::clip_to_aoi;
use crate::types::{AreaOfInterest, CalibratedScene, ExportDescriptor, LstResult, Raster};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Export target settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportParams {
    /// Thermal band (Kelvin) converted for export
    pub source_band: String,
    /// Name of the exported Celsius band
    pub output_band: String,
    /// Prepended to the sanitised label to form the file name
    pub file_prefix: String,
    pub folder: String,
    pub scale: f64,
    pub crs: String,
    pub max_pixels: f64,
    pub file_format: String,
    /// Maximum length of the sanitised label
    pub max_name_len: usize,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            source_band: "ST_B10".to_string(),
            output_band: "ST_B10_Celsius".to_string(),
            file_prefix: "L8_STB10C_".to_string(),
            folder: "EarthEngineExports".to_string(),
            scale: 30.0,
            crs: "EPSG:3857".to_string(),
            max_pixels: 1e13,
            file_format: "GeoTIFF".to_string(),
            max_name_len: 60,
        }
    }
}

/// Descriptor plus the Celsius raster it refers to
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub descriptor: ExportDescriptor,
    pub raster: Raster,
}

/// "12 August 2023"
pub fn date_label(acquired: &DateTime<Utc>) -> String {
    acquired.format("%-d %B %Y").to_string()
}

/// Cloud percentage with one decimal, "NA" when unknown
pub fn cloud_label(cloud_pct: Option<f64>) -> String {
    match cloud_pct {
        Some(pct) if pct.is_finite() => format!("{:.1}", pct),
        _ => "NA".to_string(),
    }
}

/// "12 August 2023 - heat map (AOI cloud: 7.3%)"; the cloud suffix is
/// omitted when the percentage is unknown
pub fn layer_name(acquired: &DateTime<Utc>, cloud_pct: Option<f64>) -> String {
    let cloud = cloud_label(cloud_pct);
    if cloud == "NA" {
        format!("{} - heat map", date_label(acquired))
    } else {
        format!("{} - heat map (AOI cloud: {}%)", date_label(acquired), cloud)
    }
}

/// Strip everything outside [A-Za-z0-9] and truncate to `max_len` characters
pub fn sanitize_label(label: &str, max_len: usize) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(max_len)
        .collect()
}

/// Builds one export descriptor and Celsius raster per retained scene
pub struct ExportJobBuilder {
    params: ExportParams,
}

impl ExportJobBuilder {
    pub fn new() -> Self {
        Self {
            params: ExportParams::default(),
        }
    }

    pub fn with_params(params: ExportParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ExportParams {
        &self.params
    }

    /// Celsius copy of the source band clipped to the AOI, renamed to the output band
    pub fn celsius_raster(
        &self,
        scene: &CalibratedScene,
        aoi: &AreaOfInterest,
    ) -> LstResult<Raster> {
        let kelvin = scene.band(&self.params.source_band)?;
        let clipped = clip_to_aoi(kelvin, aoi)?;
        Ok(clipped.map(kelvin_to_celsius))
    }

    pub fn descriptor(&self, index: usize, scene: &CalibratedScene, aoi: &AreaOfInterest) -> ExportDescriptor {
        let name = layer_name(&scene.metadata.acquired, scene.cloud_pct());

        let mut safe = sanitize_label(&name, self.params.max_name_len);
        if safe.is_empty() {
            safe = sanitize_label(&format!("scene{}{}", index, scene.metadata.id), self.params.max_name_len);
        }
        let file_name_prefix = format!("{}{}", self.params.file_prefix, safe);

        ExportDescriptor {
            name,
            scene_id: scene.metadata.id.clone(),
            description: format!("Export_{}", file_name_prefix),
            file_name_prefix,
            output_band: self.params.output_band.clone(),
            folder: self.params.folder.clone(),
            region: aoi.bounds(),
            scale: self.params.scale,
            crs: self.params.crs.clone(),
            max_pixels: self.params.max_pixels,
            file_format: self.params.file_format.clone(),
        }
    }

    /// One artifact per scene, in input order. No scene is skipped.
    pub fn build(
        &self,
        scenes: &[CalibratedScene],
        aoi: &AreaOfInterest,
    ) -> LstResult<Vec<ExportArtifact>> {
        log::info!("Building {} export descriptors", scenes.len());

        scenes
            .iter()
            .enumerate()
            .map(|(i, scene)| {
                let raster = self.celsius_raster(scene, aoi)?;
                let descriptor = self.descriptor(i, scene, aoi);
                log::debug!("Export {}: {}", i, descriptor.file_name_prefix);
                Ok(ExportArtifact { descriptor, raster })
            })
            .collect()
    }
}

impl Default for ExportJobBuilder {
    fn default() -> Self {
        Self::new()
    }
}
