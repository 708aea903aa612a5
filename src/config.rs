use crate::core::calibrate::CalibrationParams;
use crate::core::canopy::CanopyParams;
use crate::core::catalog::{CatalogQuery, MonthRange, YearRange};
use crate::core::classify::TemperatureClasses;
use crate::core::cloud_mask::CloudMaskParams;
use crate::core::export::ExportParams;
use crate::core::global_range::GlobalRangeParams;
use crate::core::presentation::THERMAL_PALETTE;
use crate::types::{AreaOfInterest, LstError, LstResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full configuration of a heat-map run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// AOI exterior ring. Must be in the scene CRS unless `aoi_crs` says otherwise
    /// and the store can reproject it.
    pub aoi: Vec<[f64; 2]>,
    pub aoi_crs: String,
    pub months: MonthRange,
    pub years: YearRange,
    pub max_scene_cloud_cover: Option<f64>,
    /// Optical bands loaded for the true-colour context layer
    pub optical_bands: Vec<String>,
    /// Display palette (hex colours); not used by any computation
    pub palette: Vec<String>,
    pub class_bounds: Vec<f64>,
    pub cloud: CloudMaskParams,
    pub calibration: CalibrationParams,
    pub range: GlobalRangeParams,
    pub export: ExportParams,
    pub canopy: CanopyParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // Oxford
            aoi: vec![
                [-1.3302124313083241, 51.70665641633338],
                [-1.1606109908786366, 51.70665641633338],
                [-1.1606109908786366, 51.79847234686127],
                [-1.3302124313083241, 51.79847234686127],
                [-1.3302124313083241, 51.70665641633338],
            ],
            aoi_crs: "EPSG:4326".to_string(),
            months: MonthRange { min: 6, max: 8 },
            years: YearRange { min: 2020, max: 2025 },
            max_scene_cloud_cover: None,
            optical_bands: vec!["SR_B4".to_string(), "SR_B3".to_string(), "SR_B2".to_string()],
            palette: THERMAL_PALETTE.iter().map(|c| c.to_string()).collect(),
            class_bounds: TemperatureClasses::default().bounds().to_vec(),
            cloud: CloudMaskParams::default(),
            calibration: CalibrationParams::default(),
            range: GlobalRangeParams::default(),
            export: ExportParams::default(),
            canopy: CanopyParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> LstResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> LstResult<Self> {
        log::info!("Loading configuration from {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> LstResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `<config dir>/lstmap/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("lstmap").join("config.json"))
    }

    pub fn validate(&self) -> LstResult<()> {
        self.months.validate()?;
        self.years.validate()?;

        let pct = self.cloud.max_cloud_pct;
        if !(pct > 0.0 && pct <= 100.0) {
            return Err(LstError::Config(format!(
                "Cloud threshold must be in (0, 100], got {}",
                pct
            )));
        }

        if let Some(cap) = self.max_scene_cloud_cover {
            if !(0.0..=100.0).contains(&cap) {
                return Err(LstError::Config(format!(
                    "Scene cloud cover cap must be in [0, 100], got {}",
                    cap
                )));
            }
        }

        for (what, res) in [
            ("cloud.resolution", self.cloud.resolution),
            ("range.resolution", self.range.resolution),
            ("export.scale", self.export.scale),
        ] {
            if !(res > 0.0) {
                return Err(LstError::Config(format!("{} must be positive, got {}", what, res)));
            }
        }

        if self.cloud.flags.is_empty() {
            return Err(LstError::Config("At least one cloud bit flag is required".to_string()));
        }

        if self.export.max_name_len == 0 {
            return Err(LstError::Config("export.max_name_len must be at least 1".to_string()));
        }

        TemperatureClasses::new(self.class_bounds.clone())?;
        self.aoi()?;
        Ok(())
    }

    pub fn aoi(&self) -> LstResult<AreaOfInterest> {
        AreaOfInterest::from_ring(&self.aoi)
    }

    pub fn classes(&self) -> LstResult<TemperatureClasses> {
        TemperatureClasses::new(self.class_bounds.clone())
    }

    /// Catalog query with the given AOI (which may be a reprojection of `self.aoi`)
    pub fn query(&self, aoi: AreaOfInterest) -> CatalogQuery {
        CatalogQuery {
            aoi,
            months: self.months,
            years: self.years,
            max_scene_cloud_cover: self.max_scene_cloud_cover,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cloud.max_cloud_pct, 15.0);
        assert_eq!(config.cloud.mask(), 26);
        assert_eq!(config.palette.len(), 10);
    }

    #[test]
    fn test_json_round_trip_with_partial_input() {
        let json = r#"{
            "months": {"min": 7, "max": 7},
            "cloud": {"max_cloud_pct": 20.0}
        }"#;
        let config = PipelineConfig::from_json_str(json).unwrap();
        assert_eq!(config.months.min, 7);
        assert_eq!(config.cloud.max_cloud_pct, 20.0);
        assert_eq!(config.cloud.qa_band, "QA_PIXEL");
        assert_eq!(config.years.max, 2025);

        let again = PipelineConfig::from_json_str(&config.to_json_string().unwrap()).unwrap();
        assert_eq!(again.months, config.months);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PipelineConfig::from_json_str(r#"{"months": {"min": 13, "max": 2}}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"cloud": {"max_cloud_pct": 0.0}}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"aoi": [[0,0],[1,1],[1,0],[0,1]]}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"class_bounds": [3, 1, 2]}"#).is_err());
        assert!(PipelineConfig::from_json_str("not json").is_err());
    }
}
