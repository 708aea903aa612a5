use crate::types::{CalibratedScene, LstError, LstResult, Raster, Scene};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Offset between Kelvin and degrees Celsius
pub const KELVIN_OFFSET: f64 = 273.15;

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}

/// Band groups sharing one linear DN conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandGroup {
    Optical,  // surface reflectance
    Thermal,  // brightness temperature (K)
    Other,    // QA and auxiliary bands, left untouched
}

/// Linear scale/offset applied to raw digital numbers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearCoefficients {
    pub scale: f64,
    pub offset: f64,
}

impl LinearCoefficients {
    #[inline]
    pub fn apply(&self, dn: f64) -> f64 {
        dn * self.scale + self.offset
    }
}

/// Calibration parameters (Landsat Collection 2 Level-2 defaults)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Regex selecting optical reflectance bands
    pub optical_pattern: String,
    /// Regex selecting thermal bands
    pub thermal_pattern: String,
    pub optical: LinearCoefficients,
    pub thermal: LinearCoefficients,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            optical_pattern: r"^SR_B\d+$".to_string(),
            thermal_pattern: r"^ST_B\d+$".to_string(),
            optical: LinearCoefficients {
                scale: 0.0000275,
                offset: -0.2,
            },
            thermal: LinearCoefficients {
                scale: 0.00341802,
                offset: 149.0,
            },
        }
    }
}

/// Converts raw DN bands to physical units. Consumes the raw scene, so a
/// scene can only be calibrated once.
pub struct RadiometricCalibrator {
    params: CalibrationParams,
    optical: Regex,
    thermal: Regex,
    invocations: AtomicUsize,
}

impl RadiometricCalibrator {
    pub fn new() -> LstResult<Self> {
        Self::with_params(CalibrationParams::default())
    }

    pub fn with_params(params: CalibrationParams) -> LstResult<Self> {
        let optical = Regex::new(&params.optical_pattern)
            .map_err(|e| LstError::Config(format!("Invalid optical band pattern: {}", e)))?;
        let thermal = Regex::new(&params.thermal_pattern)
            .map_err(|e| LstError::Config(format!("Invalid thermal band pattern: {}", e)))?;

        Ok(Self {
            params,
            optical,
            thermal,
            invocations: AtomicUsize::new(0),
        })
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    pub fn band_group(&self, band_name: &str) -> BandGroup {
        if self.optical.is_match(band_name) {
            BandGroup::Optical
        } else if self.thermal.is_match(band_name) {
            BandGroup::Thermal
        } else {
            BandGroup::Other
        }
    }

    pub fn coefficients(&self, group: BandGroup) -> Option<LinearCoefficients> {
        match group {
            BandGroup::Optical => Some(self.params.optical),
            BandGroup::Thermal => Some(self.params.thermal),
            BandGroup::Other => None,
        }
    }

    /// Number of scenes calibrated so far
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Calibrate every optical and thermal band of `scene`. Bands keep their
    /// names; id, timestamp and cloud fraction are carried over unchanged.
    pub fn calibrate(&self, scene: Scene) -> CalibratedScene {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        log::debug!("Calibrating scene {} ({} bands)", scene.metadata.id, scene.bands.len());

        let bands: HashMap<String, Raster> = scene
            .bands
            .into_iter()
            .map(|(name, raster)| {
                let calibrated = self.calibrate_band(&name, raster);
                (name, calibrated)
            })
            .collect();

        CalibratedScene {
            metadata: scene.metadata,
            bands,
            cloud_fraction: scene.cloud_fraction,
        }
    }

    /// Per-band parallel variant
    #[cfg(feature = "parallel")]
    pub fn calibrate_parallel(&self, scene: Scene) -> CalibratedScene {
        use rayon::prelude::*;

        self.invocations.fetch_add(1, Ordering::Relaxed);
        log::debug!("Calibrating scene {} in parallel", scene.metadata.id);

        let bands: HashMap<String, Raster> = scene
            .bands
            .into_par_iter()
            .map(|(name, mut raster)| {
                if let Some(coeff) = self.coefficients(self.band_group(&name)) {
                    raster.data.par_mapv_inplace(|dn| coeff.apply(dn));
                }
                (name, raster)
            })
            .collect();

        CalibratedScene {
            metadata: scene.metadata,
            bands,
            cloud_fraction: scene.cloud_fraction,
        }
    }

    fn calibrate_band(&self, name: &str, mut raster: Raster) -> Raster {
        match self.coefficients(self.band_group(name)) {
            Some(coeff) => {
                raster.data.mapv_inplace(|dn| coeff.apply(dn));
                raster
            }
            None => raster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoTransform, SceneMetadata};
    use approx::assert_abs_diff_eq;
    use chrono::{TimeZone, Utc};
    use geo::{LineString, Polygon};
    use ndarray::Array2;

    fn raw_scene() -> Scene {
        let gt = GeoTransform::north_up(0.0, 60.0, 30.0);
        let mut bands = HashMap::new();
        bands.insert(
            "SR_B4".to_string(),
            Raster::new(Array2::from_elem((2, 2), 10000.0), gt),
        );
        bands.insert(
            "ST_B10".to_string(),
            Raster::new(Array2::from_elem((2, 2), 44000.0), gt),
        );
        bands.insert(
            "QA_PIXEL".to_string(),
            Raster::new(Array2::from_elem((2, 2), 21824.0), gt),
        );
        Scene {
            metadata: SceneMetadata {
                id: "LC08_TEST".to_string(),
                acquired: Utc.with_ymd_and_hms(2023, 8, 12, 11, 0, 0).unwrap(),
                footprint: Polygon::new(LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]), vec![]),
                scene_cloud_cover: Some(3.0),
                spacecraft: "LANDSAT_8".to_string(),
            },
            bands,
            cloud_fraction: Some(0.073),
        }
    }

    #[test]
    fn test_band_groups() {
        let calibrator = RadiometricCalibrator::new().unwrap();
        assert_eq!(calibrator.band_group("SR_B1"), BandGroup::Optical);
        assert_eq!(calibrator.band_group("SR_B7"), BandGroup::Optical);
        assert_eq!(calibrator.band_group("ST_B10"), BandGroup::Thermal);
        assert_eq!(calibrator.band_group("QA_PIXEL"), BandGroup::Other);
        assert_eq!(calibrator.band_group("ST_QA"), BandGroup::Other);
        assert_eq!(calibrator.band_group("SR_QA_AEROSOL"), BandGroup::Other);
    }

    #[test]
    fn test_linear_conversions() {
        let calibrator = RadiometricCalibrator::new().unwrap();
        let calibrated = calibrator.calibrate(raw_scene());

        let optical = calibrated.band("SR_B4").unwrap().data[[0, 0]];
        assert_abs_diff_eq!(optical, 10000.0 * 0.0000275 - 0.2, epsilon = 1e-9);

        let thermal = calibrated.band("ST_B10").unwrap().data[[1, 1]];
        assert_abs_diff_eq!(thermal, 44000.0 * 0.00341802 + 149.0, epsilon = 1e-9);
        assert_abs_diff_eq!(kelvin_to_celsius(thermal), 44000.0 * 0.00341802 + 149.0 - 273.15, epsilon = 1e-9);

        assert_eq!(calibrated.band("QA_PIXEL").unwrap().data[[0, 0]], 21824.0);
    }

    #[test]
    fn test_metadata_preserved() {
        let calibrator = RadiometricCalibrator::new().unwrap();
        let raw = raw_scene();
        let expected = raw.metadata.clone();
        let calibrated = calibrator.calibrate(raw);
        assert_eq!(calibrated.metadata, expected);
        assert_eq!(calibrated.cloud_fraction, Some(0.073));
        assert_eq!(calibrator.invocations(), 1);
    }

    #[test]
    fn test_nan_passes_through() {
        let coeff = CalibrationParams::default().thermal;
        assert!(coeff.apply(f64::NAN).is_nan());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let calibrator = RadiometricCalibrator::new().unwrap();
        let seq = calibrator.calibrate(raw_scene());
        let par = calibrator.calibrate_parallel(raw_scene());
        for (name, raster) in &seq.bands {
            assert_eq!(raster, par.band(name).unwrap());
        }
        assert_eq!(calibrator.invocations(), 2);
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let params = CalibrationParams {
            optical_pattern: "SR_B(".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            RadiometricCalibrator::with_params(params),
            Err(LstError::Config(_))
        ));
    }
}
