use crate::core::calibrate::{celsius_to_kelvin, kelvin_to_celsius};
use crate::core::reduce::{AoiMask, ReducerKind};
use crate::types::{AreaOfInterest, CalibratedScene, GlobalRange, LstError, LstResult};
use serde::{Deserialize, Serialize};

/// Parameters of the collection-wide display range
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalRangeParams {
    /// Band whose range is computed (Kelvin)
    pub band: String,
    pub resolution: f64,
    /// Lower bound enforced on the reported minimum (°C)
    pub min_floor_c: f64,
    /// Bounds used when no valid pixel exists anywhere (°C)
    pub default_min_c: f64,
    pub default_max_c: f64,
}

impl Default for GlobalRangeParams {
    fn default() -> Self {
        Self {
            band: "ST_B10".to_string(),
            resolution: 30.0,
            min_floor_c: -5.0,
            default_min_c: -5.0,
            default_max_c: 25.0,
        }
    }
}

/// Reduces a derived band to one min/max over all scenes and the AOI
pub struct GlobalRangeReducer {
    params: GlobalRangeParams,
}

impl GlobalRangeReducer {
    pub fn new() -> Self {
        Self {
            params: GlobalRangeParams::default(),
        }
    }

    pub fn with_params(params: GlobalRangeParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GlobalRangeParams {
        &self.params
    }

    /// Per-scene (min, max) of the target band in Kelvin; `None` when the scene
    /// has no valid pixel in the AOI
    pub fn scene_extrema(
        &self,
        scene: &CalibratedScene,
        aoi: &AreaOfInterest,
    ) -> LstResult<Option<(f64, f64)>> {
        let band = scene.band(&self.params.band)?;
        let mask = AoiMask::new(aoi, band, self.params.resolution)?;
        let min = mask.reduce(&band.data, ReducerKind::Min);
        let max = mask.reduce(&band.data, ReducerKind::Max);
        Ok(min.zip(max))
    }

    /// Compute the collection range in °C. Falls back to the default bounds
    /// with a warning when no scene yields a value.
    pub fn reduce(
        &self,
        scenes: &[CalibratedScene],
        aoi: &AreaOfInterest,
    ) -> LstResult<GlobalRange> {
        log::info!(
            "Computing {} range over {} scenes at {} resolution",
            self.params.band,
            scenes.len(),
            self.params.resolution
        );

        let extrema = self.collect_extrema(scenes, aoi)?;
        let range = self.combine(extrema.into_iter().flatten());

        log::info!(
            "Computed collection {} range (°C): {:.2} to {:.2}",
            self.params.band,
            range.computed_min,
            range.max
        );
        log::info!("Enforced min (°C) used for visualisation: {:.2}", range.min);

        Ok(range)
    }

    #[cfg(feature = "parallel")]
    fn collect_extrema(
        &self,
        scenes: &[CalibratedScene],
        aoi: &AreaOfInterest,
    ) -> LstResult<Vec<Option<(f64, f64)>>> {
        use rayon::prelude::*;

        scenes
            .par_iter()
            .map(|scene| self.scene_extrema(scene, aoi))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn collect_extrema(
        &self,
        scenes: &[CalibratedScene],
        aoi: &AreaOfInterest,
    ) -> LstResult<Vec<Option<(f64, f64)>>> {
        scenes.iter().map(|scene| self.scene_extrema(scene, aoi)).collect()
    }

    /// Fold per-scene Kelvin extrema into the floor-clamped Celsius range
    pub fn combine(&self, extrema: impl IntoIterator<Item = (f64, f64)>) -> GlobalRange {
        let global = extrema.into_iter().fold(None, |acc: Option<(f64, f64)>, (lo, hi)| {
            Some(match acc {
                Some((a, b)) => (a.min(lo), b.max(hi)),
                None => (lo, hi),
            })
        });

        let (min_k, max_k, fallback) = match global {
            Some((lo, hi)) => (lo, hi, false),
            None => {
                log::warn!(
                    "{}; falling back to defaults ({} to {} °C)",
                    LstError::ReductionUnavailable(format!(
                        "could not compute collection min/max of {}",
                        self.params.band
                    )),
                    self.params.default_min_c,
                    self.params.default_max_c
                );
                (
                    celsius_to_kelvin(self.params.default_min_c),
                    celsius_to_kelvin(self.params.default_max_c),
                    true,
                )
            }
        };

        let computed_min = kelvin_to_celsius(min_k);
        GlobalRange {
            min: computed_min.max(self.params.min_floor_c),
            max: kelvin_to_celsius(max_k),
            computed_min,
            fallback,
        }
    }
}

impl Default for GlobalRangeReducer {
    fn default() -> Self {
        Self::new()
    }
}
