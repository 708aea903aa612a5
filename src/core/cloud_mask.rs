use crate::core::reduce::{AoiMask, ReducerKind};
use crate::types::{AreaOfInterest, LstError, LstResult, Raster};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Landsat Collection 2 QA_PIXEL bit flags
pub struct QaBits;

impl QaBits {
    pub const FILL: u32 = 1 << 0;
    pub const DILATED_CLOUD: u32 = 1 << 1;
    pub const CIRRUS: u32 = 1 << 2;
    pub const CLOUD: u32 = 1 << 3;
    pub const CLOUD_SHADOW: u32 = 1 << 4;
    pub const SNOW: u32 = 1 << 5;
    pub const CLEAR: u32 = 1 << 6;
    pub const WATER: u32 = 1 << 7;
}

/// Cloud masking parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudMaskParams {
    /// Name of the quality bitmask band
    pub qa_band: String,
    /// A pixel is cloudy when ANY of these bits is set
    pub flags: Vec<u32>,
    /// Sampling resolution for the AOI mean, in CRS units
    pub resolution: f64,
    /// Scenes are retained only when their AOI cloud percentage is strictly below this
    pub max_cloud_pct: f64,
}

impl Default for CloudMaskParams {
    fn default() -> Self {
        Self {
            qa_band: "QA_PIXEL".to_string(),
            flags: vec![QaBits::DILATED_CLOUD, QaBits::CLOUD, QaBits::CLOUD_SHADOW],
            resolution: 30.0,
            max_cloud_pct: 15.0,
        }
    }
}

impl CloudMaskParams {
    /// Combined bitmask of all configured flags
    pub fn mask(&self) -> u32 {
        self.flags.iter().fold(0, |acc, f| acc | f)
    }
}

/// AOI cloud fraction of one scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudFraction {
    /// Fraction of AOI pixels flagged cloudy, in [0,1]
    pub fraction: f64,
    /// True when the reduction produced no value and the scene was treated as fully cloudy
    pub fallback: bool,
}

impl CloudFraction {
    pub fn pct(&self) -> f64 {
        self.fraction * 100.0
    }
}

/// Cache key: the fraction depends on the AOI as much as on the scene
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    scene_id: String,
    aoi: Vec<(u64, u64)>,
}

impl CacheKey {
    fn new(scene_id: &str, aoi: &AreaOfInterest) -> Self {
        Self {
            scene_id: scene_id.to_string(),
            aoi: aoi.ring().iter().map(|p| (p[0].to_bits(), p[1].to_bits())).collect(),
        }
    }
}

/// Decodes the QA bitmask and computes per-scene AOI cloud fractions. Results
/// are cached by scene id and AOI.
pub struct CloudMaskEvaluator {
    params: CloudMaskParams,
    cache: Mutex<HashMap<CacheKey, CloudFraction>>,
}

impl CloudMaskEvaluator {
    pub fn new() -> Self {
        Self::with_params(CloudMaskParams::default())
    }

    pub fn with_params(params: CloudMaskParams) -> Self {
        Self {
            params,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn params(&self) -> &CloudMaskParams {
        &self.params
    }

    /// Cloud indicator per pixel: 1.0 when any configured bit is set, 0.0
    /// otherwise, NaN where the QA sample itself is missing
    pub fn cloud_indicator(&self, qa: &Raster) -> Raster {
        let mask = self.params.mask();
        qa.map(|v| {
            if v.is_nan() {
                f64::NAN
            } else if (v as u32) & mask != 0 {
                1.0
            } else {
                0.0
            }
        })
    }

    /// Mean of the cloud indicator over the AOI. A reduction without any usable
    /// pixel counts as fully cloudy.
    pub fn evaluate(
        &self,
        scene_id: &str,
        qa: &Raster,
        aoi: &AreaOfInterest,
    ) -> LstResult<CloudFraction> {
        if let Some(cached) = self.cached(scene_id, aoi) {
            log::debug!("Cloud fraction for {} served from cache", scene_id);
            return Ok(cached);
        }

        let indicator = self.cloud_indicator(qa);
        let mask = AoiMask::new(aoi, &indicator, self.params.resolution)?;

        let result = match mask.reduce(&indicator.data, ReducerKind::Mean) {
            Some(mean) => CloudFraction {
                fraction: mean.clamp(0.0, 1.0),
                fallback: false,
            },
            None => {
                log::warn!(
                    "Scene {}: {}; treating as 100% cloudy",
                    scene_id,
                    LstError::ReductionUnavailable("no valid QA pixels inside the AOI".to_string())
                );
                CloudFraction {
                    fraction: 1.0,
                    fallback: true,
                }
            }
        };

        log::debug!("Scene {}: AOI cloud {:.1}%", scene_id, result.pct());

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(CacheKey::new(scene_id, aoi), result);
        }
        Ok(result)
    }

    pub fn cached(&self, scene_id: &str, aoi: &AreaOfInterest) -> Option<CloudFraction> {
        let key = CacheKey::new(scene_id, aoi);
        self.cache.lock().ok().and_then(|c| c.get(&key).copied())
    }

    /// Strict threshold: a scene exactly at the threshold is rejected.
    /// Compared as fractions; scaling the fraction to percent rounds.
    pub fn passes_threshold(&self, cloud: &CloudFraction) -> bool {
        cloud.fraction < self.params.max_cloud_pct / 100.0
    }
}

impl Default for CloudMaskEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
