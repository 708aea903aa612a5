use crate::core::geometry::footprint_contains;
use crate::types::{AreaOfInterest, LstError, LstResult, SceneMetadata};
use serde::{Deserialize, Serialize};

/// Inclusive calendar month window. A window with `min > max` wraps
/// around the year end (e.g. 11..=2 keeps Nov, Dec, Jan, Feb).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub min: u32,
    pub max: u32,
}

impl MonthRange {
    pub fn new(min: u32, max: u32) -> LstResult<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> LstResult<()> {
        if !(1..=12).contains(&self.min) || !(1..=12).contains(&self.max) {
            return Err(LstError::Config(format!(
                "Month range {}..={} outside 1..=12",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn contains(&self, month: u32) -> bool {
        if self.min <= self.max {
            self.min <= month && month <= self.max
        } else {
            month >= self.min || month <= self.max
        }
    }
}

/// Inclusive calendar year window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn new(min: i32, max: i32) -> LstResult<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> LstResult<()> {
        if self.min > self.max {
            return Err(LstError::Config(format!(
                "Year range {}..={} is empty",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn contains(&self, year: i32) -> bool {
        self.min <= year && year <= self.max
    }
}

/// Scene selection criteria
#[derive(Debug, Clone)]
pub struct CatalogQuery {
    pub aoi: AreaOfInterest,
    pub months: MonthRange,
    pub years: YearRange,
    /// Optional cap on the provider's scene-wide cloud cover (percent)
    pub max_scene_cloud_cover: Option<f64>,
}

/// Selects candidate scenes by date window and footprint containment
pub struct CatalogFilter {
    query: CatalogQuery,
}

impl CatalogFilter {
    pub fn new(query: CatalogQuery) -> Self {
        Self { query }
    }

    pub fn query(&self) -> &CatalogQuery {
        &self.query
    }

    /// Keep the scenes matching every criterion, sorted by acquisition time
    /// ascending. Fails with `EmptyResult` when nothing survives.
    pub fn apply(&self, candidates: Vec<SceneMetadata>) -> LstResult<Vec<SceneMetadata>> {
        let total = candidates.len();
        log::info!("Filtering {} candidate scenes", total);

        let mut kept: Vec<SceneMetadata> = candidates
            .into_iter()
            .filter(|scene| self.matches(scene))
            .collect();

        kept.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.id.cmp(&b.id)));

        log::info!("{} of {} scenes passed the catalog filter", kept.len(), total);

        if kept.is_empty() {
            return Err(LstError::EmptyResult(format!(
                "none of {} candidate scenes match months {}..={}, years {}..={} and AOI containment; widen the filters",
                total,
                self.query.months.min,
                self.query.months.max,
                self.query.years.min,
                self.query.years.max
            )));
        }

        Ok(kept)
    }

    fn matches(&self, scene: &SceneMetadata) -> bool {
        if !self.query.months.contains(scene.month()) || !self.query.years.contains(scene.year()) {
            log::debug!("Scene {} outside date window", scene.id);
            return false;
        }

        if let (Some(cap), Some(cover)) = (self.query.max_scene_cloud_cover, scene.scene_cloud_cover) {
            if cover > cap {
                log::debug!("Scene {} scene cloud cover {:.1}% above {:.1}%", scene.id, cover, cap);
                return false;
            }
        }

        if !footprint_contains(&scene.footprint, self.query.aoi.polygon()) {
            log::debug!("Scene {} footprint does not contain the AOI", scene.id);
            return false;
        }

        true
    }
}
