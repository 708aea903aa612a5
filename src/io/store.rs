use crate::core::catalog::CatalogQuery;
use crate::types::{LstError, LstResult, Raster, SceneMetadata};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of scenes and their bands. Calls are synchronous; an unreachable
/// backend reports `LstError::TransientService` and is not retried.
pub trait RasterStore: Send + Sync {
    /// Candidate scenes for a query. Implementations may pre-filter coarsely;
    /// the catalog filter applies the exact policy afterwards.
    fn list_scenes(&self, query: &CatalogQuery) -> LstResult<Vec<SceneMetadata>>;

    /// Load one band of a scene
    fn get_band(&self, scene: &SceneMetadata, band: &str) -> LstResult<Raster>;
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    scenes: Vec<(SceneMetadata, HashMap<String, Raster>)>,
    band_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metadata: SceneMetadata, bands: HashMap<String, Raster>) {
        self.scenes.push((metadata, bands));
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Number of `get_band` calls served
    pub fn band_reads(&self) -> usize {
        self.band_reads.load(Ordering::Relaxed)
    }
}

impl RasterStore for MemoryStore {
    fn list_scenes(&self, _query: &CatalogQuery) -> LstResult<Vec<SceneMetadata>> {
        Ok(self.scenes.iter().map(|(m, _)| m.clone()).collect())
    }

    fn get_band(&self, scene: &SceneMetadata, band: &str) -> LstResult<Raster> {
        self.band_reads.fetch_add(1, Ordering::Relaxed);
        self.scenes
            .iter()
            .find(|(m, _)| m.id == scene.id)
            .ok_or_else(|| LstError::Metadata(format!("Unknown scene {}", scene.id)))?
            .1
            .get(band)
            .cloned()
            .ok_or_else(|| LstError::Metadata(format!("Scene {} has no band {}", scene.id, band)))
    }
}
