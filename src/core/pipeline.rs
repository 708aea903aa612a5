//! End-to-end land surface temperature run:
//! catalog filter -> AOI cloud mask -> threshold -> calibration -> global range -> exports

use crate::config::PipelineConfig;
use crate::core::calibrate::RadiometricCalibrator;
use crate::core::catalog::CatalogFilter;
use crate::core::cloud_mask::{CloudFraction, CloudMaskEvaluator};
use crate::core::export::{ExportArtifact, ExportJobBuilder};
use crate::core::global_range::GlobalRangeReducer;
use crate::core::presentation::{Layer, Legend, PresentationContext, VisParams};
use crate::core::reduce::{clip_to_aoi, composite, CompositeKind};
use crate::io::store::RasterStore;
use crate::io::submit::JobSubmitter;
use crate::types::{
    AreaOfInterest, CalibratedScene, GlobalRange, LstError, LstResult, Raster, Scene, SceneMetadata,
};
use std::collections::HashMap;

/// Cloud screening outcome of one scene
#[derive(Debug, Clone)]
pub struct CloudScreening {
    pub scene_id: String,
    pub cloud: CloudFraction,
    pub retained: bool,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub scenes: Vec<CalibratedScene>,
    pub screening: Vec<CloudScreening>,
    pub global_range: GlobalRange,
    pub exports: Vec<ExportArtifact>,
    /// Median true-colour composite by band name, empty when unavailable
    pub true_color: HashMap<String, Raster>,
    pub presentation: PresentationContext,
}

impl PipelineOutput {
    pub fn descriptors(&self) -> Vec<&crate::types::ExportDescriptor> {
        self.exports.iter().map(|a| &a.descriptor).collect()
    }
}

pub struct HeatMapPipeline {
    config: PipelineConfig,
    calibrator: RadiometricCalibrator,
    cloud_mask: CloudMaskEvaluator,
    range_reducer: GlobalRangeReducer,
    export_builder: ExportJobBuilder,
}

impl HeatMapPipeline {
    pub fn new(config: PipelineConfig) -> LstResult<Self> {
        config.validate()?;
        Ok(Self {
            calibrator: RadiometricCalibrator::with_params(config.calibration.clone())?,
            cloud_mask: CloudMaskEvaluator::with_params(config.cloud.clone()),
            range_reducer: GlobalRangeReducer::with_params(config.range.clone()),
            export_builder: ExportJobBuilder::with_params(config.export.clone()),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn calibrator(&self) -> &RadiometricCalibrator {
        &self.calibrator
    }

    /// Run with the AOI from the configuration
    pub fn run(&self, store: &dyn RasterStore) -> LstResult<PipelineOutput> {
        let aoi = self.config.aoi()?;
        self.run_with_aoi(store, &aoi)
    }

    /// Run against an AOI already expressed in the store's CRS
    pub fn run_with_aoi(&self, store: &dyn RasterStore, aoi: &AreaOfInterest) -> LstResult<PipelineOutput> {
        log::info!("Starting heat map run");

        let query = self.config.query(aoi.clone());
        let candidates = store.list_scenes(&query)?;
        let filtered = CatalogFilter::new(query).apply(candidates)?;

        let (retained, screening) = self.screen_clouds(store, &filtered, aoi)?;
        if retained.is_empty() {
            return Err(LstError::EmptyResult(format!(
                "no images left after calendar, AOI-cloud (< {}%) and footprint filters; \
                 widen the windows or increase the cloud threshold",
                self.config.cloud.max_cloud_pct
            )));
        }
        log::info!(
            "{} of {} scenes below {}% AOI cloud",
            retained.len(),
            filtered.len(),
            self.config.cloud.max_cloud_pct
        );

        let raw = retained
            .into_iter()
            .map(|(meta, cloud)| self.load_scene(store, meta, cloud))
            .collect::<LstResult<Vec<Scene>>>()?;

        let scenes = self.calibrate_all(raw);
        let global_range = self.range_reducer.reduce(&scenes, aoi)?;
        let exports = self.export_builder.build(&scenes, aoi)?;
        let true_color = self.true_color(&scenes, aoi);
        let presentation = self.presentation(&scenes, &global_range, &exports, !true_color.is_empty());

        log::info!("Run complete: {} export descriptors", exports.len());

        Ok(PipelineOutput {
            scenes,
            screening,
            global_range,
            exports,
            true_color,
            presentation,
        })
    }

    /// Queue every export; the first failure aborts the remaining submissions
    pub fn submit_all(
        &self,
        exports: &[ExportArtifact],
        submitter: &dyn JobSubmitter,
    ) -> LstResult<Vec<String>> {
        exports
            .iter()
            .map(|a| submitter.submit(&a.descriptor, &a.raster))
            .collect()
    }

    fn screen_clouds(
        &self,
        store: &dyn RasterStore,
        scenes: &[SceneMetadata],
        aoi: &AreaOfInterest,
    ) -> LstResult<(Vec<(SceneMetadata, CloudFraction)>, Vec<CloudScreening>)> {
        let qa_band = &self.config.cloud.qa_band;
        let mut retained = Vec::new();
        let mut screening = Vec::with_capacity(scenes.len());

        for meta in scenes {
            let qa = store.get_band(meta, qa_band)?;
            let cloud = self.cloud_mask.evaluate(&meta.id, &qa, aoi)?;
            let keep = self.cloud_mask.passes_threshold(&cloud);

            log::debug!(
                "Scene {}: AOI cloud {:.1}% -> {}",
                meta.id,
                cloud.pct(),
                if keep { "kept" } else { "rejected" }
            );

            screening.push(CloudScreening {
                scene_id: meta.id.clone(),
                cloud,
                retained: keep,
            });
            if keep {
                retained.push((meta.clone(), cloud));
            }
        }

        Ok((retained, screening))
    }

    fn load_scene(
        &self,
        store: &dyn RasterStore,
        metadata: SceneMetadata,
        cloud: CloudFraction,
    ) -> LstResult<Scene> {
        let mut names: Vec<&String> = self.config.optical_bands.iter().collect();
        names.push(&self.config.range.band);
        if self.config.export.source_band != self.config.range.band {
            names.push(&self.config.export.source_band);
        }

        let mut bands = HashMap::new();
        for name in names {
            bands.insert(name.clone(), store.get_band(&metadata, name)?);
        }

        Ok(Scene {
            metadata,
            bands,
            cloud_fraction: Some(cloud.fraction),
        })
    }

    #[cfg(feature = "parallel")]
    fn calibrate_all(&self, scenes: Vec<Scene>) -> Vec<CalibratedScene> {
        use rayon::prelude::*;
        scenes
            .into_par_iter()
            .map(|scene| self.calibrator.calibrate(scene))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn calibrate_all(&self, scenes: Vec<Scene>) -> Vec<CalibratedScene> {
        scenes
            .into_iter()
            .map(|scene| self.calibrator.calibrate(scene))
            .collect()
    }

    /// Per-band median composite of the optical bands, clipped to the AOI.
    /// Skipped with a warning when the scenes do not share one grid.
    fn true_color(&self, scenes: &[CalibratedScene], aoi: &AreaOfInterest) -> HashMap<String, Raster> {
        let mut out = HashMap::new();
        for band in &self.config.optical_bands {
            let stack: LstResult<Vec<&Raster>> = scenes.iter().map(|s| s.band(band)).collect();
            let result = stack
                .and_then(|stack| composite(&stack, CompositeKind::Median))
                .and_then(|median| clip_to_aoi(&median, aoi));
            match result {
                Ok(raster) => {
                    out.insert(band.clone(), raster);
                }
                Err(e) => {
                    log::warn!("True colour composite unavailable: {}", e);
                    return HashMap::new();
                }
            }
        }
        out
    }

    fn presentation(
        &self,
        scenes: &[CalibratedScene],
        range: &GlobalRange,
        exports: &[ExportArtifact],
        has_true_color: bool,
    ) -> PresentationContext {
        let mut ctx = PresentationContext::new();

        ctx.add_layer(Layer {
            name: "AOI".to_string(),
            visible: true,
            vis: VisParams {
                min: 0.0,
                max: 0.0,
                palette: vec!["ff0000".to_string()],
                bands: Vec::new(),
            },
            scene_id: None,
        });

        if has_true_color {
            ctx.add_layer(Layer {
                name: "True Color (median)".to_string(),
                visible: true,
                vis: VisParams {
                    min: 0.0,
                    max: 0.3,
                    palette: Vec::new(),
                    bands: self.config.optical_bands.clone(),
                },
                scene_id: None,
            });
        }

        for (scene, artifact) in scenes.iter().zip(exports) {
            ctx.add_layer(Layer {
                name: artifact.descriptor.name.clone(),
                visible: false,
                vis: VisParams {
                    min: range.min,
                    max: range.max,
                    palette: self.config.palette.clone(),
                    bands: vec![self.config.export.output_band.clone()],
                },
                scene_id: Some(scene.metadata.id.clone()),
            });
        }

        ctx.set_legend(Legend::for_range("Surface Temperature (°C)", range, &self.config.palette));

        let descriptors: Vec<_> = exports.iter().map(|a| a.descriptor.clone()).collect();
        ctx.add_export_triggers(&descriptors);
        ctx
    }
}
