//! Core land surface temperature processing modules

pub mod geometry;
pub mod reduce;
pub mod catalog;
pub mod cloud_mask;
pub mod calibrate;
pub mod global_range;
pub mod export;
pub mod classify;
pub mod canopy;
pub mod presentation;
pub mod pipeline;

// Re-export main types
pub use reduce::{AoiMask, ReducerKind, CompositeKind, reduce_region, clip_to_aoi, composite};
pub use catalog::{CatalogFilter, CatalogQuery, MonthRange, YearRange};
pub use cloud_mask::{CloudMaskEvaluator, CloudMaskParams, CloudFraction, QaBits};
pub use calibrate::{RadiometricCalibrator, CalibrationParams, LinearCoefficients, BandGroup, kelvin_to_celsius};
pub use global_range::{GlobalRangeReducer, GlobalRangeParams};
pub use export::{ExportJobBuilder, ExportParams, ExportArtifact, layer_name, sanitize_label};
pub use classify::TemperatureClasses;
pub use canopy::{CanopyHeightProcessor, CanopyParams};
pub use presentation::{PresentationContext, Layer, Legend, VisParams, ExportTrigger, THERMAL_PALETTE};
pub use pipeline::{HeatMapPipeline, PipelineOutput, CloudScreening};
