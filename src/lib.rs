//! lstmap: Landsat land surface temperature heat maps
//!
//! Selects Landsat Collection 2 Level-2 scenes over an area of interest, screens
//! them by the cloud fraction inside the AOI, calibrates surface reflectance and
//! surface temperature bands, derives one colour range shared by every scene and
//! builds Celsius GeoTIFF export jobs.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use self::types::{
    AreaOfInterest, BoundingBox, CalibratedScene, ExportDescriptor, GeoTransform, GlobalRange,
    LstError, LstResult, Raster, Scene, SceneMetadata,
};
pub use self::config::PipelineConfig;
pub use self::core::{HeatMapPipeline, PipelineOutput};
pub use self::io::{JobSubmitter, MemoryStore, RasterStore};

#[cfg(feature = "python")]
mod python {
    use crate::core::calibrate::{kelvin_to_celsius, CalibrationParams};
    use crate::core::export::{cloud_label, layer_name, sanitize_label};
    use crate::core::global_range::GlobalRangeReducer;
    use chrono::DateTime;
    use pyo3::prelude::*;

    fn to_py_err(e: impl std::fmt::Display) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
    }

    /// Scale raw ST_B* digital numbers to Kelvin
    #[pyfunction]
    fn calibrate_thermal(values: Vec<f64>) -> Vec<f64> {
        let coeff = CalibrationParams::default().thermal;
        values.into_iter().map(|dn| coeff.apply(dn)).collect()
    }

    /// Scale raw SR_B* digital numbers to reflectance
    #[pyfunction]
    fn calibrate_optical(values: Vec<f64>) -> Vec<f64> {
        let coeff = CalibrationParams::default().optical;
        values.into_iter().map(|dn| coeff.apply(dn)).collect()
    }

    #[pyfunction]
    #[pyo3(name = "kelvin_to_celsius")]
    fn py_kelvin_to_celsius(kelvin: f64) -> f64 {
        kelvin_to_celsius(kelvin)
    }

    #[pyfunction]
    #[pyo3(name = "sanitize_label", signature = (label, max_len = 60))]
    fn py_sanitize_label(label: &str, max_len: usize) -> String {
        sanitize_label(label, max_len)
    }

    /// Layer name for an acquisition time given in milliseconds since the epoch
    #[pyfunction]
    #[pyo3(name = "layer_name", signature = (millis, cloud_pct = None))]
    fn py_layer_name(millis: i64, cloud_pct: Option<f64>) -> PyResult<String> {
        let acquired = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| to_py_err(format!("Timestamp out of range: {}", millis)))?;
        Ok(layer_name(&acquired, cloud_pct))
    }

    #[pyfunction]
    #[pyo3(name = "cloud_label", signature = (cloud_pct = None))]
    fn py_cloud_label(cloud_pct: Option<f64>) -> String {
        cloud_label(cloud_pct)
    }

    /// Collection range in °C from per-scene (min, max) Kelvin pairs.
    /// Returns (min, max, fallback).
    #[pyfunction]
    fn global_range(extrema: Vec<(f64, f64)>) -> (f64, f64, bool) {
        let range = GlobalRangeReducer::new().combine(extrema);
        (range.min, range.max, range.fallback)
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(calibrate_thermal, m)?)?;
        m.add_function(wrap_pyfunction!(calibrate_optical, m)?)?;
        m.add_function(wrap_pyfunction!(py_kelvin_to_celsius, m)?)?;
        m.add_function(wrap_pyfunction!(py_sanitize_label, m)?)?;
        m.add_function(wrap_pyfunction!(py_layer_name, m)?)?;
        m.add_function(wrap_pyfunction!(py_cloud_label, m)?)?;
        m.add_function(wrap_pyfunction!(global_range, m)?)?;
        Ok(())
    }
}
