//! Interval classification of temperature rasters for discrete legends

use crate::types::{LstError, LstResult, Raster};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Class bounds `[b0, b1, ..., bn]` define `n` classes. The first class takes
/// everything below `b1`, the last everything at or above `b(n-1)`, the ones in
/// between `[b(i), b(i+1))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureClasses {
    bounds: Vec<f64>,
}

impl Default for TemperatureClasses {
    fn default() -> Self {
        Self {
            bounds: vec![0.0, 27.0, 30.0, 33.0, 36.0, 50.0],
        }
    }
}

impl TemperatureClasses {
    pub fn new(bounds: Vec<f64>) -> LstResult<Self> {
        if bounds.len() < 3 {
            return Err(LstError::Config(format!(
                "Need at least 3 class bounds, got {}",
                bounds.len()
            )));
        }
        if bounds.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(LstError::Config(
                "Class bounds must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { bounds })
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn class_count(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Class index of a value, `None` for NaN
    pub fn classify_value(&self, value: f64) -> Option<u8> {
        if value.is_nan() {
            return None;
        }
        let n = self.class_count();
        let idx = (1..n)
            .find(|&i| value < self.bounds[i])
            .map(|i| i - 1)
            .unwrap_or(n - 1);
        Some(idx as u8)
    }

    pub fn classify(&self, raster: &Raster) -> Array2<Option<u8>> {
        raster.data.mapv(|v| self.classify_value(v))
    }

    /// Legend labels: "<27", "27-30", ..., ">36"
    pub fn labels(&self) -> Vec<String> {
        let b = &self.bounds;
        let n = self.class_count();
        let mut labels = Vec::with_capacity(n);
        labels.push(format!("<{}", b[1]));
        for i in 1..n - 1 {
            labels.push(format!("{}-{}", b[i], b[i + 1]));
        }
        labels.push(format!(">{}", b[n - 1]));
        labels
    }

    /// Pixel count per class
    pub fn histogram(&self, raster: &Raster) -> Vec<usize> {
        let mut counts = vec![0; self.class_count()];
        for class in raster.data.iter().filter_map(|&v| self.classify_value(v)) {
            counts[class as usize] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;

    #[test]
    fn test_default_labels() {
        let classes = TemperatureClasses::default();
        assert_eq!(classes.labels(), vec!["<27", "27-30", "30-33", "33-36", ">36"]);
    }

    #[test]
    fn test_classify_values() {
        let classes = TemperatureClasses::default();
        assert_eq!(classes.classify_value(-3.0), Some(0));
        assert_eq!(classes.classify_value(26.9), Some(0));
        assert_eq!(classes.classify_value(27.0), Some(1));
        assert_eq!(classes.classify_value(35.0), Some(3));
        assert_eq!(classes.classify_value(36.0), Some(4));
        assert_eq!(classes.classify_value(70.0), Some(4));
        assert_eq!(classes.classify_value(f64::NAN), None);
    }

    #[test]
    fn test_histogram() {
        let classes = TemperatureClasses::default();
        let data = Array2::from_shape_vec((1, 4), vec![20.0, 28.0, f64::NAN, 40.0]).unwrap();
        let raster = Raster::new(data, GeoTransform::north_up(0.0, 0.0, 30.0));
        assert_eq!(classes.histogram(&raster), vec![1, 1, 0, 0, 1]);
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(TemperatureClasses::new(vec![0.0, 10.0]).is_err());
        assert!(TemperatureClasses::new(vec![0.0, 10.0, 10.0]).is_err());
    }
}
