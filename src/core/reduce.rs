//! Region reductions over an area of interest and per-pixel collection composites

use crate::core::geometry::contains_point;
use crate::types::{AreaOfInterest, BandData, LstError, LstResult, Raster, Sample};
use ndarray::Array2;

/// Reduction applied to the AOI samples of a band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReducerKind {
    Mean,
    Min,
    Max,
    Count,
}

/// Pixel positions of a raster grid that fall inside an AOI at a given
/// sampling resolution. A pixel is inside when its centre is inside.
#[derive(Debug, Clone)]
pub struct AoiMask {
    pixels: Vec<(usize, usize)>,
    stride: usize,
}

impl AoiMask {
    /// Rasterise `aoi` onto the grid of `raster`. `resolution` is in CRS units;
    /// when coarser than the native pixel size the grid is decimated
    /// (nearest neighbour, every `stride`-th row and column).
    pub fn new(aoi: &AreaOfInterest, raster: &Raster, resolution: f64) -> LstResult<Self> {
        if !(resolution > 0.0) {
            return Err(LstError::Processing(format!(
                "Sampling resolution must be positive, got {}",
                resolution
            )));
        }

        let native = raster.geo_transform.resolution();
        let stride = if native > 0.0 {
            ((resolution / native).round() as usize).max(1)
        } else {
            1
        };

        let (rows, cols) = raster.dim();
        let bounds = aoi.bounds();
        let gt = &raster.geo_transform;
        let mut pixels = Vec::new();

        for row in (0..rows).step_by(stride) {
            for col in (0..cols).step_by(stride) {
                let (x, y) = gt.pixel_center(row, col);
                if x < bounds.min_x || x > bounds.max_x || y < bounds.min_y || y > bounds.max_y {
                    continue;
                }
                if contains_point(aoi.polygon(), x, y) {
                    pixels.push((row, col));
                }
            }
        }

        log::debug!(
            "AOI mask: {} of {}x{} pixels selected (stride {})",
            pixels.len(),
            rows,
            cols,
            stride
        );

        Ok(Self { pixels, stride })
    }

    pub fn pixels(&self) -> &[(usize, usize)] {
        &self.pixels
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Reduce the AOI samples of `data`. NaN samples are masked out.
    /// Returns `None` when no valid sample is left.
    pub fn reduce(&self, data: &BandData, kind: ReducerKind) -> Option<f64> {
        let values = self
            .pixels
            .iter()
            .filter_map(|&(r, c)| data.get((r, c)).copied())
            .filter(|v| !v.is_nan());

        match kind {
            ReducerKind::Mean => {
                let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                if n == 0 {
                    None
                } else {
                    Some(sum / n as f64)
                }
            }
            ReducerKind::Min => values.fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.min(v)))
            }),
            ReducerKind::Max => values.fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            }),
            ReducerKind::Count => Some(values.count() as f64),
        }
    }
}

/// Reduce a band over the AOI at `resolution`
pub fn reduce_region(
    raster: &Raster,
    aoi: &AreaOfInterest,
    resolution: f64,
    kind: ReducerKind,
) -> LstResult<Option<f64>> {
    let mask = AoiMask::new(aoi, raster, resolution)?;
    Ok(mask.reduce(&raster.data, kind))
}

/// Mask every pixel whose centre lies outside the AOI and crop the grid to the
/// AOI bounding box
pub fn clip_to_aoi(raster: &Raster, aoi: &AreaOfInterest) -> LstResult<Raster> {
    let mask = AoiMask::new(aoi, raster, raster.geo_transform.resolution().max(f64::MIN_POSITIVE))?;
    if mask.is_empty() {
        return Err(LstError::ReductionUnavailable(
            "AOI does not overlap the raster grid".to_string(),
        ));
    }

    let (r0, r1, c0, c1) = mask.pixels().iter().fold(
        (usize::MAX, 0usize, usize::MAX, 0usize),
        |(r0, r1, c0, c1), &(r, c)| (r0.min(r), r1.max(r), c0.min(c), c1.max(c)),
    );

    let mut clipped = Array2::from_elem((r1 - r0 + 1, c1 - c0 + 1), Sample::NAN);
    for &(r, c) in mask.pixels() {
        clipped[[r - r0, c - c0]] = raster.data[[r, c]];
    }

    Ok(Raster::new(clipped, raster.geo_transform.offset(r0, c0)))
}

/// Per-pixel statistic across co-registered rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    Median,
    Min,
    Max,
}

/// Per-pixel composite across a stack of co-registered rasters. NaN samples are
/// skipped; a pixel with no valid sample stays NaN.
pub fn composite(rasters: &[&Raster], kind: CompositeKind) -> LstResult<Raster> {
    let first = rasters.first().ok_or_else(|| {
        LstError::EmptyResult("Cannot composite an empty collection".to_string())
    })?;
    let dim = first.dim();

    if let Some(bad) = rasters.iter().find(|r| r.dim() != dim) {
        return Err(LstError::Processing(format!(
            "Composite inputs must share one grid: {:?} vs {:?}",
            dim,
            bad.dim()
        )));
    }

    if let Some(bad) = rasters.iter().find(|r| r.geo_transform != first.geo_transform) {
        return Err(LstError::Processing(format!(
            "Composite inputs must share one geotransform: {:?} vs {:?}",
            first.geo_transform.to_gdal(),
            bad.geo_transform.to_gdal()
        )));
    }

    let mut out = Array2::from_elem(dim, Sample::NAN);
    let mut stack: Vec<Sample> = Vec::with_capacity(rasters.len());

    for ((r, c), value) in out.indexed_iter_mut() {
        stack.clear();
        stack.extend(
            rasters
                .iter()
                .map(|raster| raster.data[[r, c]])
                .filter(|v| !v.is_nan()),
        );
        if stack.is_empty() {
            continue;
        }
        *value = match kind {
            CompositeKind::Min => stack.iter().copied().fold(f64::INFINITY, f64::min),
            CompositeKind::Max => stack.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            CompositeKind::Median => median(&mut stack),
        };
    }

    Ok(Raster::new(out, first.geo_transform))
}

fn median(values: &mut [Sample]) -> Sample {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;
    use approx::assert_relative_eq;

    fn grid(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster {
        let data = Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c));
        Raster::new(data, GeoTransform::north_up(0.0, rows as f64 * 30.0, 30.0))
    }

    fn full_aoi(rows: usize, cols: usize) -> AreaOfInterest {
        AreaOfInterest::from_ring(&[
            [0.0, 0.0],
            [cols as f64 * 30.0, 0.0],
            [cols as f64 * 30.0, rows as f64 * 30.0],
            [0.0, rows as f64 * 30.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_reducers() {
        let raster = grid(4, 4, |r, c| (r * 4 + c) as f64);
        let aoi = full_aoi(4, 4);

        let mean = reduce_region(&raster, &aoi, 30.0, ReducerKind::Mean).unwrap().unwrap();
        assert_relative_eq!(mean, 7.5);
        assert_eq!(reduce_region(&raster, &aoi, 30.0, ReducerKind::Min).unwrap(), Some(0.0));
        assert_eq!(reduce_region(&raster, &aoi, 30.0, ReducerKind::Max).unwrap(), Some(15.0));
        assert_eq!(reduce_region(&raster, &aoi, 30.0, ReducerKind::Count).unwrap(), Some(16.0));
    }

    #[test]
    fn test_partial_aoi_and_nan_masking() {
        let mut raster = grid(4, 4, |_, c| c as f64);
        raster.data[[0, 0]] = f64::NAN;
        // left half: columns 0 and 1
        let aoi = AreaOfInterest::from_ring(&[[0.0, 0.0], [60.0, 0.0], [60.0, 120.0], [0.0, 120.0]])
            .unwrap();

        let count = reduce_region(&raster, &aoi, 30.0, ReducerKind::Count).unwrap();
        assert_eq!(count, Some(7.0));
        let max = reduce_region(&raster, &aoi, 30.0, ReducerKind::Max).unwrap();
        assert_eq!(max, Some(1.0));
    }

    #[test]
    fn test_no_valid_pixels_yields_none() {
        let raster = grid(2, 2, |_, _| f64::NAN);
        let aoi = full_aoi(2, 2);
        assert_eq!(reduce_region(&raster, &aoi, 30.0, ReducerKind::Mean).unwrap(), None);

        let outside = AreaOfInterest::from_ring(&[
            [1000.0, 1000.0],
            [1100.0, 1000.0],
            [1100.0, 1100.0],
            [1000.0, 1100.0],
        ])
        .unwrap();
        let raster = grid(2, 2, |_, _| 1.0);
        assert_eq!(reduce_region(&raster, &outside, 30.0, ReducerKind::Min).unwrap(), None);
    }

    #[test]
    fn test_coarse_resolution_decimates() {
        let raster = grid(4, 4, |_, _| 1.0);
        let mask = AoiMask::new(&full_aoi(4, 4), &raster, 60.0).unwrap();
        assert_eq!(mask.stride(), 2);
        assert_eq!(mask.pixels().len(), 4);
    }

    #[test]
    fn test_clip_crops_to_aoi() {
        let raster = grid(4, 4, |r, c| (r * 4 + c) as f64);
        // rows 2..3 (bottom half), cols 2..3 (right half)
        let aoi = AreaOfInterest::from_ring(&[[60.0, 0.0], [120.0, 0.0], [120.0, 60.0], [60.0, 60.0]])
            .unwrap();
        let clipped = clip_to_aoi(&raster, &aoi).unwrap();
        assert_eq!(clipped.dim(), (2, 2));
        assert_eq!(clipped.data[[0, 0]], 10.0);
        assert_relative_eq!(clipped.geo_transform.top_left_x, 60.0);
        assert_relative_eq!(clipped.geo_transform.top_left_y, 60.0);
    }

    #[test]
    fn test_median_composite() {
        let a = grid(1, 2, |_, _| 1.0);
        let b = grid(1, 2, |_, c| if c == 0 { 5.0 } else { f64::NAN });
        let c = grid(1, 2, |_, _| 3.0);
        let out = composite(&[&a, &b, &c], CompositeKind::Median).unwrap();
        assert_eq!(out.data[[0, 0]], 3.0);
        assert_eq!(out.data[[0, 1]], 2.0);

        let max = composite(&[&a, &b, &c], CompositeKind::Max).unwrap();
        assert_eq!(max.data[[0, 0]], 5.0);
    }

    #[test]
    fn test_composite_rejects_mismatched_grids() {
        let a = grid(2, 2, |_, _| 1.0);
        let b = grid(3, 2, |_, _| 1.0);
        assert!(composite(&[&a, &b], CompositeKind::Min).is_err());
        assert!(composite(&[], CompositeKind::Min).is_err());
    }

    #[test]
    fn test_composite_rejects_shifted_origin() {
        let a = grid(2, 2, |_, _| 1.0);
        let mut b = grid(2, 2, |_, _| 3.0);
        b.geo_transform.top_left_x += 30.0;
        let err = composite(&[&a, &b], CompositeKind::Median).unwrap_err();
        assert!(matches!(err, LstError::Processing(_)));
    }
}
