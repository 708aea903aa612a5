use crate::core::reduce::clip_to_aoi;
use crate::types::{AreaOfInterest, ExportDescriptor, GeoTransform, LstError, LstResult, Raster, Sample};
use crate::core::export::ExportArtifact;
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

/// Canopy height workflow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanopyParams {
    /// Heights below this (metres) are masked
    pub min_height: f64,
    pub description: String,
    pub folder: String,
    pub scale: f64,
    pub crs: String,
    pub max_pixels: f64,
}

impl Default for CanopyParams {
    fn default() -> Self {
        Self {
            min_height: 1.0,
            description: "CanopyHeight_Export".to_string(),
            folder: "EarthEngineExports".to_string(),
            scale: 1.0,
            crs: "EPSG:4326".to_string(),
            max_pixels: 1e13,
        }
    }
}

/// Mosaics canopy height tiles, masks low vegetation and prepares the export
pub struct CanopyHeightProcessor {
    params: CanopyParams,
}

impl CanopyHeightProcessor {
    pub fn new() -> Self {
        Self {
            params: CanopyParams::default(),
        }
    }

    pub fn with_params(params: CanopyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CanopyParams {
        &self.params
    }

    /// Paste tiles onto their union grid; later tiles are drawn on top, NaN
    /// never overwrites. Tiles must be north-up and share one pixel size.
    pub fn mosaic(&self, tiles: &[Raster]) -> LstResult<Raster> {
        let first = tiles.first().ok_or_else(|| {
            LstError::EmptyResult("No canopy height tiles to mosaic".to_string())
        })?;
        let px = first.geo_transform.pixel_width;
        let py = first.geo_transform.pixel_height;

        for tile in tiles {
            let gt = &tile.geo_transform;
            if gt.rotation_x != 0.0 || gt.rotation_y != 0.0 {
                return Err(LstError::InvalidFormat("Rotated tiles cannot be mosaicked".to_string()));
            }
            if (gt.pixel_width - px).abs() > 1e-9 * px.abs() || (gt.pixel_height - py).abs() > 1e-9 * py.abs() {
                return Err(LstError::InvalidFormat(format!(
                    "Tile pixel size {}x{} differs from {}x{}",
                    gt.pixel_width, gt.pixel_height, px, py
                )));
            }
        }

        let (min_x, max_y, max_x, min_y) = tiles.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY, f64::INFINITY),
            |(x0, y0, x1, y1), t| {
                let (rows, cols) = t.dim();
                let gt = &t.geo_transform;
                (
                    x0.min(gt.top_left_x),
                    y0.max(gt.top_left_y),
                    x1.max(gt.top_left_x + cols as f64 * px),
                    y1.min(gt.top_left_y + rows as f64 * py),
                )
            },
        );

        let cols = ((max_x - min_x) / px).round() as usize;
        let rows = ((min_y - max_y) / py).round() as usize;
        let mut out = Array2::from_elem((rows, cols), Sample::NAN);

        for tile in tiles {
            let gt = &tile.geo_transform;
            let col0 = ((gt.top_left_x - min_x) / px).round() as usize;
            let row0 = ((gt.top_left_y - max_y) / py).round() as usize;
            let (tr, tc) = tile.dim();
            let mut window = out.slice_mut(s![row0..row0 + tr, col0..col0 + tc]);
            ndarray::Zip::from(&mut window).and(&tile.data).for_each(|dst, &src| {
                if !src.is_nan() {
                    *dst = src;
                }
            });
        }

        log::info!("Mosaicked {} canopy tiles into {}x{} grid", tiles.len(), rows, cols);

        Ok(Raster::new(
            out,
            GeoTransform {
                top_left_x: min_x,
                top_left_y: max_y,
                ..first.geo_transform
            },
        ))
    }

    /// Mask heights below the configured minimum
    pub fn mask_low(&self, raster: &Raster) -> Raster {
        let min = self.params.min_height;
        raster.map(|h| if h >= min { h } else { Sample::NAN })
    }

    /// Mosaic, mask and clip; returns the single export artifact
    pub fn process(&self, tiles: &[Raster], aoi: &AreaOfInterest) -> LstResult<ExportArtifact> {
        let mosaic = self.mosaic(tiles)?;
        let masked = self.mask_low(&mosaic);
        let raster = clip_to_aoi(&masked, aoi)?;

        let descriptor = ExportDescriptor {
            name: format!("Canopy Height >= {} [meters]", self.params.min_height),
            scene_id: "canopy_height_mosaic".to_string(),
            description: self.params.description.clone(),
            file_name_prefix: self.params.description.clone(),
            output_band: "canopy_height".to_string(),
            folder: self.params.folder.clone(),
            region: aoi.bounds(),
            scale: self.params.scale,
            crs: self.params.crs.clone(),
            max_pixels: self.params.max_pixels,
            file_format: "GeoTIFF".to_string(),
        };

        Ok(ExportArtifact { descriptor, raster })
    }
}

impl Default for CanopyHeightProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x0: f64, y0: f64, values: &[f64]) -> Raster {
        let data = Array2::from_shape_vec((2, 2), values.to_vec()).unwrap();
        Raster::new(data, GeoTransform::north_up(x0, y0, 1.0))
    }

    #[test]
    fn test_mosaic_later_tiles_on_top() {
        let processor = CanopyHeightProcessor::new();
        let a = tile(0.0, 2.0, &[1.0, 2.0, 3.0, 4.0]);
        let b = tile(1.0, 2.0, &[9.0, f64::NAN, 9.0, 9.0]);
        let mosaic = processor.mosaic(&[a, b]).unwrap();

        assert_eq!(mosaic.dim(), (2, 3));
        assert_eq!(mosaic.data[[0, 0]], 1.0);
        assert_eq!(mosaic.data[[0, 1]], 9.0);
        assert_eq!(mosaic.data[[1, 1]], 9.0);
        assert!(mosaic.data[[0, 2]].is_nan());
    }

    #[test]
    fn test_mask_below_one_metre() {
        let processor = CanopyHeightProcessor::new();
        let masked = processor.mask_low(&tile(0.0, 2.0, &[0.5, 1.0, 12.0, 0.0]));
        assert!(masked.data[[0, 0]].is_nan());
        assert_eq!(masked.data[[0, 1]], 1.0);
        assert_eq!(masked.data[[1, 0]], 12.0);
        assert!(masked.data[[1, 1]].is_nan());
    }

    #[test]
    fn test_process_builds_single_export() {
        let processor = CanopyHeightProcessor::new();
        let aoi = AreaOfInterest::from_ring(&[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]).unwrap();
        let artifact = processor
            .process(&[tile(0.0, 2.0, &[5.0, 0.2, 7.0, 3.0])], &aoi)
            .unwrap();
        assert_eq!(artifact.descriptor.description, "CanopyHeight_Export");
        assert_eq!(artifact.descriptor.scale, 1.0);
        assert_eq!(artifact.raster.valid_count(), 3);
    }

    #[test]
    fn test_mismatched_pixel_size() {
        let processor = CanopyHeightProcessor::new();
        let a = tile(0.0, 2.0, &[1.0; 4]);
        let mut b = tile(2.0, 2.0, &[1.0; 4]);
        b.geo_transform.pixel_width = 2.0;
        assert!(processor.mosaic(&[a, b]).is_err());
        assert!(processor.mosaic(&[]).is_err());
    }
}
