//! Landsat Collection 2 Level-2 products unpacked on local disk, one product
//! per directory: `<ID>_MTL.xml` next to `<ID>_<BAND>.TIF`.

use crate::core::catalog::CatalogQuery;
use crate::io::geotiff;
use crate::io::mtl::{FootprintCoords, MtlParser};
use crate::io::store::RasterStore;
use crate::types::{AreaOfInterest, LstError, LstResult, Raster, SceneMetadata};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

struct ProductEntry {
    metadata: SceneMetadata,
    dir: PathBuf,
    epsg: Option<u32>,
}

pub struct LandsatDirectoryStore {
    products: Vec<ProductEntry>,
    epsg: Option<u32>,
}

impl LandsatDirectoryStore {
    /// Scan `root` and its immediate subdirectories for MTL files. Products in
    /// a projection other than the most common one are skipped.
    pub fn open<P: AsRef<Path>>(root: P) -> LstResult<Self> {
        let root = root.as_ref();
        log::info!("Scanning Landsat products under {}", root.display());

        let mut dirs = vec![root.to_path_buf()];
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }

        let mut products = Vec::new();
        for dir in dirs {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                let is_mtl = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.ends_with("_MTL.xml"));
                if !is_mtl {
                    continue;
                }
                match MtlParser::parse_file(&path).and_then(|mtl| {
                    Ok((mtl.to_metadata(FootprintCoords::Projected)?, mtl.epsg()))
                }) {
                    Ok((metadata, epsg)) => products.push(ProductEntry {
                        metadata,
                        dir: dir.clone(),
                        epsg,
                    }),
                    Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
                }
            }
        }

        let mut zone_counts: HashMap<Option<u32>, usize> = HashMap::new();
        for p in &products {
            *zone_counts.entry(p.epsg).or_default() += 1;
        }
        let epsg = zone_counts
            .into_iter()
            .max_by_key(|(code, n)| (*n, std::cmp::Reverse(*code)))
            .and_then(|(code, _)| code);

        let before = products.len();
        products.retain(|p| p.epsg == epsg);
        if products.len() < before {
            log::warn!(
                "Skipped {} products not in EPSG:{:?}",
                before - products.len(),
                epsg
            );
        }

        log::info!("Found {} Landsat products (EPSG:{:?})", products.len(), epsg);
        Ok(Self { products, epsg })
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Reproject a lon/lat ring into the products' map projection
    pub fn project_aoi(&self, lon_lat_ring: &[[f64; 2]]) -> LstResult<AreaOfInterest> {
        let epsg = self.epsg.ok_or_else(|| {
            LstError::Metadata("Products carry no map projection to project the AOI into".to_string())
        })?;

        let source = SpatialRef::from_epsg(4326)?;
        source.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
        let target = SpatialRef::from_epsg(epsg)?;
        target.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
        let transform = CoordTransform::new(&source, &target)?;

        let mut xs: Vec<f64> = lon_lat_ring.iter().map(|p| p[0]).collect();
        let mut ys: Vec<f64> = lon_lat_ring.iter().map(|p| p[1]).collect();
        let mut zs = vec![0.0; xs.len()];
        transform.transform_coords(&mut xs, &mut ys, &mut zs)?;

        let ring: Vec<[f64; 2]> = xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect();
        AreaOfInterest::from_ring(&ring)
    }

    /// Projection WKT of the first product's thermal band, for exports
    pub fn projection_wkt(&self, band: &str) -> LstResult<Option<String>> {
        match self.products.first() {
            Some(p) => Ok(Some(geotiff::read_projection(self.band_path(p, band))?)),
            None => Ok(None),
        }
    }

    fn band_path(&self, product: &ProductEntry, band: &str) -> PathBuf {
        product.dir.join(format!("{}_{}.TIF", product.metadata.id, band))
    }
}

impl RasterStore for LandsatDirectoryStore {
    fn list_scenes(&self, query: &CatalogQuery) -> LstResult<Vec<SceneMetadata>> {
        Ok(self
            .products
            .iter()
            .filter(|p| query.years.contains(p.metadata.year()))
            .map(|p| p.metadata.clone())
            .collect())
    }

    fn get_band(&self, scene: &SceneMetadata, band: &str) -> LstResult<Raster> {
        let product = self
            .products
            .iter()
            .find(|p| p.metadata.id == scene.id)
            .ok_or_else(|| LstError::Metadata(format!("Unknown scene {}", scene.id)))?;
        let path = self.band_path(product, band);
        if !path.exists() {
            return Err(LstError::Metadata(format!("Missing band file {}", path.display())));
        }
        geotiff::read_band(path)
    }
}
