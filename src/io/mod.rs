//! I/O modules: raster stores, Landsat metadata and export submission

pub mod store;
pub mod mtl;
pub mod submit;
#[cfg(feature = "gdal")]
pub mod geotiff;
#[cfg(feature = "gdal")]
pub mod landsat_dir;

pub use store::{RasterStore, MemoryStore};
pub use mtl::{MtlParser, FootprintCoords};
pub use submit::{JobSubmitter, ManifestSubmitter, HttpJobSubmitter};
#[cfg(feature = "gdal")]
pub use submit::GeoTiffExporter;
#[cfg(feature = "gdal")]
pub use landsat_dir::LandsatDirectoryStore;
