use crate::types::{LstError, LstResult, SceneMetadata};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use geo::{LineString, Polygon};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::Path;

/// Landsat Collection 2 `*_MTL.xml` document (fields this crate uses)
#[derive(Debug, Deserialize)]
pub struct MtlRoot {
    #[serde(rename = "PRODUCT_CONTENTS")]
    pub product_contents: ProductContents,
    #[serde(rename = "IMAGE_ATTRIBUTES")]
    pub image_attributes: ImageAttributes,
    #[serde(rename = "PROJECTION_ATTRIBUTES")]
    pub projection_attributes: ProjectionAttributes,
}

#[derive(Debug, Deserialize)]
pub struct ProductContents {
    #[serde(rename = "LANDSAT_PRODUCT_ID")]
    pub landsat_product_id: String,
    #[serde(rename = "PROCESSING_LEVEL")]
    pub processing_level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageAttributes {
    #[serde(rename = "SPACECRAFT_ID")]
    pub spacecraft_id: String,
    #[serde(rename = "WRS_PATH")]
    pub wrs_path: Option<u32>,
    #[serde(rename = "WRS_ROW")]
    pub wrs_row: Option<u32>,
    #[serde(rename = "CLOUD_COVER")]
    pub cloud_cover: Option<f64>,
    #[serde(rename = "DATE_ACQUIRED")]
    pub date_acquired: String,
    #[serde(rename = "SCENE_CENTER_TIME")]
    pub scene_center_time: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectionAttributes {
    #[serde(rename = "MAP_PROJECTION")]
    pub map_projection: String,
    #[serde(rename = "UTM_ZONE")]
    pub utm_zone: Option<u32>,
    #[serde(rename = "CORNER_UL_LAT_PRODUCT")]
    pub ul_lat: f64,
    #[serde(rename = "CORNER_UL_LON_PRODUCT")]
    pub ul_lon: f64,
    #[serde(rename = "CORNER_UR_LAT_PRODUCT")]
    pub ur_lat: f64,
    #[serde(rename = "CORNER_UR_LON_PRODUCT")]
    pub ur_lon: f64,
    #[serde(rename = "CORNER_LL_LAT_PRODUCT")]
    pub ll_lat: f64,
    #[serde(rename = "CORNER_LL_LON_PRODUCT")]
    pub ll_lon: f64,
    #[serde(rename = "CORNER_LR_LAT_PRODUCT")]
    pub lr_lat: f64,
    #[serde(rename = "CORNER_LR_LON_PRODUCT")]
    pub lr_lon: f64,
    #[serde(rename = "CORNER_UL_PROJECTION_X_PRODUCT")]
    pub ul_x: Option<f64>,
    #[serde(rename = "CORNER_UL_PROJECTION_Y_PRODUCT")]
    pub ul_y: Option<f64>,
    #[serde(rename = "CORNER_UR_PROJECTION_X_PRODUCT")]
    pub ur_x: Option<f64>,
    #[serde(rename = "CORNER_UR_PROJECTION_Y_PRODUCT")]
    pub ur_y: Option<f64>,
    #[serde(rename = "CORNER_LL_PROJECTION_X_PRODUCT")]
    pub ll_x: Option<f64>,
    #[serde(rename = "CORNER_LL_PROJECTION_Y_PRODUCT")]
    pub ll_y: Option<f64>,
    #[serde(rename = "CORNER_LR_PROJECTION_X_PRODUCT")]
    pub lr_x: Option<f64>,
    #[serde(rename = "CORNER_LR_PROJECTION_Y_PRODUCT")]
    pub lr_y: Option<f64>,
}

/// Coordinate space of the footprint polygon handed to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootprintCoords {
    /// lon/lat degrees
    Geographic,
    /// Product map projection (UTM metres)
    Projected,
}

impl MtlRoot {
    pub fn product_id(&self) -> &str {
        &self.product_contents.landsat_product_id
    }

    /// EPSG code of the product projection (northern UTM zones as used by Landsat)
    pub fn epsg(&self) -> Option<u32> {
        match self.projection_attributes.map_projection.as_str() {
            "UTM" => self.projection_attributes.utm_zone.map(|z| 32600 + z),
            _ => None,
        }
    }

    /// Acquisition time from DATE_ACQUIRED + SCENE_CENTER_TIME
    pub fn acquired(&self) -> LstResult<DateTime<Utc>> {
        let attrs = &self.image_attributes;
        let date = NaiveDate::parse_from_str(attrs.date_acquired.trim(), "%Y-%m-%d")
            .map_err(|e| LstError::Metadata(format!("Invalid DATE_ACQUIRED '{}': {}", attrs.date_acquired, e)))?;

        let raw_time = attrs.scene_center_time.trim().trim_matches('"').trim_end_matches('Z');
        let time = NaiveTime::parse_from_str(raw_time, "%H:%M:%S%.f")
            .map_err(|e| LstError::Metadata(format!("Invalid SCENE_CENTER_TIME '{}': {}", attrs.scene_center_time, e)))?;

        Ok(Utc.from_utc_datetime(&date.and_time(time)))
    }

    pub fn footprint(&self, coords: FootprintCoords) -> LstResult<Polygon<f64>> {
        let p = &self.projection_attributes;
        let ring = match coords {
            FootprintCoords::Geographic => vec![
                (p.ul_lon, p.ul_lat),
                (p.ur_lon, p.ur_lat),
                (p.lr_lon, p.lr_lat),
                (p.ll_lon, p.ll_lat),
            ],
            FootprintCoords::Projected => {
                let corners = [
                    p.ul_x.zip(p.ul_y),
                    p.ur_x.zip(p.ur_y),
                    p.lr_x.zip(p.lr_y),
                    p.ll_x.zip(p.ll_y),
                ];
                corners
                    .into_iter()
                    .collect::<Option<Vec<(f64, f64)>>>()
                    .ok_or_else(|| {
                        LstError::Metadata(format!(
                            "{} has no projected corner coordinates",
                            self.product_id()
                        ))
                    })?
            }
        };
        Ok(Polygon::new(LineString::from(ring), vec![]))
    }

    pub fn to_metadata(&self, coords: FootprintCoords) -> LstResult<SceneMetadata> {
        Ok(SceneMetadata {
            id: self.product_id().to_string(),
            acquired: self.acquired()?,
            footprint: self.footprint(coords)?,
            scene_cloud_cover: self.image_attributes.cloud_cover.filter(|c| *c >= 0.0),
            spacecraft: self.image_attributes.spacecraft_id.clone(),
        })
    }
}

/// Parser for Landsat MTL XML files
pub struct MtlParser;

impl MtlParser {
    pub fn parse(xml_content: &str) -> LstResult<MtlRoot> {
        from_str::<MtlRoot>(xml_content)
            .map_err(|e| LstError::XmlParsing(format!("Failed to parse MTL XML: {}", e)))
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> LstResult<MtlRoot> {
        log::debug!("Reading MTL file: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    pub(crate) const SAMPLE_MTL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<LANDSAT_METADATA_FILE>
  <PRODUCT_CONTENTS>
    <ORIGIN>Image courtesy of the U.S. Geological Survey</ORIGIN>
    <LANDSAT_PRODUCT_ID>LC08_L2SP_203024_20230812_20230819_02_T1</LANDSAT_PRODUCT_ID>
    <PROCESSING_LEVEL>L2SP</PROCESSING_LEVEL>
    <FILE_NAME_BAND_ST_B10>LC08_L2SP_203024_20230812_20230819_02_T1_ST_B10.TIF</FILE_NAME_BAND_ST_B10>
  </PRODUCT_CONTENTS>
  <IMAGE_ATTRIBUTES>
    <SPACECRAFT_ID>LANDSAT_8</SPACECRAFT_ID>
    <WRS_PATH>203</WRS_PATH>
    <WRS_ROW>024</WRS_ROW>
    <CLOUD_COVER>7.31</CLOUD_COVER>
    <DATE_ACQUIRED>2023-08-12</DATE_ACQUIRED>
    <SCENE_CENTER_TIME>10:58:13.4271230Z</SCENE_CENTER_TIME>
  </IMAGE_ATTRIBUTES>
  <PROJECTION_ATTRIBUTES>
    <MAP_PROJECTION>UTM</MAP_PROJECTION>
    <DATUM>WGS84</DATUM>
    <UTM_ZONE>30</UTM_ZONE>
    <CORNER_UL_LAT_PRODUCT>52.84035</CORNER_UL_LAT_PRODUCT>
    <CORNER_UL_LON_PRODUCT>-2.92468</CORNER_UL_LON_PRODUCT>
    <CORNER_UR_LAT_PRODUCT>52.87045</CORNER_UR_LAT_PRODUCT>
    <CORNER_UR_LON_PRODUCT>0.62031</CORNER_UR_LON_PRODUCT>
    <CORNER_LL_LAT_PRODUCT>50.69232</CORNER_LL_LAT_PRODUCT>
    <CORNER_LL_LON_PRODUCT>-2.83209</CORNER_LL_LON_PRODUCT>
    <CORNER_LR_LAT_PRODUCT>50.72006</CORNER_LR_LAT_PRODUCT>
    <CORNER_LR_LON_PRODUCT>0.56380</CORNER_LR_LON_PRODUCT>
    <CORNER_UL_PROJECTION_X_PRODUCT>505200.000</CORNER_UL_PROJECTION_X_PRODUCT>
    <CORNER_UL_PROJECTION_Y_PRODUCT>5854200.000</CORNER_UL_PROJECTION_Y_PRODUCT>
    <CORNER_UR_PROJECTION_X_PRODUCT>744300.000</CORNER_UR_PROJECTION_X_PRODUCT>
    <CORNER_UR_PROJECTION_Y_PRODUCT>5854200.000</CORNER_UR_PROJECTION_Y_PRODUCT>
    <CORNER_LL_PROJECTION_X_PRODUCT>505200.000</CORNER_LL_PROJECTION_X_PRODUCT>
    <CORNER_LL_PROJECTION_Y_PRODUCT>5615400.000</CORNER_LL_PROJECTION_Y_PRODUCT>
    <CORNER_LR_PROJECTION_X_PRODUCT>744300.000</CORNER_LR_PROJECTION_X_PRODUCT>
    <CORNER_LR_PROJECTION_Y_PRODUCT>5615400.000</CORNER_LR_PROJECTION_Y_PRODUCT>
  </PROJECTION_ATTRIBUTES>
</LANDSAT_METADATA_FILE>"#;

    #[test]
    fn test_mtl_parsing() {
        let mtl = MtlParser::parse(SAMPLE_MTL).unwrap();
        assert_eq!(mtl.product_id(), "LC08_L2SP_203024_20230812_20230819_02_T1");
        assert_eq!(mtl.image_attributes.wrs_row, Some(24));
        assert_eq!(mtl.epsg(), Some(32630));

        let acquired = mtl.acquired().unwrap();
        assert_eq!((acquired.year(), acquired.month(), acquired.day()), (2023, 8, 12));
        assert_eq!((acquired.hour(), acquired.minute(), acquired.second()), (10, 58, 13));
    }

    #[test]
    fn test_mtl_metadata() {
        let mtl = MtlParser::parse(SAMPLE_MTL).unwrap();
        let meta = mtl.to_metadata(FootprintCoords::Projected).unwrap();
        assert_eq!(meta.scene_cloud_cover, Some(7.31));
        assert_eq!(meta.spacecraft, "LANDSAT_8");
        assert_eq!(meta.footprint.exterior().0.len(), 5);
        assert_eq!(meta.footprint.exterior().0[0].x, 505200.0);

        let geographic = mtl.footprint(FootprintCoords::Geographic).unwrap();
        assert_eq!(geographic.exterior().0[0].y, 52.84035);
    }

    #[test]
    fn test_malformed_mtl() {
        assert!(matches!(
            MtlParser::parse("<LANDSAT_METADATA_FILE></LANDSAT_METADATA_FILE>"),
            Err(LstError::XmlParsing(_))
        ));
    }
}
