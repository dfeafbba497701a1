//! The per-(lake, reference year) feature record.

use serde::{Deserialize, Serialize};

use super::lake::LakeType;
use crate::error::{GlofError, Result};

/// Columns that identify a record and never enter a model
pub const IDENTITY_COLUMNS: [&str; 4] = ["lake_id", "Latitude", "Longitude", "Year_final"];

/// Numeric feature columns in model order
pub const FEATURE_COLUMNS: [&str; 13] = [
    "Lake_area_ha",
    "Elevation_m",
    "slope_glac_to_lake",
    "glacier_touch_count",
    "nearest_glacier_dist_m",
    "glacier_elev_m",
    "5y_expansion_rate",
    "10y_expansion_rate",
    "Lake_type_ice_contact",
    "Lake_type_moraine_dammed",
    "Lake_type_other",
    "is_supraglacial",
    "glacier_contact",
];

/// Identity of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordKey {
    pub lake_id: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Year_final")]
    pub year: i32,
}

impl RecordKey {
    pub fn matches(&self, lake_id: &str, year: i32) -> bool {
        self.lake_id == lake_id && self.year == year
    }
}

/// One row of the feature table.
///
/// Optional fields are missing values; they are filled only by the imputer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LakeRecord {
    pub lake_id: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Year_final")]
    pub year: i32,
    #[serde(rename = "Lake_area_ha")]
    pub area_ha: f64,
    #[serde(rename = "Elevation_m")]
    pub elevation_m: Option<f64>,
    pub slope_glac_to_lake: Option<f64>,
    pub glacier_touch_count: u32,
    pub nearest_glacier_dist_m: Option<f64>,
    pub glacier_elev_m: Option<f64>,
    #[serde(rename = "5y_expansion_rate")]
    pub expansion_rate_5y: Option<f64>,
    #[serde(rename = "10y_expansion_rate")]
    pub expansion_rate_10y: Option<f64>,
    #[serde(rename = "Lake_type_simplified")]
    pub lake_type: LakeType,
    #[serde(rename = "Lake_type_ice_contact")]
    pub lake_type_ice_contact: u8,
    #[serde(rename = "Lake_type_moraine_dammed")]
    pub lake_type_moraine_dammed: u8,
    #[serde(rename = "Lake_type_other")]
    pub lake_type_other: u8,
    pub is_supraglacial: u8,
    pub glacier_contact: u8,
    #[serde(rename = "GLOF")]
    pub glof: Option<u8>,
    #[serde(default)]
    pub needs_review: bool,
}

impl LakeRecord {
    pub fn new(
        lake_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        year: i32,
        area_ha: f64,
        lake_type: LakeType,
    ) -> Self {
        let mut record = Self {
            lake_id: lake_id.into(),
            latitude,
            longitude,
            year,
            area_ha,
            elevation_m: None,
            slope_glac_to_lake: None,
            glacier_touch_count: 0,
            nearest_glacier_dist_m: None,
            glacier_elev_m: None,
            expansion_rate_5y: None,
            expansion_rate_10y: None,
            lake_type,
            lake_type_ice_contact: 0,
            lake_type_moraine_dammed: 0,
            lake_type_other: 0,
            is_supraglacial: 0,
            glacier_contact: 0,
            glof: None,
            needs_review: false,
        };
        record.set_lake_type(lake_type);
        record
    }

    /// Set the categorical type together with its indicator columns
    pub fn set_lake_type(&mut self, lake_type: LakeType) {
        let [ice_contact, moraine_dammed, other] = lake_type.one_hot();
        self.lake_type = lake_type;
        self.lake_type_ice_contact = ice_contact;
        self.lake_type_moraine_dammed = moraine_dammed;
        self.lake_type_other = other;
    }

    /// Set the touch count together with the contact flag
    pub fn set_glacier_touch_count(&mut self, count: u32) {
        self.glacier_touch_count = count;
        self.glacier_contact = u8::from(count > 0);
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            lake_id: self.lake_id.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            year: self.year,
        }
    }

    /// Label as a boolean, if assigned
    pub fn label(&self) -> Option<bool> {
        self.glof.map(|v| v == 1)
    }

    /// Value of a feature column; `None` when missing
    pub fn feature(&self, column: &str) -> Option<f64> {
        match column {
            "Lake_area_ha" => Some(self.area_ha),
            "Elevation_m" => self.elevation_m,
            "slope_glac_to_lake" => self.slope_glac_to_lake,
            "glacier_touch_count" => Some(self.glacier_touch_count as f64),
            "nearest_glacier_dist_m" => self.nearest_glacier_dist_m,
            "glacier_elev_m" => self.glacier_elev_m,
            "5y_expansion_rate" => self.expansion_rate_5y,
            "10y_expansion_rate" => self.expansion_rate_10y,
            "Lake_type_ice_contact" => Some(self.lake_type_ice_contact as f64),
            "Lake_type_moraine_dammed" => Some(self.lake_type_moraine_dammed as f64),
            "Lake_type_other" => Some(self.lake_type_other as f64),
            "is_supraglacial" => Some(self.is_supraglacial as f64),
            "glacier_contact" => Some(self.glacier_contact as f64),
            _ => None,
        }
    }

    /// Fill a missing feature. Present values are never overwritten.
    ///
    /// Returns whether the record changed.
    pub fn fill_missing(&mut self, column: &str, value: f64) -> Result<bool> {
        let slot = match column {
            "Elevation_m" => &mut self.elevation_m,
            "slope_glac_to_lake" => &mut self.slope_glac_to_lake,
            "nearest_glacier_dist_m" => &mut self.nearest_glacier_dist_m,
            "glacier_elev_m" => &mut self.glacier_elev_m,
            "5y_expansion_rate" => &mut self.expansion_rate_5y,
            "10y_expansion_rate" => &mut self.expansion_rate_10y,
            c if FEATURE_COLUMNS.contains(&c) => return Ok(false),
            other => {
                return Err(GlofError::InvalidRecord {
                    lake_id: self.lake_id.clone(),
                    year: self.year,
                    reason: format!("unknown feature column '{}'", other),
                })
            }
        };
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(value);
        Ok(true)
    }

    /// Check the structural invariants of a record
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| GlofError::InvalidRecord {
            lake_id: self.lake_id.clone(),
            year: self.year,
            reason,
        };

        if !self.area_ha.is_finite() || self.area_ha <= 0.0 {
            return Err(invalid(format!("Lake_area_ha must be positive, got {}", self.area_ha)));
        }
        if (self.glacier_contact == 1) != (self.glacier_touch_count > 0) || self.glacier_contact > 1
        {
            return Err(invalid(format!(
                "glacier_contact={} inconsistent with glacier_touch_count={}",
                self.glacier_contact, self.glacier_touch_count
            )));
        }
        let indicators =
            [self.lake_type_ice_contact, self.lake_type_moraine_dammed, self.lake_type_other];
        if indicators != self.lake_type.one_hot() {
            return Err(invalid(format!(
                "lake type indicators {:?} do not match Lake_type_simplified '{}'",
                indicators, self.lake_type
            )));
        }
        if self.is_supraglacial > 1 {
            return Err(invalid(format!("is_supraglacial must be 0 or 1, got {}", self.is_supraglacial)));
        }
        if let Some(label) = self.glof {
            if label > 1 {
                return Err(invalid(format!("GLOF must be 0 or 1, got {}", label)));
            }
        }
        Ok(())
    }
}
