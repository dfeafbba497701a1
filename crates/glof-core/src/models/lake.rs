//! Lake and glacier vector models.

use geo::{MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GlofError, Result};

/// Label-derived status that selects the composite window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LakeStatus {
    /// Lake-year without an outburst in the reference year
    NonGlof,
    /// Reference year is the year of a recorded outburst
    PreGlof,
}

impl LakeStatus {
    /// Status of a lake-year given the catalogue event years of that lake
    pub fn for_reference(event_years: &[i32], reference_year: i32) -> Self {
        if event_years.contains(&reference_year) {
            LakeStatus::PreGlof
        } else {
            LakeStatus::NonGlof
        }
    }
}

/// The three acquisition years aggregated into one composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeWindow {
    pub status: LakeStatus,
    pub reference_year: i32,
    pub years: [i32; 3],
}

impl CompositeWindow {
    /// Static window policy: non-GLOF uses {t-1, t, t+1}, pre-GLOF uses {t-3, t-2, t-1}
    pub fn for_status(status: LakeStatus, reference_year: i32) -> Self {
        let t = reference_year;
        let years = match status {
            LakeStatus::NonGlof => [t - 1, t, t + 1],
            LakeStatus::PreGlof => [t - 3, t - 2, t - 1],
        };
        Self { status, reference_year, years }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.years.contains(&year)
    }
}

/// Simplified lake type from the inventory type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LakeType {
    #[serde(rename = "ice-contact")]
    IceContact,
    #[serde(rename = "moraine-dammed")]
    MoraineDammed,
    #[default]
    #[serde(rename = "other")]
    Other,
}

impl LakeType {
    pub const ALL: [LakeType; 3] = [LakeType::IceContact, LakeType::MoraineDammed, LakeType::Other];

    /// Map an inventory type code to the simplified category
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().to_lowercase();
        match code.as_str() {
            "ice-contact" | "ice contact" | "ic" | "i" | "ice-dammed" | "s" | "supraglacial" => {
                LakeType::IceContact
            }
            c if c.starts_with('m') => LakeType::MoraineDammed,
            _ => LakeType::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LakeType::IceContact => "ice-contact",
            LakeType::MoraineDammed => "moraine-dammed",
            LakeType::Other => "other",
        }
    }

    /// Indicator values in `ALL` order; exactly one is 1
    pub fn one_hot(&self) -> [u8; 3] {
        let mut indicators = [0u8; 3];
        for (slot, kind) in indicators.iter_mut().zip(Self::ALL) {
            *slot = u8::from(kind == *self);
        }
        indicators
    }
}

impl fmt::Display for LakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lake outline derived from one temporal composite
#[derive(Debug, Clone)]
pub struct LakePolygon {
    pub lake_id: String,
    pub reference_year: i32,
    pub geometry: Polygon<f64>,
    pub area_ha: f64,
    /// Centroid as (lon, lat)
    pub centroid: Point<f64>,
}

impl LakePolygon {
    pub fn new(
        lake_id: impl Into<String>,
        reference_year: i32,
        geometry: Polygon<f64>,
        area_ha: f64,
        centroid: Point<f64>,
    ) -> Result<Self> {
        let lake_id = lake_id.into();
        if !area_ha.is_finite() || area_ha <= 0.0 {
            return Err(GlofError::InvalidGeometry {
                feature_id: lake_id,
                reason: format!("lake area must be positive, got {} ha", area_ha),
            });
        }
        if !centroid.x().is_finite() || !centroid.y().is_finite() {
            return Err(GlofError::InvalidGeometry {
                feature_id: lake_id,
                reason: "centroid coordinates must be finite".to_string(),
            });
        }
        Ok(Self {
            lake_id,
            reference_year,
            geometry,
            area_ha,
            centroid,
        })
    }
}

/// Glacier outline from the reference inventory
#[derive(Debug, Clone)]
pub struct GlacierPolygon {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    pub area_ha: f64,
    pub elevation_m: Option<f64>,
}
