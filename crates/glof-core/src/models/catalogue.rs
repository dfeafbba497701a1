//! Lake inventory / event catalogue rows and review bookkeeping.

use serde::{Deserialize, Serialize};

use super::lake::LakeType;

/// One row of the lake inventory / GLOF event catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub lake_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Year of a recorded outburst, if any
    #[serde(default)]
    pub event_year: Option<i32>,
    /// Inventory lake type code (free text)
    #[serde(default)]
    pub lake_type: Option<String>,
}

impl CatalogueEntry {
    pub fn simplified_type(&self) -> LakeType {
        self.lake_type.as_deref().map(LakeType::from_code).unwrap_or_default()
    }

    /// Outcome of matching this entry against a record of `year`
    pub fn outcome_for(&self, year: i32) -> bool {
        self.event_year.is_some_and(|event| event <= year)
    }
}

/// A candidate catalogue match awaiting human adjudication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub lake_id: String,
    #[serde(rename = "Year_final")]
    pub year: i32,
    pub candidate_lake_id: String,
    pub candidate_event_year: Option<i32>,
    pub distance_m: f64,
    pub candidate_outcome: u8,
}

/// A human decision that resolves a flagged record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjudication {
    pub lake_id: String,
    #[serde(rename = "Year_final")]
    pub year: i32,
    #[serde(rename = "GLOF")]
    pub glof: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_respects_event_year() {
        let entry = CatalogueEntry {
            lake_id: "Lugge".to_string(),
            latitude: 28.09,
            longitude: 90.30,
            event_year: Some(1994),
            lake_type: Some("M(e)".to_string()),
        };
        assert!(entry.outcome_for(1994));
        assert!(entry.outcome_for(2000));
        assert!(!entry.outcome_for(1990));
        assert_eq!(entry.simplified_type(), LakeType::MoraineDammed);
    }

    #[test]
    fn test_inventory_lake_never_positive() {
        let entry = CatalogueEntry {
            lake_id: "x".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            event_year: None,
            lake_type: None,
        };
        assert!(!entry.outcome_for(2100));
        assert_eq!(entry.simplified_type(), LakeType::Other);
    }
}
