//! Catalogue matching and GLOF labels.

use geo::Point;
use std::collections::{BTreeMap, HashMap};

use glof_core::error::{GlofError, Result};
use glof_core::models::{Adjudication, CatalogueEntry, LakeRecord, ReviewItem};

use crate::spatial::haversine_m;

/// How a record's identity resolved against the catalogue
#[derive(Debug, Clone, PartialEq)]
pub enum LabelOutcome {
    /// Identity resolved; label is 1 for a recorded event on or before the record year
    Matched { glof: u8 },
    /// No catalogue lake matched; the record is negative
    Unmatched,
    /// Several nearby catalogue lakes with conflicting outcomes
    Ambiguous(Vec<ReviewItem>),
}

/// Summary of one labelling pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelReport {
    pub positives: usize,
    pub negatives: usize,
    pub unmatched: usize,
    pub review: Vec<ReviewItem>,
}

impl LabelReport {
    /// Number of records left for human adjudication
    pub fn flagged(&self) -> usize {
        let mut keys: Vec<(&str, i32)> =
            self.review.iter().map(|r| (r.lake_id.as_str(), r.year)).collect();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }
}

/// Matches feature records against the lake inventory / event catalogue
pub struct LabelAssembler<'a> {
    catalogue: &'a [CatalogueEntry],
    by_id: HashMap<&'a str, Vec<&'a CatalogueEntry>>,
    tolerance_m: f64,
}

impl<'a> LabelAssembler<'a> {
    pub fn new(catalogue: &'a [CatalogueEntry], tolerance_m: f64) -> Result<Self> {
        if !tolerance_m.is_finite() || tolerance_m < 0.0 {
            return Err(GlofError::ConfigInvalid {
                key: "match_tolerance_m".to_string(),
                reason: format!("must be a non-negative distance, got {}", tolerance_m),
            });
        }
        let mut by_id: HashMap<&str, Vec<&CatalogueEntry>> = HashMap::new();
        for entry in catalogue {
            by_id.entry(entry.lake_id.as_str()).or_default().push(entry);
        }
        Ok(Self { catalogue, by_id, tolerance_m })
    }

    /// Resolve one record's identity and outcome
    pub fn label_record(&self, record: &LakeRecord) -> LabelOutcome {
        if let Some(entries) = self.by_id.get(record.lake_id.as_str()) {
            let positive = entries.iter().any(|e| e.outcome_for(record.year));
            return LabelOutcome::Matched { glof: u8::from(positive) };
        }

        let origin = Point::new(record.longitude, record.latitude);
        let nearby: Vec<(&CatalogueEntry, f64)> = self
            .catalogue
            .iter()
            .map(|e| (e, haversine_m(origin, Point::new(e.longitude, e.latitude))))
            .filter(|(_, distance)| *distance <= self.tolerance_m)
            .collect();

        if nearby.is_empty() {
            return LabelOutcome::Unmatched;
        }

        // Outcome per distinct candidate lake
        let mut outcomes: BTreeMap<&str, bool> = BTreeMap::new();
        for (entry, _) in &nearby {
            *outcomes.entry(entry.lake_id.as_str()).or_default() |= entry.outcome_for(record.year);
        }

        let positive = outcomes.values().any(|v| *v);
        let negative = outcomes.values().any(|v| !*v);
        if positive && negative {
            let items = nearby
                .iter()
                .map(|(entry, distance)| ReviewItem {
                    lake_id: record.lake_id.clone(),
                    year: record.year,
                    candidate_lake_id: entry.lake_id.clone(),
                    candidate_event_year: entry.event_year,
                    distance_m: *distance,
                    candidate_outcome: u8::from(outcomes[entry.lake_id.as_str()]),
                })
                .collect();
            return LabelOutcome::Ambiguous(items);
        }

        LabelOutcome::Matched { glof: u8::from(positive) }
    }

    /// Label every record in place.
    ///
    /// Ambiguous records get `needs_review` and no label; their candidates
    /// are returned in the report for adjudication.
    pub fn assemble(&self, records: &mut [LakeRecord]) -> LabelReport {
        let mut report = LabelReport::default();
        for record in records.iter_mut() {
            match self.label_record(record) {
                LabelOutcome::Matched { glof } => {
                    record.glof = Some(glof);
                    record.needs_review = false;
                }
                LabelOutcome::Unmatched => {
                    record.glof = Some(0);
                    record.needs_review = false;
                    report.unmatched += 1;
                }
                LabelOutcome::Ambiguous(items) => {
                    tracing::warn!(
                        lake_id = %record.lake_id,
                        year = record.year,
                        candidates = items.len(),
                        "Ambiguous catalogue match flagged for review"
                    );
                    record.glof = None;
                    record.needs_review = true;
                    report.review.extend(items);
                    continue;
                }
            }
            if record.glof == Some(1) {
                report.positives += 1;
            } else {
                report.negatives += 1;
            }
        }

        tracing::info!(
            positives = report.positives,
            negatives = report.negatives,
            flagged = report.flagged(),
            "Assembled labels"
        );
        report
    }
}

/// Apply human decisions to flagged records.
///
/// Returns the number of records updated. An adjudication naming an unknown
/// or unflagged record, or a label other than 0/1, is an error.
pub fn apply_adjudications(records: &mut [LakeRecord], adjudications: &[Adjudication]) -> Result<usize> {
    let mut applied = 0;
    for decision in adjudications {
        if decision.glof > 1 {
            return Err(GlofError::InvalidRecord {
                lake_id: decision.lake_id.clone(),
                year: decision.year,
                reason: format!("adjudicated GLOF must be 0 or 1, got {}", decision.glof),
            });
        }
        let record = records
            .iter_mut()
            .find(|r| r.lake_id == decision.lake_id && r.year == decision.year)
            .ok_or_else(|| GlofError::InvalidRecord {
                lake_id: decision.lake_id.clone(),
                year: decision.year,
                reason: "adjudication does not match any record".to_string(),
            })?;
        if !record.needs_review {
            return Err(GlofError::InvalidRecord {
                lake_id: decision.lake_id.clone(),
                year: decision.year,
                reason: "record was not flagged for review".to_string(),
            });
        }
        record.glof = Some(decision.glof);
        record.needs_review = false;
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glof_core::models::LakeType;

    fn entry(id: &str, lat: f64, lon: f64, event_year: Option<i32>) -> CatalogueEntry {
        CatalogueEntry {
            lake_id: id.to_string(),
            latitude: lat,
            longitude: lon,
            event_year,
            lake_type: None,
        }
    }

    fn record(id: &str, lat: f64, lon: f64, year: i32) -> LakeRecord {
        LakeRecord::new(id, lat, lon, year, 20.0, LakeType::Other)
    }

    #[test]
    fn test_id_match_respects_event_year() {
        let catalogue = vec![entry("Tsho", 27.87, 86.92, Some(1985))];
        let assembler = LabelAssembler::new(&catalogue, 500.0).unwrap();

        assert_eq!(
            assembler.label_record(&record("Tsho", 0.0, 0.0, 1990)),
            LabelOutcome::Matched { glof: 1 }
        );
        assert_eq!(
            assembler.label_record(&record("Tsho", 0.0, 0.0, 1980)),
            LabelOutcome::Matched { glof: 0 }
        );
    }

    #[test]
    fn test_spatial_match_within_tolerance() {
        let catalogue = vec![entry("cat-1", 28.0, 86.0, Some(2010))];
        let assembler = LabelAssembler::new(&catalogue, 500.0).unwrap();

        // ~111 m north of the catalogue centroid
        assert_eq!(
            assembler.label_record(&record("derived-7", 28.001, 86.0, 2015)),
            LabelOutcome::Matched { glof: 1 }
        );
        // ~1.1 km away
        assert_eq!(assembler.label_record(&record("derived-8", 28.01, 86.0, 2015)), LabelOutcome::Unmatched);
    }

    #[test]
    fn test_conflicting_candidates_are_flagged() {
        let catalogue = vec![
            entry("cat-1", 28.0, 86.0, Some(2010)),
            entry("cat-2", 28.002, 86.0, None),
        ];
        let assembler = LabelAssembler::new(&catalogue, 500.0).unwrap();
        let mut records = vec![record("derived-1", 28.001, 86.0, 2015), record("other", 30.0, 80.0, 2015)];

        let report = assembler.assemble(&mut records);

        assert!(records[0].needs_review);
        assert_eq!(records[0].glof, None);
        assert_eq!(records[1].glof, Some(0));
        assert_eq!(report.review.len(), 2);
        assert_eq!(report.flagged(), 1);
        assert_eq!(report.unmatched, 1);

        let applied = apply_adjudications(
            &mut records,
            &[Adjudication { lake_id: "derived-1".to_string(), year: 2015, glof: 1 }],
        )
        .unwrap();
        assert_eq!(applied, 1);
        assert!(!records[0].needs_review);
        assert_eq!(records[0].glof, Some(1));
    }

    #[test]
    fn test_agreeing_candidates_resolve() {
        let catalogue = vec![entry("cat-1", 28.0, 86.0, None), entry("cat-2", 28.002, 86.0, None)];
        let assembler = LabelAssembler::new(&catalogue, 500.0).unwrap();
        assert_eq!(
            assembler.label_record(&record("derived-1", 28.001, 86.0, 2015)),
            LabelOutcome::Matched { glof: 0 }
        );
    }

    #[test]
    fn test_future_event_is_not_a_label() {
        let catalogue = vec![entry("cat-1", 28.0, 86.0, Some(2020)), entry("cat-2", 28.002, 86.0, None)];
        let assembler = LabelAssembler::new(&catalogue, 500.0).unwrap();
        // Both candidates are negative as of 2015, so nothing conflicts
        assert_eq!(
            assembler.label_record(&record("derived-1", 28.001, 86.0, 2015)),
            LabelOutcome::Matched { glof: 0 }
        );
    }

    #[test]
    fn test_bad_adjudications() {
        let mut records = vec![record("a", 28.0, 86.0, 2015)];
        let unknown = Adjudication { lake_id: "b".to_string(), year: 2015, glof: 0 };
        assert!(apply_adjudications(&mut records, &[unknown]).is_err());

        let bad_label = Adjudication { lake_id: "a".to_string(), year: 2015, glof: 2 };
        assert!(apply_adjudications(&mut records, &[bad_label]).is_err());
    }

    #[test]
    fn test_adjudication_cannot_override_catalogue_label() {
        let catalogue = vec![entry("Tsho", 27.87, 86.92, None)];
        let assembler = LabelAssembler::new(&catalogue, 500.0).unwrap();
        let mut records = vec![record("Tsho", 27.87, 86.92, 2015)];

        let report = assembler.assemble(&mut records);
        assert_eq!(report.flagged(), 0);
        assert_eq!(records[0].glof, Some(0));

        let decision = Adjudication { lake_id: "Tsho".to_string(), year: 2015, glof: 1 };
        let result = apply_adjudications(&mut records, &[decision]);

        assert!(matches!(
            result,
            Err(GlofError::InvalidRecord { ref reason, .. }) if reason == "record was not flagged for review"
        ));
        assert_eq!(records[0].glof, Some(0));
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        assert!(LabelAssembler::new(&[], -1.0).is_err());
    }
}
