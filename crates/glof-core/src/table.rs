//! Flat-file persistence for the feature table and its derived partitions.
//!
//! The feature table is one CSV row per `LakeRecord`. Partition files carry
//! the identity columns followed by the feature columns and no label column;
//! an empty cell is a missing value.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::error::{GlofError, Result};
use crate::models::{LakeRecord, RecordKey, FEATURE_COLUMNS, IDENTITY_COLUMNS};

/// Write any serde-serialisable rows to a CSV file with headers
pub fn write_csv<T: Serialize, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read CSV rows into serde-deserialisable values
pub fn read_csv<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Write the feature table
pub fn write_records<P: AsRef<Path>>(path: P, records: &[LakeRecord]) -> Result<()> {
    write_csv(path, records)
}

/// Read and validate the feature table
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<LakeRecord>> {
    let records: Vec<LakeRecord> = read_csv(path)?;
    for record in &records {
        record.validate()?;
    }
    Ok(records)
}

/// Split labelled records into (positive, negative).
///
/// Fails while any record is flagged for review or unlabelled.
pub fn partition_by_label(records: &[LakeRecord]) -> Result<(Vec<LakeRecord>, Vec<LakeRecord>)> {
    let pending = records.iter().filter(|r| r.needs_review || r.glof.is_none()).count();
    if pending > 0 {
        return Err(GlofError::PendingReview { count: pending });
    }
    Ok(records.iter().cloned().partition(|r| r.glof == Some(1)))
}

/// Numeric view of records: identity keys plus a feature matrix with gaps
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub keys: Vec<RecordKey>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl FeatureMatrix {
    /// Build the matrix over all feature columns
    pub fn from_records(records: &[LakeRecord]) -> Self {
        let columns: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let values = records
            .iter()
            .map(|r| FEATURE_COLUMNS.iter().map(|c| r.feature(c)).collect())
            .collect();
        Self { keys: records.iter().map(LakeRecord::key).collect(), columns, values }
    }

    pub fn n_rows(&self) -> usize {
        self.values.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().flatten().filter(|v| v.is_none()).count()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Rows as dense vectors; `None` if any cell is missing
    pub fn dense_rows(&self) -> Option<Vec<Vec<f64>>> {
        self.values.iter().map(|row| row.iter().copied().collect::<Option<Vec<f64>>>()).collect()
    }

    /// Copy values into the matching records, filling only missing fields.
    ///
    /// Returns the number of cells filled.
    pub fn apply_to_records(&self, records: &mut [LakeRecord]) -> Result<usize> {
        let mut filled = 0;
        for (key, row) in self.keys.iter().zip(&self.values) {
            let Some(record) = records.iter_mut().find(|r| key.matches(&r.lake_id, r.year)) else {
                return Err(GlofError::InvalidRecord {
                    lake_id: key.lake_id.clone(),
                    year: key.year,
                    reason: "no matching record in the feature table".to_string(),
                });
            };
            for (column, value) in self.columns.iter().zip(row) {
                if let Some(value) = value {
                    if record.fill_missing(column, *value)? {
                        filled += 1;
                    }
                }
            }
        }
        Ok(filled)
    }

    /// Write as a partition file (identity columns + features, no label)
    pub fn write_partition<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        let header: Vec<&str> =
            IDENTITY_COLUMNS.iter().copied().chain(self.columns.iter().map(String::as_str)).collect();
        writer.write_record(&header)?;

        for (key, row) in self.keys.iter().zip(&self.values) {
            let mut fields = vec![
                key.lake_id.clone(),
                key.latitude.to_string(),
                key.longitude.to_string(),
                key.year.to_string(),
            ];
            fields.extend(row.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()));
            writer.write_record(&fields)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a partition file written by [`FeatureMatrix::write_partition`]
    pub fn read_partition<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        let malformed = |reason: String| GlofError::Serialization(format!(
            "{}: {}",
            path.display(),
            reason
        ));

        for (i, expected) in IDENTITY_COLUMNS.iter().enumerate() {
            if headers.get(i) != Some(*expected) {
                return Err(malformed(format!("expected column {} to be '{}'", i, expected)));
            }
        }
        let columns: Vec<String> =
            headers.iter().skip(IDENTITY_COLUMNS.len()).map(str::to_string).collect();

        let parse_f64 = |field: &str, name: &str| -> Result<f64> {
            field.trim().parse::<f64>().map_err(|_| malformed(format!("invalid {} '{}'", name, field)))
        };

        let mut keys = Vec::new();
        let mut values = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or("");
            let year = field(3)
                .trim()
                .parse::<i32>()
                .map_err(|_| malformed(format!("invalid Year_final '{}'", field(3))))?;
            keys.push(RecordKey {
                lake_id: field(0).to_string(),
                latitude: parse_f64(field(1), "Latitude")?,
                longitude: parse_f64(field(2), "Longitude")?,
                year,
            });

            let mut row = Vec::with_capacity(columns.len());
            for (j, name) in columns.iter().enumerate() {
                let raw = field(IDENTITY_COLUMNS.len() + j);
                row.push(if raw.trim().is_empty() { None } else { Some(parse_f64(raw, name)?) });
            }
            values.push(row);
        }

        Ok(Self { keys, columns, values })
    }
}
