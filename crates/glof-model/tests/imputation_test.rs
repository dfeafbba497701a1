//! Imputation properties over realistic feature tables

use glof_core::models::{LakeRecord, LakeType};
use glof_core::table::{partition_by_label, FeatureMatrix};
use glof_model::MiceImputer;
use proptest::prelude::*;

fn record(i: usize, glof: u8) -> LakeRecord {
    let lake_type = LakeType::ALL[i % 3];
    let mut r = LakeRecord::new(format!("lake-{}", i), 28.0 + i as f64 * 0.01, 86.0, 2015, 10.0 + i as f64, lake_type);
    r.elevation_m = Some(4800.0 + 10.0 * i as f64);
    r.slope_glac_to_lake = Some(0.05 + 0.001 * i as f64);
    r.nearest_glacier_dist_m = Some(if i % 2 == 0 { 0.0 } else { 150.0 * i as f64 });
    r.glacier_elev_m = Some(5200.0 + 5.0 * i as f64);
    r.expansion_rate_5y = Some(0.5 * (i % 7) as f64);
    r.expansion_rate_10y = Some(0.25 * (i % 5) as f64);
    r.set_glacier_touch_count((i % 2 == 0) as u32);
    r.glof = Some(glof);
    r
}

fn table() -> Vec<LakeRecord> {
    let mut records: Vec<LakeRecord> = (0..24).map(|i| record(i, (i % 4 == 0) as u8)).collect();
    records[1].elevation_m = None;
    records[5].expansion_rate_10y = None;
    records[8].slope_glac_to_lake = None;
    records[12].glacier_elev_m = None;
    records[13].expansion_rate_5y = None;
    records
}

#[test]
fn test_complete_table_round_trips() {
    let records: Vec<LakeRecord> = (0..10).map(|i| record(i, 0)).collect();
    let matrix = FeatureMatrix::from_records(&records);
    assert_eq!(matrix.missing_count(), 0);

    let (imputed, _) = MiceImputer::default().impute(&matrix).unwrap();
    assert_eq!(imputed, matrix);

    let mut filled = records.clone();
    assert_eq!(imputed.apply_to_records(&mut filled).unwrap(), 0);
    assert_eq!(filled, records);
}

#[test]
fn test_partitions_are_imputed_independently() {
    let (positive, negative) = partition_by_label(&table()).unwrap();
    let positive = FeatureMatrix::from_records(&positive);
    let negative = FeatureMatrix::from_records(&negative);
    let imputer = MiceImputer::new(5, 3);

    let joint = imputer.impute_partitions(&positive, &negative).unwrap();

    // Perturbing every negative value leaves the positive result untouched
    let mut shifted = negative.clone();
    for row in &mut shifted.values {
        for value in row.iter_mut().flatten() {
            *value += 1000.0;
        }
    }
    let perturbed = imputer.impute_partitions(&positive, &shifted).unwrap();
    assert_eq!(perturbed.positive, joint.positive);

    let (alone, _) = imputer.impute(&positive).unwrap();
    assert_eq!(alone, joint.positive);
    assert_eq!(joint.negative.missing_count(), 0);
}

#[test]
fn test_imputed_values_flow_back_into_records() {
    let mut records = table();
    let matrix = FeatureMatrix::from_records(&records);
    let (imputed, summary) = MiceImputer::new(4, 9).impute(&matrix).unwrap();

    let filled = imputed.apply_to_records(&mut records).unwrap();

    assert_eq!(filled, summary.filled_cells);
    assert!(records.iter().all(|r| r.elevation_m.is_some() && r.expansion_rate_10y.is_some()));
    assert_eq!(FeatureMatrix::from_records(&records).missing_count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_observed_values_are_preserved(
        cells in prop::collection::vec(prop::option::weighted(0.8, -1000.0f64..1000.0), 4 * 6),
        seed in any::<u64>(),
    ) {
        let mut values: Vec<Vec<Option<f64>>> = cells.chunks(4).map(|c| c.to_vec()).collect();
        // Every column keeps at least one observation
        values[0] = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let matrix = FeatureMatrix {
            keys: (0..values.len()).map(|i| record(i, 0).key()).collect(),
            columns: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            values,
        };

        let (imputed, _) = MiceImputer::new(3, seed).impute(&matrix).unwrap();

        prop_assert_eq!(imputed.missing_count(), 0);
        for (before, after) in matrix.values.iter().zip(&imputed.values) {
            for (b, a) in before.iter().zip(after) {
                if let Some(b) = b {
                    prop_assert_eq!(Some(*b), *a);
                }
                prop_assert!(a.map_or(false, f64::is_finite));
            }
        }
    }
}
