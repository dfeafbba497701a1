//! Integration tests for the `glof` binary
//!
//! These tests drive the label, impute, train and score commands over a
//! synthetic feature table and check JSON output and dry-run behaviour.

use glof_core::models::{CatalogueEntry, LakeRecord, LakeType};
use glof_core::table;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const ENV_KEYS: [&str; 9] = [
    "GLOF_NDWI_THRESHOLD",
    "GLOF_REFLECTANCE_GAIN",
    "GLOF_REFLECTANCE_OFFSET",
    "GLOF_MATCH_TOLERANCE_M",
    "GLOF_GLACIER_SEARCH_RADIUS_M",
    "GLOF_IMPUTATION_ITERATIONS",
    "GLOF_TEST_FRACTION",
    "GLOF_SELECTION_METRIC",
    "GLOF_SEED",
];

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("glof.toml"), "seed = 7\nimputation_iterations = 5\n").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn out_dir(&self) -> PathBuf {
        self.path("out")
    }

    fn glof(&self, args: &[&str]) -> Output {
        let mut command = Command::new(env!("CARGO_BIN_EXE_glof"));
        command.current_dir(self.dir.path()).env("RUST_LOG", "warn");
        for key in ENV_KEYS {
            command.env_remove(key);
        }
        command.args(args).output().expect("Failed to execute glof")
    }

    fn glof_json(&self, args: &[&str]) -> serde_json::Value {
        let mut args = args.to_vec();
        args.push("--json");
        let output = self.glof(&args);
        assert!(
            output.status.success(),
            "glof {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        let parsed: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
        assert_eq!(parsed["status"], "success");
        parsed["data"].clone()
    }
}

/// Forty lakes far apart; every third one burst in 2010
fn write_inputs(dir: &Path) {
    let mut records = Vec::new();
    let mut catalogue = Vec::new();
    for i in 0..40 {
        let lake_id = format!("lake-{:02}", i);
        let latitude = 27.0 + i as f64 * 0.1;
        let positive = i % 3 == 0;

        let lake_type = if positive { LakeType::MoraineDammed } else { LakeType::Other };
        let area = if positive { 40.0 + i as f64 } else { 2.0 + (i % 7) as f64 };
        let mut record = LakeRecord::new(&lake_id, latitude, 86.0, 2020, area, lake_type);
        record.elevation_m = (i % 5 != 1).then_some(4500.0 + i as f64 * 3.0);
        record.slope_glac_to_lake = Some(if positive { 12.0 } else { 3.0 } + (i % 4) as f64);
        record.nearest_glacier_dist_m = Some(if positive { 20.0 } else { 900.0 } + i as f64);
        record.glacier_elev_m = Some(4700.0 + i as f64);
        record.expansion_rate_5y = Some(if positive { 4.0 } else { 0.5 });
        record.expansion_rate_10y = (i % 6 != 2).then_some(if positive { 3.5 } else { 0.4 });
        record.set_glacier_touch_count(u32::from(positive));
        records.push(record);

        catalogue.push(CatalogueEntry {
            lake_id,
            latitude,
            longitude: 86.0,
            event_year: positive.then_some(2010),
            lake_type: Some(if positive { "M(e)" } else { "O" }.to_string()),
        });
    }
    table::write_records(dir.join("features.csv"), &records).unwrap();
    table::write_csv(dir.join("catalogue.csv"), &catalogue).unwrap();
}

#[test]
fn test_config_json_reports_sources() {
    let ws = Workspace::new();
    let data = ws.glof_json(&["config"]);

    assert!(data["config_file"].as_str().unwrap().ends_with("glof.toml"));
    assert_eq!(data["values"]["seed"]["value"], "7");
    assert_eq!(data["values"]["seed"]["source"], "File");
    assert_eq!(data["values"]["test_fraction"]["source"], "Default");
}

#[test]
fn test_missing_stage_input_fails_with_json_error() {
    let ws = Workspace::new();
    let out_dir = ws.out_dir();
    let output = ws.glof(&["impute", "--out-dir", out_dir.to_str().unwrap(), "--json"]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let error: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(error["status"], "error");
    assert_eq!(error["message"], "Input file not found");
}

#[test]
fn test_dry_run_writes_nothing() {
    let ws = Workspace::new();
    write_inputs(ws.dir.path());
    let out_dir = ws.out_dir();
    let features = ws.path("features.csv");
    let catalogue = ws.path("catalogue.csv");

    let output = ws.glof(&[
        "label",
        "--catalogue",
        catalogue.to_str().unwrap(),
        "--features",
        features.to_str().unwrap(),
        "--out-dir",
        out_dir.to_str().unwrap(),
        "--dry-run",
    ]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(!out_dir.exists(), "Dry-run should not create the output directory");
}

#[test]
fn test_label_impute_train_score() {
    let ws = Workspace::new();
    write_inputs(ws.dir.path());
    let out_dir = ws.out_dir();
    let out = out_dir.to_str().unwrap();
    let features = ws.path("features.csv");
    let catalogue = ws.path("catalogue.csv");

    let labelled = ws.glof_json(&[
        "label",
        "--catalogue",
        catalogue.to_str().unwrap(),
        "--features",
        features.to_str().unwrap(),
        "--out-dir",
        out,
    ]);
    assert_eq!(labelled["positives"], 14);
    assert_eq!(labelled["negatives"], 26);
    assert_eq!(labelled["pending_review"], 0);
    assert_eq!(labelled["partitions_written"], true);
    assert!(out_dir.join("positive.csv").is_file());
    assert!(out_dir.join("negative.csv").is_file());

    let imputed = ws.glof_json(&["impute", "--out-dir", out]);
    let filled = imputed["positive"]["filled_cells"].as_u64().unwrap()
        + imputed["negative"]["filled_cells"].as_u64().unwrap();
    // Eight lakes lack elevation and seven lack the ten-year rate
    assert_eq!(filled, 15);
    let records = table::read_records(out_dir.join("imputed.csv")).unwrap();
    assert!(records.iter().all(|r| r.elevation_m.is_some() && r.expansion_rate_10y.is_some()));

    let trained = ws.glof_json(&["train", "--out-dir", out, "--metric", "f1"]);
    assert_eq!(trained["selection_metric"], "f1");
    assert_eq!(trained["scores"].as_array().unwrap().len(), 4);
    assert_eq!(
        trained["train_rows"].as_u64().unwrap() + trained["test_rows"].as_u64().unwrap(),
        40
    );
    assert!(out_dir.join("model.json").is_file());

    let scored = ws.glof_json(&["score", "--out-dir", out]);
    assert_eq!(scored["scored"], 40);
    assert_eq!(scored["skipped"], 0);
    let geojson = std::fs::read_to_string(out_dir.join("risk.geojson")).unwrap();
    assert!(geojson.contains("risk_score"));
}
